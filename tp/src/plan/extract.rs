//! Partial plan extraction
//!
//! Scans a growing, not-yet-valid JSON buffer and recovers every plan item
//! that is already fully closed inside the `planDays` array. Each call starts
//! fresh from the `planDays` marker, so calling it again on a longer buffer
//! returns a superset of what an earlier call returned.
//!
//! The scan works on bytes: `"`, `\`, brackets and braces are ASCII and never
//! occur inside a multi-byte UTF-8 sequence, so every offset it records is a
//! valid `str` boundary.

use serde_json::Value;
use tracing::debug;

use super::types::{DayBucket, ExtractedDay, PlanItem};

const PLAN_DAYS_KEYS: &[&str] = &["planDays", "plan_days"];

/// Transient scan state, rebuilt on every call
#[derive(Debug, Default)]
struct ExtractionCursor {
    offset: usize,
    in_string: bool,
    escaped: bool,
    /// 1 inside `planDays`, 2 inside a single day
    square_depth: usize,
    curly_depth: usize,
    day: DayBucket,
    day_index: usize,
    object_start: Option<usize>,
}

/// Recover every closed day (with at least one valid item) from `buffer`
pub fn extract(buffer: &str) -> Vec<ExtractedDay> {
    let Some(start) = find_plan_days_array(buffer) else {
        debug!(buffer_len = buffer.len(), "extract: planDays array not open yet");
        return Vec::new();
    };

    let bytes = buffer.as_bytes();
    let mut cursor = ExtractionCursor {
        offset: start,
        square_depth: 1,
        ..Default::default()
    };
    let mut days = Vec::new();

    while cursor.offset < bytes.len() {
        let pos = cursor.offset;
        let byte = bytes[pos];
        cursor.offset += 1;

        if cursor.in_string {
            if cursor.escaped {
                cursor.escaped = false;
            } else if byte == b'\\' {
                cursor.escaped = true;
            } else if byte == b'"' {
                cursor.in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => cursor.in_string = true,
            b'[' => {
                if cursor.square_depth == 1 && cursor.curly_depth == 0 {
                    cursor.day.clear();
                }
                cursor.square_depth += 1;
            }
            b']' => {
                if cursor.curly_depth == 0 && cursor.square_depth == 1 {
                    // planDays itself closed
                    break;
                }
                if cursor.curly_depth == 0 && cursor.square_depth == 2 {
                    let bucket = std::mem::take(&mut cursor.day);
                    if !bucket.is_empty() {
                        days.push(ExtractedDay {
                            day_index: cursor.day_index,
                            bucket,
                        });
                    }
                    cursor.day_index += 1;
                }
                cursor.square_depth = cursor.square_depth.saturating_sub(1);
            }
            b'{' => {
                cursor.curly_depth += 1;
                if cursor.curly_depth == 1 && cursor.square_depth == 2 {
                    cursor.object_start = Some(pos);
                }
            }
            b'}' => {
                if cursor.curly_depth == 1
                    && cursor.square_depth == 2
                    && let Some(object_start) = cursor.object_start.take()
                    && let Some(item) = parse_item(&buffer[object_start..=pos])
                {
                    cursor.day.push(item);
                }
                cursor.curly_depth = cursor.curly_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    debug!(
        buffer_len = buffer.len(),
        days = days.len(),
        open_day_items = cursor.day.len(),
        "extract: scan complete"
    );
    days
}

fn parse_item(raw: &str) -> Option<PlanItem> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => PlanItem::from_value(&value),
        Err(e) => {
            debug!(error = %e, "parse_item: skipping malformed object");
            None
        }
    }
}

/// Offset just past the `[` that opens `planDays`, if it has arrived
///
/// Only real keys match: a `"planDays"` inside another string value is
/// skipped because string literals are consumed whole.
fn find_plan_days_array(buffer: &str) -> Option<usize> {
    let bytes = buffer.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }

        let end = string_end(bytes, i + 1)?;
        let token = &buffer[i + 1..end];
        i = end + 1;

        if !PLAN_DAYS_KEYS.contains(&token) {
            continue;
        }

        let colon = skip_whitespace(bytes, i);
        match bytes.get(colon) {
            None => return None,
            Some(b':') => {}
            // a value that happens to equal the key name
            Some(_) => continue,
        }

        let open = skip_whitespace(bytes, colon + 1);
        return match bytes.get(open) {
            Some(b'[') => Some(open + 1),
            _ => None,
        };
    }
    None
}

/// Index of the closing quote of a string whose body starts at `i`
fn string_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut escaped = false;
    while i < bytes.len() {
        match bytes[i] {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}
