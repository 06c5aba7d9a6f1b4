//! Text/event-stream frame decoder
//!
//! Splits a raw incoming text stream into discrete `(event_type, payload)`
//! frames. Frames may arrive split across arbitrary chunk boundaries; the
//! decoder holds back the incomplete tail until the blank line that ends it
//! has been read.

use tracing::{debug, warn};

/// Event type used when a frame carries no `event:` line
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Payload the generator sends to mark the end of the stream
pub const DEFAULT_DONE_SENTINEL: &str = "[DONE]";

/// One decoded event+payload unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event_type: String,
    pub payload: String,
}

impl StreamFrame {
    pub fn new(event_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }
}

/// Incremental decoder for `event:` / `data:` framed text
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: String,
    done_sentinel: Option<String>,
    flush_trailing: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder that suppresses the default `[DONE]` sentinel
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            done_sentinel: Some(DEFAULT_DONE_SENTINEL.to_string()),
            flush_trailing: false,
        }
    }

    /// Override the sentinel payload (`None` delivers every payload)
    pub fn with_sentinel(mut self, sentinel: Option<String>) -> Self {
        self.done_sentinel = sentinel;
        self
    }

    /// Decode an undelimited remainder as one last frame in [`finish`](Self::finish)
    pub fn with_flush_trailing(mut self, flush: bool) -> Self {
        self.flush_trailing = flush;
        self
    }

    /// Bytes held back waiting for a frame delimiter
    pub fn residual(&self) -> &str {
        &self.buffer
    }

    /// Append a chunk and deliver every frame it completes, in order
    ///
    /// Returns the number of frames delivered.
    pub fn feed<F>(&mut self, chunk: &str, mut on_frame: F) -> usize
    where
        F: FnMut(StreamFrame),
    {
        debug!(chunk_len = chunk.len(), residual_len = self.buffer.len(), "feed: called");
        self.buffer.push_str(chunk);

        let mut delivered = 0;
        while let Some((block_end, consumed)) = next_frame_boundary(&self.buffer) {
            let frame = self.decode_block(&self.buffer[..block_end]);
            self.buffer.drain(..consumed);
            if let Some(frame) = frame {
                delivered += 1;
                on_frame(frame);
            }
        }
        delivered
    }

    /// Process whatever is left buffered at end of stream
    ///
    /// A remainder that never reached its blank-line delimiter is dropped and
    /// returned so the caller can report it, unless the decoder was built
    /// with [`with_flush_trailing`](Self::with_flush_trailing).
    pub fn finish<F>(&mut self, mut on_frame: F) -> Option<String>
    where
        F: FnMut(StreamFrame),
    {
        debug!(residual_len = self.buffer.len(), "finish: called");
        self.feed("", &mut on_frame);

        let residual = std::mem::take(&mut self.buffer);
        if residual.trim().is_empty() {
            return None;
        }

        if self.flush_trailing {
            debug!("finish: flushing undelimited trailing frame");
            if let Some(frame) = self.decode_block(&residual) {
                on_frame(frame);
            }
            return None;
        }

        warn!(dropped_len = residual.len(), "finish: dropping undelimited trailing frame");
        Some(residual)
    }

    fn decode_block(&self, block: &str) -> Option<StreamFrame> {
        let mut event_type: Option<String> = None;
        let mut data: Option<String> = None;

        for raw_line in block.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "event" => event_type = Some(value.to_string()),
                other => debug!(field = %other, "decode_block: ignoring field"),
            }
        }

        if data.is_none() && event_type.is_none() {
            return None;
        }

        let payload = data.unwrap_or_default();
        if self.done_sentinel.as_deref() == Some(payload.as_str()) {
            debug!("decode_block: sentinel suppressed");
            return None;
        }

        let event_type = event_type
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());

        Some(StreamFrame { event_type, payload })
    }
}

/// Locate the first blank line; returns (end of frame body, bytes to consume)
fn next_frame_boundary(buffer: &str) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (i, byte) in buffer.bytes().enumerate() {
        if byte == b'\n' {
            let line = &buffer[line_start..i];
            if line.is_empty() || line == "\r" {
                return Some((line_start, i + 1));
            }
            line_start = i + 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(decoder: &mut FrameDecoder, chunks: &[&str]) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk, |f| frames.push(f));
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["event: token\ndata: {\"a\"\n\n"]);

        assert_eq!(frames, vec![StreamFrame::new("token", "{\"a\"")]);
        assert!(decoder.residual().is_empty());
    }

    #[test]
    fn test_default_event_type() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["data: hello\n\n"]);

        assert_eq!(frames[0].event_type, "message");
        assert_eq!(frames[0].payload, "hello");
    }

    #[test]
    fn test_multiple_data_lines_joined_with_newline() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["event: final\ndata: line one\ndata: line two\n\n"]);

        assert_eq!(frames[0].payload, "line one\nline two");
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["data:   indented \n\ndata:tight\n\n"]);

        assert_eq!(frames[0].payload, "  indented ");
        assert_eq!(frames[1].payload, "tight");
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["event: token\r\ndata: x\r\n\r\n"]);

        assert_eq!(frames, vec![StreamFrame::new("token", "x")]);
    }

    #[test]
    fn test_last_event_line_wins() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["event: a\nevent: b\ndata: x\n\n"]);

        assert_eq!(frames[0].event_type, "b");
    }

    #[test]
    fn test_sentinel_suppressed() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["data: one\n\ndata: [DONE]\n\n"]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, "one");
    }

    #[test]
    fn test_custom_sentinel() {
        let mut decoder = FrameDecoder::new().with_sentinel(Some("<end>".to_string()));
        let frames = decode_all(&mut decoder, &["data: [DONE]\n\ndata: <end>\n\n"]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, "[DONE]");
    }

    #[test]
    fn test_comments_and_keepalives_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &[": ping\n\n\n\nid: 7\nretry: 100\ndata: x\n\n"]);

        assert_eq!(frames, vec![StreamFrame::new("message", "x")]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["event: tok", "en\ndata: ab", "c\n", "\n"]);

        assert_eq!(frames, vec![StreamFrame::new("token", "abc")]);
    }

    #[test]
    fn test_residual_held_until_delimiter() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["data: partial\n"]);

        assert!(frames.is_empty());
        assert_eq!(decoder.residual(), "data: partial\n");
    }

    #[test]
    fn test_finish_drops_undelimited_remainder() {
        let mut decoder = FrameDecoder::new();
        let mut frames = decode_all(&mut decoder, &["data: one\n\ndata: two"]);
        let dropped = decoder.finish(|f| frames.push(f));

        assert_eq!(frames.len(), 1);
        assert_eq!(dropped.as_deref(), Some("data: two"));
        assert!(decoder.residual().is_empty());
    }

    #[test]
    fn test_finish_flushes_when_enabled() {
        let mut decoder = FrameDecoder::new().with_flush_trailing(true);
        let mut frames = decode_all(&mut decoder, &["event: final\ndata: {}"]);
        let dropped = decoder.finish(|f| frames.push(f));

        assert!(dropped.is_none());
        assert_eq!(frames, vec![StreamFrame::new("final", "{}")]);
    }

    #[test]
    fn test_finish_on_clean_stream_is_noop() {
        let mut decoder = FrameDecoder::new();
        let mut frames = decode_all(&mut decoder, &["data: one\n\n"]);

        assert!(decoder.finish(|f| frames.push(f)).is_none());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_multibyte_payload_preserved() {
        let mut decoder = FrameDecoder::new();
        let frames = decode_all(&mut decoder, &["data: $25–$40 café\n\n"]);

        assert_eq!(frames[0].payload, "$25–$40 café");
    }

    proptest! {
        #[test]
        fn prop_split_point_does_not_change_frames(split in 0usize..200) {
            let stream = "event: token\ndata: {\"replyText\":\"Hi\",\n\nevent: token\ndata:  \"planDays\":[[\n\n\
                          event: final\ndata: {\"a\":1}\ndata: {\"b\":2}\n\ndata: [DONE]\n\n";
            let mut whole = FrameDecoder::new();
            let expected = decode_all(&mut whole, &[stream]);

            let mut cut = split.min(stream.len());
            while !stream.is_char_boundary(cut) {
                cut -= 1;
            }
            let mut split_decoder = FrameDecoder::new();
            let actual = decode_all(&mut split_decoder, &[&stream[..cut], &stream[cut..]]);

            prop_assert_eq!(actual, expected);
        }
    }
}
