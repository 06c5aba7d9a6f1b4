//! Server-side frame emission
//!
//! Encodes planner events as text/event-stream frames. Multi-line payloads
//! become repeated `data:` lines so the decoder can rejoin them exactly.

use crate::config::StreamConfig;

/// Encode one frame, terminated by a blank line
pub fn encode_frame(event_type: &str, payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + event_type.len() + 16);
    out.push_str("event: ");
    out.push_str(event_type);
    out.push('\n');
    for line in payload.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Writes a whole planning turn: token deltas, the final document, the sentinel
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    token_event: String,
    final_event: String,
    error_event: String,
    done_sentinel: Option<String>,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl FrameEncoder {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            token_event: config.token_event.clone(),
            final_event: config.final_event.clone(),
            error_event: config.error_event.clone(),
            done_sentinel: config.done_sentinel.clone(),
        }
    }

    pub fn token(&self, delta: &str) -> String {
        encode_frame(&self.token_event, delta)
    }

    pub fn final_document(&self, document: &str) -> String {
        encode_frame(&self.final_event, document)
    }

    pub fn error(&self, message: &str) -> String {
        encode_frame(&self.error_event, message)
    }

    /// Sentinel frame, or an empty string when no sentinel is configured
    pub fn done(&self) -> String {
        match &self.done_sentinel {
            Some(sentinel) => format!("data: {}\n\n", sentinel),
            None => String::new(),
        }
    }

    /// Render a complete transcript that streams `document` in deltas of
    /// `token_chars` characters, then sends it again as the final frame
    pub fn transcript(&self, document: &str, token_chars: usize) -> String {
        let token_chars = token_chars.max(1);
        let chars: Vec<char> = document.chars().collect();

        let mut out = String::new();
        for piece in chars.chunks(token_chars) {
            let delta: String = piece.iter().collect();
            out.push_str(&self.token(&delta));
        }
        out.push_str(&self.final_document(document));
        out.push_str(&self.done());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{FrameDecoder, StreamFrame};

    #[test]
    fn test_encode_single_line() {
        assert_eq!(encode_frame("token", "abc"), "event: token\ndata: abc\n\n");
    }

    #[test]
    fn test_encode_multiline_payload() {
        assert_eq!(encode_frame("final", "a\nb"), "event: final\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn test_transcript_decodes_back() {
        let encoder = FrameEncoder::default();
        let document = "{\"replyText\":\"Hi\",\n\"planDays\":[]}";
        let transcript = encoder.transcript(document, 7);

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        decoder.feed(&transcript, |f| frames.push(f));

        let deltas: String = frames
            .iter()
            .filter(|f| f.event_type == "token")
            .map(|f| f.payload.as_str())
            .collect();
        assert_eq!(deltas, document);
        assert_eq!(frames.last(), Some(&StreamFrame::new("final", document)));
    }

    #[test]
    fn test_done_without_sentinel() {
        let config = StreamConfig {
            done_sentinel: None,
            ..Default::default()
        };
        assert_eq!(FrameEncoder::from_config(&config).done(), "");
    }
}
