//! Replay generator
//!
//! Plays a recorded text/event-stream transcript back in fixed-size byte
//! chunks. Chunks deliberately ignore frame and character boundaries, which
//! is what a real network does.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{ByteStream, GeneratorError, PlanGenerator, PlanRequest};
use crate::stream::FrameEncoder;

/// Default replay chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Characters per synthesized token delta
const SYNTHETIC_TOKEN_CHARS: usize = 12;

/// Generator that replays a fixed transcript for every request
#[derive(Debug, Clone)]
pub struct ReplayGenerator {
    transcript: Vec<u8>,
    chunk_size: usize,
    delay: Option<Duration>,
}

impl ReplayGenerator {
    /// Replay an SSE transcript verbatim
    pub fn from_transcript(transcript: impl Into<String>) -> Self {
        let transcript = transcript.into();
        debug!(len = transcript.len(), "ReplayGenerator::from_transcript: called");
        Self {
            transcript: transcript.into_bytes(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            delay: None,
        }
    }

    /// Synthesize a transcript that streams `document` as token deltas and
    /// then sends it as the final frame
    pub fn from_document(document: &str, encoder: &FrameEncoder) -> Self {
        debug!(len = document.len(), "ReplayGenerator::from_document: called");
        Self::from_transcript(encoder.transcript(document, SYNTHETIC_TOKEN_CHARS))
    }

    /// Load a `.json` document or any other file as a raw transcript
    pub fn from_file(path: impl AsRef<Path>, encoder: &FrameEncoder) -> Result<Self, GeneratorError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "ReplayGenerator::from_file: called");
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(Self::from_document(content.trim(), encoder))
        } else {
            Ok(Self::from_transcript(content))
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause between chunks, to watch a replay unfold
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }
}

#[async_trait]
impl PlanGenerator for ReplayGenerator {
    async fn generate(&self, request: &PlanRequest) -> Result<ByteStream, GeneratorError> {
        debug!(
            message = %request.message,
            chunk_size = self.chunk_size,
            "ReplayGenerator::generate: called"
        );
        let chunks: Vec<Vec<u8>> = self.transcript.chunks(self.chunk_size).map(<[u8]>::to_vec).collect();
        let stream = futures::stream::iter(chunks);

        let stream = match self.delay {
            Some(delay) => stream
                .then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, GeneratorError>(chunk)
                })
                .boxed(),
            None => stream.map(Ok).boxed(),
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn collect(generator: &ReplayGenerator) -> Vec<Vec<u8>> {
        let stream = generator.generate(&PlanRequest::new("trip")).await.unwrap();
        stream.map(|chunk| chunk.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_chunks_reassemble_to_transcript() {
        let transcript = "event: token\ndata: Café\n\n";
        let generator = ReplayGenerator::from_transcript(transcript).with_chunk_size(5);

        let chunks = collect(&generator).await;
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), transcript.as_bytes());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_clamped() {
        let generator = ReplayGenerator::from_transcript("abc").with_chunk_size(0);
        assert_eq!(collect(&generator).await.len(), 3);
    }

    #[tokio::test]
    async fn test_replays_every_request() {
        let generator = ReplayGenerator::from_transcript("data: x\n\n");
        assert_eq!(collect(&generator).await, collect(&generator).await);
    }

    #[tokio::test]
    async fn test_delay_between_chunks() {
        let generator = ReplayGenerator::from_transcript("abcd")
            .with_chunk_size(2)
            .with_delay(Duration::from_millis(10));

        let start = tokio::time::Instant::now();
        assert_eq!(collect(&generator).await.len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_from_json_file_synthesizes_transcript() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(file, r#"{{"replyText":"Hi","planDays":[]}}"#).unwrap();

        let generator = ReplayGenerator::from_file(file.path(), &FrameEncoder::default()).unwrap();
        let transcript = String::from_utf8(generator.transcript().to_vec()).unwrap();

        assert!(transcript.contains("event: token\n"));
        assert!(transcript.contains("event: final\ndata: {\"replyText\":\"Hi\",\"planDays\":[]}\n\n"));
        assert!(transcript.ends_with("data: [DONE]\n\n"));
    }

    #[test]
    fn test_from_sse_file_is_verbatim() {
        let mut file = NamedTempFile::with_suffix(".sse").unwrap();
        write!(file, "event: token\ndata: x\n\n").unwrap();

        let generator = ReplayGenerator::from_file(file.path(), &FrameEncoder::default()).unwrap();
        assert_eq!(generator.transcript(), b"event: token\ndata: x\n\n");
    }

    #[test]
    fn test_missing_file() {
        let err = ReplayGenerator::from_file("/nonexistent/plan.sse", &FrameEncoder::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::Io(_)));
    }
}
