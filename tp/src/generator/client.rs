//! PlanGenerator trait definition

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::GeneratorError;

/// Raw response body, chunked however the transport delivers it
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, GeneratorError>>;

/// What the user asked for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
}

impl PlanRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }

    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = Some(guests);
        self
    }

    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.message.trim().is_empty() {
            return Err(GeneratorError::InvalidRequest("message is empty".to_string()));
        }
        if self.days == Some(0) {
            return Err(GeneratorError::InvalidRequest("days must be at least 1".to_string()));
        }
        if self.guests == Some(0) {
            return Err(GeneratorError::InvalidRequest("guests must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Lookup context for enrichment: the destination, if given
    pub fn context(&self) -> Option<&str> {
        self.destination.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// Calendar date of day `index`, when a start date is known
    pub fn date_of_day(&self, index: usize) -> Option<NaiveDate> {
        let offset = u64::try_from(index).ok()?;
        self.start_date?.checked_add_days(chrono::Days::new(offset))
    }
}

/// Source of plan event streams
///
/// Each call is one planning turn: the returned stream yields the raw
/// text/event-stream body until the generator closes it.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, request: &PlanRequest) -> Result<ByteStream, GeneratorError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One scripted response
    pub enum MockReply {
        /// Yield these chunks, then close
        Chunks(Vec<Vec<u8>>),
        /// Yield these chunks, then fail mid-stream
        ChunksThenError(Vec<Vec<u8>>, GeneratorError),
        /// Yield these chunks, then never close
        ChunksThenHang(Vec<Vec<u8>>),
        /// Fail before any byte arrives
        Refuse(GeneratorError),
    }

    /// Mock generator for unit tests
    pub struct MockPlanGenerator {
        replies: Mutex<Vec<MockReply>>,
        call_count: AtomicUsize,
    }

    impl MockPlanGenerator {
        pub fn new(replies: Vec<MockReply>) -> Self {
            debug!(reply_count = %replies.len(), "MockPlanGenerator::new: called");
            Self {
                replies: Mutex::new(replies),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Convenience for a single reply made of text chunks
        pub fn from_text_chunks(chunks: &[&str]) -> Self {
            Self::new(vec![MockReply::Chunks(
                chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            )])
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    fn ok_chunks(chunks: Vec<Vec<u8>>) -> impl futures::Stream<Item = Result<Vec<u8>, GeneratorError>> {
        futures::stream::iter(chunks.into_iter().map(Ok))
    }

    #[async_trait]
    impl PlanGenerator for MockPlanGenerator {
        async fn generate(&self, request: &PlanRequest) -> Result<ByteStream, GeneratorError> {
            debug!(message = %request.message, "MockPlanGenerator::generate: called");
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    return Err(GeneratorError::Server("No more mock replies".to_string()));
                }
                replies.remove(0)
            };

            let stream = match reply {
                MockReply::Chunks(chunks) => ok_chunks(chunks).boxed(),
                MockReply::ChunksThenError(chunks, error) => ok_chunks(chunks)
                    .chain(futures::stream::once(async move { Err(error) }))
                    .boxed(),
                MockReply::ChunksThenHang(chunks) => ok_chunks(chunks).chain(futures::stream::pending()).boxed(),
                MockReply::Refuse(error) => return Err(error),
            };
            Ok(stream)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_generator_replays_chunks() {
            let generator = MockPlanGenerator::from_text_chunks(&["a", "b"]);
            let stream = generator.generate(&PlanRequest::new("trip")).await.unwrap();

            let chunks: Vec<_> = stream.collect().await;
            assert_eq!(chunks.len(), 2);
            assert_eq!(generator.call_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_generator_errors_when_exhausted() {
            let generator = MockPlanGenerator::new(vec![]);
            assert!(generator.generate(&PlanRequest::new("trip")).await.is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_unset_fields() {
        let request = PlanRequest::new("Weekend in San Diego")
            .with_destination("San Diego")
            .with_start_date(NaiveDate::from_ymd_opt(2026, 11, 6).unwrap())
            .with_days(2);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"], "Weekend in San Diego");
        assert_eq!(value["destination"], "San Diego");
        assert_eq!(value["start_date"], "2026-11-06");
        assert_eq!(value["days"], 2);
        assert!(value.get("guests").is_none());
    }

    #[test]
    fn test_validate() {
        assert!(PlanRequest::new("trip").validate().is_ok());
        assert!(PlanRequest::new("   ").validate().is_err());
        assert!(PlanRequest::new("trip").with_days(0).validate().is_err());
        assert!(PlanRequest::new("trip").with_guests(0).validate().is_err());
    }

    #[test]
    fn test_context_and_dates() {
        let request = PlanRequest::new("trip").with_start_date(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
        assert_eq!(request.context(), None);
        assert_eq!(request.date_of_day(1), NaiveDate::from_ymd_opt(2027, 1, 1));

        let request = PlanRequest::new("trip").with_destination("Lisbon");
        assert_eq!(request.context(), Some("Lisbon"));
        assert_eq!(request.date_of_day(0), None);
    }
}
