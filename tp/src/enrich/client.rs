//! Enricher trait definition

use async_trait::async_trait;

use super::EnrichError;
use crate::plan::ItemMetadata;

/// Best-effort place lookup
///
/// `Ok(None)` means the place is unknown; callers treat errors the same way.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn lookup(&self, title: &str, context: Option<&str>) -> Result<Option<ItemMetadata>, EnrichError>;
}
