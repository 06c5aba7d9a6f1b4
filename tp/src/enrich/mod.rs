//! Post-finalize place enrichment
//!
//! After a turn finalizes, every item without metadata is looked up with
//! bounded concurrency. Hits come back as [`ItemPatch`]es that carry the
//! item's dedup key, so a patch still lands on the right item if the user
//! moved it while the lookup was in flight. Misses and failures are skipped.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, warn};

pub mod client;
mod error;
mod http;

pub use client::Enricher;
pub use error::EnrichError;
pub use http::HttpEnricher;

use crate::plan::{ItemPatch, PlanDocument, PlanItem, SlotRef};

/// Items that still need a lookup, with their current positions
pub fn targets(document: &PlanDocument) -> Vec<(SlotRef, PlanItem)> {
    document
        .days()
        .iter()
        .enumerate()
        .flat_map(|(day, bucket)| {
            bucket
                .iter()
                .enumerate()
                .filter(|(_, item)| item.metadata.is_empty())
                .map(move |(index, item)| (SlotRef::new(day, index), item.clone()))
        })
        .collect()
}

/// Look up every target, at most `concurrency` at a time, yielding hits as they land
pub fn lookup_all(
    enricher: Arc<dyn Enricher>,
    targets: Vec<(SlotRef, PlanItem)>,
    context: Option<String>,
    concurrency: usize,
) -> BoxStream<'static, (SlotRef, ItemPatch)> {
    debug!(targets = targets.len(), concurrency, "lookup_all: called");
    let context: Option<Arc<str>> = context.map(Arc::from);

    futures::stream::iter(targets)
        .map(move |(slot, item)| {
            let enricher = Arc::clone(&enricher);
            let context = context.clone();
            async move {
                match enricher.lookup(&item.title, context.as_deref()).await {
                    Ok(Some(metadata)) => Some((slot, ItemPatch::for_item(&item, metadata))),
                    Ok(None) => {
                        debug!(title = %item.title, "lookup_all: no match");
                        None
                    }
                    Err(e) => {
                        warn!(title = %item.title, error = %e, "lookup_all: lookup failed, skipping");
                        None
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|hit| async move { hit })
        .boxed()
}
