//! PlanReconciler - sole owner of the live itinerary
//!
//! Two write paths feed the document during a planning turn:
//!
//! - [`merge_progress`](PlanReconciler::merge_progress) applies extraction
//!   results from the growing stream buffer. It is idempotent: re-merging the
//!   same (or a longer) buffer only ever adds genuinely new items.
//! - [`finalize`](PlanReconciler::finalize) replaces everything with the
//!   sanitized terminal document and latches until the next turn.
//!
//! User moves and enrichment patches go through
//! [`apply_move`](PlanReconciler::apply_move) and
//! [`apply_item_patch`](PlanReconciler::apply_item_patch). Every method runs
//! to completion without yielding, so readers never see a half-applied change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{MoveRejection, PlanError};
use super::types::{DayBucket, ExtractedDay, FinalPlan, ItemMetadata, PlanDocument, PlanItem, SlotRef};

/// Per-day item bounds applied at finalize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub min_items: usize,
    pub max_items: usize,
}

impl PlanLimits {
    pub const STRICT: PlanLimits = PlanLimits {
        min_items: 3,
        max_items: 5,
    };

    pub const LEGACY: PlanLimits = PlanLimits {
        min_items: 3,
        max_items: 7,
    };
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Result of one progressive merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    /// The turn was already finalized; nothing was applied
    pub ignored: bool,
}

/// A day left below the minimum after backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Underfill {
    pub day: usize,
    pub len: usize,
}

/// What finalize had to correct in the generator's document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub turn: u64,
    pub days: usize,
    pub duplicates_removed: usize,
    pub truncated: usize,
    pub backfilled: usize,
    pub underfilled: Vec<Underfill>,
}

/// Where a moved item ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub from: SlotRef,
    pub to: SlotRef,
    /// The item was gone at drop time and the drag snapshot was inserted
    pub restored_from_snapshot: bool,
}

/// Metadata patch for an already-placed item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    /// Dedup key the target must still have; lets a patch follow a moved item
    pub expected_key: Option<String>,
    pub metadata: ItemMetadata,
}

impl ItemPatch {
    pub fn for_item(item: &PlanItem, metadata: ItemMetadata) -> Self {
        Self {
            expected_key: Some(item.key()),
            metadata,
        }
    }
}

/// Owner of the canonical [`PlanDocument`]
#[derive(Debug, Clone)]
pub struct PlanReconciler {
    document: PlanDocument,
    limits: PlanLimits,
    finalized: bool,
    turn: u64,
    /// Keys the user dragged out of each day this turn; the stream must not re-add them
    moved_out: Vec<HashSet<String>>,
}

impl PlanReconciler {
    pub fn new(limits: PlanLimits) -> Self {
        debug!(?limits, "PlanReconciler::new: called");
        Self {
            document: PlanDocument::new(),
            limits,
            finalized: false,
            turn: 0,
            moved_out: Vec::new(),
        }
    }

    pub fn document(&self) -> &PlanDocument {
        &self.document
    }

    pub fn limits(&self) -> PlanLimits {
        self.limits
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Start a new planning turn: clear the document and reset the latch
    pub fn begin_turn(&mut self) -> u64 {
        self.turn += 1;
        self.document = PlanDocument::new();
        self.finalized = false;
        self.moved_out.clear();
        info!(turn = self.turn, "begin_turn: document cleared");
        self.turn
    }

    /// Append newly-seen items from an extraction pass
    pub fn merge_progress(&mut self, candidate: &[ExtractedDay]) -> MergeOutcome {
        if self.finalized {
            debug!(turn = self.turn, "merge_progress: turn finalized, ignoring");
            return MergeOutcome { added: 0, ignored: true };
        }

        let max = self.limits.max_items;
        let mut added = 0;

        for extracted in candidate {
            let moved_out = self.moved_out.get(extracted.day_index);
            let day = self.document.day_mut_or_grow(extracted.day_index);
            let mut keys: HashSet<String> = day.iter().map(PlanItem::key).collect();

            for item in &extracted.bucket {
                if day.len() >= max {
                    break;
                }
                let key = item.key();
                if moved_out.is_some_and(|gone| gone.contains(&key)) {
                    continue;
                }
                if keys.insert(key) {
                    day.push(item.clone());
                    added += 1;
                }
            }

            let (removed, truncated) = dedup_and_cap(day, max);
            if removed + truncated > 0 {
                warn!(
                    day = extracted.day_index,
                    removed, truncated, "merge_progress: safety pass corrected day"
                );
            }
        }

        if added > 0 {
            debug!(
                turn = self.turn,
                added,
                total = self.document.total_items(),
                "merge_progress: merged"
            );
        }
        MergeOutcome { added, ignored: false }
    }

    /// Replace the document with the sanitized terminal plan
    ///
    /// Dedups each day, truncates to the maximum, backfills short days from
    /// the suggestions and then from every item in the plan, and latches so
    /// later progress merges for this turn are ignored.
    pub fn finalize(&mut self, plan: FinalPlan) -> Result<FinalizeReport, PlanError> {
        debug!(turn = self.turn, days = plan.days.len(), "finalize: called");
        if self.finalized {
            return Err(PlanError::AlreadyFinalized(self.turn));
        }

        let FinalPlan { days, suggestions, .. } = plan;
        let pool: Vec<PlanItem> = suggestions.iter().chain(days.iter().flatten()).cloned().collect();
        let mut days = days;

        let mut report = FinalizeReport {
            turn: self.turn,
            days: days.len(),
            ..Default::default()
        };

        for (index, day) in days.iter_mut().enumerate() {
            let (removed, truncated) = dedup_and_cap(day, self.limits.max_items);
            report.duplicates_removed += removed;
            report.truncated += truncated;

            if day.len() < self.limits.min_items {
                report.backfilled += backfill(day, &pool, self.limits.min_items);
            }
            if day.len() < self.limits.min_items {
                warn!(day = index, len = day.len(), "finalize: day under-filled after backfill");
                report.underfilled.push(Underfill { day: index, len: day.len() });
            }
        }

        self.document = PlanDocument::from_days(days);
        self.finalized = true;
        info!(
            turn = self.turn,
            days = report.days,
            duplicates_removed = report.duplicates_removed,
            truncated = report.truncated,
            backfilled = report.backfilled,
            "finalize: document replaced"
        );
        Ok(report)
    }

    /// Merge metadata into an existing item without moving it
    ///
    /// With an `expected_key`, a patch whose target was moved follows the item
    /// (same day first, then the whole plan).
    pub fn apply_item_patch(&mut self, day: usize, index: usize, patch: ItemPatch) -> Result<SlotRef, PlanError> {
        debug!(day, index, expected_key = ?patch.expected_key, "apply_item_patch: called");
        let requested = SlotRef::new(day, index);

        let slot = match (&patch.expected_key, self.document.item(requested)) {
            (None, Some(_)) => requested,
            (None, None) => return Err(PlanError::NoSuchItem { day, index }),
            (Some(key), Some(item)) if item.key() == *key => requested,
            (Some(key), _) => self
                .document
                .find_key(key, Some(day))
                .ok_or_else(|| PlanError::StaleTarget { key: key.clone() })?,
        };

        let bucket = &mut self.document.days_mut()[slot.day];
        bucket[slot.index] = bucket[slot.index].with_metadata(&patch.metadata);
        Ok(slot)
    }

    /// Atomically move an item, clamping the target against the current document
    ///
    /// `to.index` is the insert position, clamped to `0..=len`; within one day
    /// it is applied after the item is removed. The item is located
    /// by the snapshot's key if indexes shifted since the drag began; if it is
    /// gone entirely the snapshot is inserted instead.
    pub fn apply_move(&mut self, from: SlotRef, to: SlotRef, snapshot: &PlanItem) -> Result<MoveOutcome, MoveRejection> {
        debug!(%from, %to, title = %snapshot.title, "apply_move: called");
        if self.document.is_empty() {
            return Err(MoveRejection::EmptyDocument);
        }

        let key = snapshot.key();
        let target_day = to.day.min(self.document.len() - 1);
        let source = match self.document.item(from) {
            Some(item) if item.key() == key => Some(from),
            _ => self.document.find_key(&key, Some(from.day)),
        };

        if let Some(source) = source
            && source.day == target_day
        {
            let day = &mut self.document.days_mut()[target_day];
            let item = day.remove(source.index);
            let index = to.index.min(day.len());
            day.insert(index, item);
            debug!(from = %source, to = %SlotRef::new(target_day, index), "apply_move: reordered within day");
            return Ok(MoveOutcome {
                from: source,
                to: SlotRef::new(target_day, index),
                restored_from_snapshot: false,
            });
        }

        let target_bucket = &self.document.days()[target_day];
        if target_bucket.iter().any(|item| item.key() == key) {
            return Err(MoveRejection::DuplicateInTargetDay);
        }
        if target_bucket.len() >= self.limits.max_items {
            return Err(MoveRejection::TargetDayFull);
        }

        let days = self.document.days_mut();
        let (item, from_slot, restored) = match source {
            Some(source) => (days[source.day].remove(source.index), source, false),
            None => {
                warn!(title = %snapshot.title, "apply_move: item vanished during drag, restoring snapshot");
                (snapshot.clone(), from, true)
            }
        };
        let index = to.index.min(days[target_day].len());
        days[target_day].insert(index, item);

        if self.moved_out.len() <= from_slot.day {
            self.moved_out.resize_with(from_slot.day + 1, HashSet::new);
        }
        self.moved_out[from_slot.day].insert(key);

        debug!(from = %from_slot, to = %SlotRef::new(target_day, index), "apply_move: moved across days");
        Ok(MoveOutcome {
            from: from_slot,
            to: SlotRef::new(target_day, index),
            restored_from_snapshot: restored,
        })
    }
}

/// Drop later duplicates by key, then truncate; returns (removed, truncated)
fn dedup_and_cap(day: &mut DayBucket, max_items: usize) -> (usize, usize) {
    let before = day.len();
    let mut seen = HashSet::new();
    day.retain(|item| seen.insert(item.key()));
    let removed = before - day.len();

    let truncated = day.len().saturating_sub(max_items);
    day.truncate(max_items);
    (removed, truncated)
}

/// Fill `day` up to `min_items` from `pool`, skipping keys already present
fn backfill(day: &mut DayBucket, pool: &[PlanItem], min_items: usize) -> usize {
    let mut keys: HashSet<String> = day.iter().map(PlanItem::key).collect();
    let mut added = 0;
    for candidate in pool {
        if day.len() >= min_items {
            break;
        }
        if keys.insert(candidate.key()) {
            day.push(candidate.clone());
            added += 1;
        }
    }
    added
}
