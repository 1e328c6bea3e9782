use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::batch::CandidateRecord;
use crate::selection::random::RandomSource;
use crate::types::identifiers::RecordId;

/// Bookkeeping for one pass over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCounters {
    pub processed: usize,
    pub excluded_protected: usize,
    pub excluded_historical: usize,
    pub not_drawn: usize,
    pub selected: usize,
}

impl SelectionCounters {
    /// Records that were neither protected nor previously selected.
    pub fn eligible(&self) -> usize {
        self.processed - self.excluded_protected - self.excluded_historical
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} records. Selected {} of {} eligible. Skipped (protected): {}. Skipped (previously selected): {}. Not selected by draw: {}.",
            self.processed,
            self.selected,
            self.eligible(),
            self.excluded_protected,
            self.excluded_historical,
            self.not_drawn,
        )
    }
}

pub struct SelectionOutcome {
    /// Chosen records, in batch order.
    pub chosen: Vec<CandidateRecord>,
    pub counters: SelectionCounters,
}

/// Walk the batch once, in order, gating each record independently.
///
/// Protected records and ids already in `history` are skipped without a draw.
/// Every chosen id joins the working history immediately, so the same id is
/// never chosen twice within a pass.
pub fn apply_selection<R: RandomSource + ?Sized>(
    batch: &[CandidateRecord],
    history: &HashSet<RecordId>,
    probability: f64,
    random: &mut R,
) -> SelectionOutcome {
    let mut chosen = Vec::new();
    let mut chosen_ids: HashSet<&RecordId> = HashSet::new();
    let mut counters = SelectionCounters::default();

    for record in batch {
        counters.processed += 1;

        if record.protected_class {
            counters.excluded_protected += 1;
            continue;
        }

        if history.contains(&record.id) || chosen_ids.contains(&record.id) {
            counters.excluded_historical += 1;
            continue;
        }

        if probability > 0.0 && random.next_unit() < probability {
            chosen_ids.insert(&record.id);
            chosen.push(record.clone());
            counters.selected += 1;
        } else {
            counters.not_drawn += 1;
        }
    }

    debug_assert_eq!(
        counters.processed,
        counters.excluded_protected + counters.excluded_historical + counters.not_drawn + counters.selected
    );

    SelectionOutcome { chosen, counters }
}
