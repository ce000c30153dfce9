//! Batch enrichment tally

use serde::{Deserialize, Serialize};

/// Final state of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Fetched,
    Failed,
    Skipped,
}

/// Counters for one batch call
///
/// `total` is fixed to the batch size up front; every item lands in exactly
/// one of the other three counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub total: usize,
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl EnrichmentResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Fetched => self.fetched += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }

    /// `total == fetched + failed + skipped`
    pub fn is_balanced(&self) -> bool {
        self.total == self.fetched + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut result = EnrichmentResult::new(4);
        result.record(ItemOutcome::Fetched);
        result.record(ItemOutcome::Skipped);
        result.record(ItemOutcome::Failed);
        assert!(!result.is_balanced());

        result.record(ItemOutcome::Fetched);
        assert!(result.is_balanced());
        assert_eq!(
            result,
            EnrichmentResult {
                total: 4,
                fetched: 2,
                failed: 1,
                skipped: 1,
            }
        );
    }
}
