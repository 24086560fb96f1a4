use std::collections::BTreeMap;

use crate::classifier::{Classification, DiscrepancyKind};
use crate::dispatcher::ReplayOutcome;

#[derive(PartialEq, Debug, Clone)]
pub struct OutcomeCounts {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub discrepancies: BTreeMap<DiscrepancyKind, usize>,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }

    /// Zero when nothing was replayed.
    pub fn success_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.success as f64 / total as f64 * 100.0
    }
}

pub struct AggregatedOutcomes {
    success_count: usize,
    failed_count: usize,
    skipped_count: usize,
    discrepancy_counts: BTreeMap<DiscrepancyKind, usize>,
}

impl AggregatedOutcomes {
    pub fn new() -> AggregatedOutcomes {
        AggregatedOutcomes {
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            discrepancy_counts: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, outcome: &ReplayOutcome) {
        match outcome.classification {
            Classification::Success => self.success_count += 1,
            Classification::Failed => self.failed_count += 1,
            Classification::Skipped => self.skipped_count += 1,
        }

        if outcome.discrepancy.kind != DiscrepancyKind::None {
            *self
                .discrepancy_counts
                .entry(outcome.discrepancy.kind)
                .or_insert(0) += 1;
        }
    }

    pub fn result(&self) -> OutcomeCounts {
        OutcomeCounts {
            success: self.success_count,
            failed: self.failed_count,
            skipped: self.skipped_count,
            discrepancies: self.discrepancy_counts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Discrepancy;
    use crate::dispatcher::ReplayError;

    fn success() -> ReplayOutcome {
        ReplayOutcome {
            classification: Classification::Success,
            discrepancy: Discrepancy::none(),
            latency_ms: Some(10.0),
            response: None,
        }
    }

    #[test]
    fn test_counts() {
        let mut outcomes = AggregatedOutcomes::new();

        outcomes.add(&success());
        outcomes.add(&success());
        outcomes.add(&ReplayOutcome::skipped());
        outcomes.add(&ReplayOutcome::failed(&ReplayError::Network("refused".to_string())));

        let result = outcomes.result();

        assert_eq!(result.success, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.total(), 4);
        assert_eq!(result.success_percent(), 50.0);
        assert_eq!(result.discrepancies.get(&DiscrepancyKind::NetworkError), Some(&1));
        assert_eq!(result.discrepancies.len(), 1);
    }

    #[test]
    fn test_empty_success_percent() {
        let result = AggregatedOutcomes::new().result();

        assert_eq!(result.total(), 0);
        assert_eq!(result.success_percent(), 0.0);
    }
}
