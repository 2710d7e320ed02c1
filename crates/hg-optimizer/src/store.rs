//! Append-only store of trial results.

use dashmap::DashMap;
use hg_types::{SweepError, SweepResult, TrialResult, TrialStatus};
use parking_lot::RwLock;

/// Per-status counts over the stored results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Thread-safe, append-only collection of [`TrialResult`]s.
///
/// Results are keyed by `trial_index` and also remembered in the order they
/// were recorded (completion order).
#[derive(Debug, Default)]
pub struct ResultStore {
    results: DashMap<usize, TrialResult>,
    completion_order: RwLock<Vec<usize>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result. Each trial may be recorded once.
    pub fn record(&self, result: TrialResult) -> SweepResult<()> {
        // Hold the order lock across the insert so readers never see a key
        // without its position.
        let mut order = self.completion_order.write();
        let trial_index = result.trial_index;
        if self.results.contains_key(&trial_index) {
            return Err(SweepError::DuplicateResult { trial_index });
        }
        self.results.insert(trial_index, result);
        order.push(trial_index);
        Ok(())
    }

    pub fn get(&self, trial_index: usize) -> Option<TrialResult> {
        self.results.get(&trial_index).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, trial_index: usize) -> bool {
        self.results.contains_key(&trial_index)
    }

    pub fn len(&self) -> usize {
        self.completion_order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Results in the order they completed.
    pub fn by_completion(&self) -> Vec<TrialResult> {
        let order = self.completion_order.read();
        order
            .iter()
            .filter_map(|index| self.results.get(index).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Results sorted by `trial_index`, for deterministic reporting.
    pub fn by_trial_index(&self) -> Vec<TrialResult> {
        let mut results = self.by_completion();
        results.sort_by_key(|r| r.trial_index);
        results
    }

    pub fn counts(&self) -> ResultCounts {
        let mut counts = ResultCounts::default();
        for entry in self.results.iter() {
            match entry.value().status {
                TrialStatus::Succeeded => counts.succeeded += 1,
                TrialStatus::Failed => counts.failed += 1,
                TrialStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hg_types::{ParameterSet, TrialSpec};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn result(index: usize, status: TrialStatus) -> TrialResult {
        let spec = TrialSpec::new(index, ParameterSet::new());
        match status {
            TrialStatus::Succeeded => TrialResult::succeeded(spec, HashMap::new(), Utc::now()),
            TrialStatus::Failed => {
                TrialResult::failed(spec, HashMap::new(), "boom".into(), Utc::now())
            }
            TrialStatus::Cancelled => TrialResult::cancelled(spec),
        }
    }

    #[test]
    fn keeps_completion_and_index_order() {
        let store = ResultStore::new();
        for index in [2, 0, 3, 1] {
            store.record(result(index, TrialStatus::Succeeded)).unwrap();
        }

        let completion: Vec<usize> = store.by_completion().iter().map(|r| r.trial_index).collect();
        assert_eq!(completion, vec![2, 0, 3, 1]);

        let sorted: Vec<usize> = store.by_trial_index().iter().map(|r| r.trial_index).collect();
        assert_eq!(sorted, vec![0, 1, 2, 3]);

        assert_eq!(store.len(), 4);
        assert_eq!(store.get(3).map(|r| r.trial_index), Some(3));
        assert!(store.get(9).is_none());
    }

    #[test]
    fn rejects_duplicate_results() {
        let store = ResultStore::new();
        store.record(result(5, TrialStatus::Succeeded)).unwrap();
        let err = store.record(result(5, TrialStatus::Failed)).unwrap_err();
        assert!(matches!(err, SweepError::DuplicateResult { trial_index: 5 }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(5).unwrap().status, TrialStatus::Succeeded);
    }

    #[test]
    fn counts_by_status() {
        let store = ResultStore::new();
        store.record(result(0, TrialStatus::Succeeded)).unwrap();
        store.record(result(1, TrialStatus::Failed)).unwrap();
        store.record(result(2, TrialStatus::Cancelled)).unwrap();
        store.record(result(3, TrialStatus::Succeeded)).unwrap();
        assert_eq!(
            store.counts(),
            ResultCounts {
                succeeded: 2,
                failed: 1,
                cancelled: 1,
            }
        );
    }

    #[test]
    fn concurrent_writers() {
        let store = Arc::new(ResultStore::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .record(result(worker * 25 + i, TrialStatus::Succeeded))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 100);
        assert_eq!(store.by_trial_index().len(), 100);
    }
}
