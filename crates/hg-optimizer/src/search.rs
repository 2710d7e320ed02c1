//! Trial enumeration and truncation to the trial budget.

use hg_types::{ParameterSet, ParameterSpace, ParameterValue, SweepResult, TrialSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Common trait for trial enumeration strategies.
pub trait SearchStrategy: Send + Sync {
    /// Expand the space into a finite, ordered sequence of trials with
    /// `trial_index` values `0..N`. Must be a pure function of the space.
    fn enumerate(&self, space: &ParameterSpace) -> SweepResult<Vec<TrialSpec>>;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Grid search ----

/// Exhaustive grid search over discrete parameter combinations.
///
/// Parameters are expanded in declaration order: the first declared parameter
/// varies slowest and the last declared varies fastest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl GridSearch {
    pub fn new() -> Self {
        Self
    }

    fn build_grid(space: &ParameterSpace) -> Vec<ParameterSet> {
        let axes: Vec<(&str, Vec<ParameterValue>)> = space
            .parameters
            .iter()
            .map(|param| (param.name.as_str(), param.domain.values()))
            .collect();

        // Cartesian product; the empty space yields one empty assignment.
        let mut result: Vec<ParameterSet> = vec![ParameterSet::new()];
        for (name, values) in &axes {
            let mut next = Vec::with_capacity(result.len() * values.len());
            for existing in &result {
                for value in values {
                    let mut combo = existing.clone();
                    combo.insert(name.to_string(), value.clone());
                    next.push(combo);
                }
            }
            result = next;
        }

        result
    }
}

impl SearchStrategy for GridSearch {
    fn enumerate(&self, space: &ParameterSpace) -> SweepResult<Vec<TrialSpec>> {
        let expected = space.grid_size()?;
        let trials: Vec<TrialSpec> = Self::build_grid(space)
            .into_iter()
            .enumerate()
            .map(|(index, params)| TrialSpec::new(index, params))
            .collect();
        debug_assert_eq!(trials.len(), expected);

        debug!(
            parameters = space.len(),
            trials = trials.len(),
            "grid enumerated"
        );
        Ok(trials)
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Truncation ----

/// How to cut the generated trials down to `max_total_trials`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Truncation {
    /// Keep the first `cap` trials in generation order.
    #[default]
    First,
    /// Keep a seeded uniform random subset of size `cap`, still dispatched in
    /// generation order.
    Sampled { seed: u64 },
}

/// Apply the trial budget. Kept trials retain their original `trial_index`.
pub fn plan_trials(trials: Vec<TrialSpec>, cap: usize, truncation: Truncation) -> Vec<TrialSpec> {
    let generated = trials.len();
    if generated <= cap {
        return trials;
    }

    let planned: Vec<TrialSpec> = match truncation {
        Truncation::First => {
            let mut trials = trials;
            trials.truncate(cap);
            trials
        }
        Truncation::Sampled { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut keep = vec![false; generated];
            for index in rand::seq::index::sample(&mut rng, generated, cap).into_vec() {
                keep[index] = true;
            }
            trials
                .into_iter()
                .zip(keep)
                .filter_map(|(trial, kept)| kept.then_some(trial))
                .collect()
        }
    };

    info!(
        generated,
        cap,
        mode = ?truncation,
        "trial grid truncated to budget"
    );
    planned
}
