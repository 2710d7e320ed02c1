//! Trial specifications, results and the optimization goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::space::ParameterValue;

/// One concrete assignment: parameter name → value.
pub type ParameterSet = HashMap<String, ParameterValue>;

/// Whether the primary metric is maximized or minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Goal {
    #[default]
    Maximize,
    Minimize,
}

impl Goal {
    /// True if `candidate` is strictly better than `incumbent`.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }
}

/// An immutable trial assignment produced by a search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    /// Generation-order index, starting at 0.
    pub trial_index: usize,
    pub params: ParameterSet,
}

impl TrialSpec {
    pub fn new(trial_index: usize, params: ParameterSet) -> Self {
        Self {
            trial_index,
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of a single trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_index: usize,
    pub params: ParameterSet,
    /// Last logged value per metric name.
    pub metrics: HashMap<String, f64>,
    pub status: TrialStatus,
    pub error: Option<String>,
    /// `None` when the trial was never dispatched.
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl TrialResult {
    pub fn succeeded(
        spec: TrialSpec,
        metrics: HashMap<String, f64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trial_index: spec.trial_index,
            params: spec.params,
            metrics,
            status: TrialStatus::Succeeded,
            error: None,
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        spec: TrialSpec,
        metrics: HashMap<String, f64>,
        error: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trial_index: spec.trial_index,
            params: spec.params,
            metrics,
            status: TrialStatus::Failed,
            error: Some(error),
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    /// A trial that was never admitted because the sweep stopped.
    pub fn cancelled(spec: TrialSpec) -> Self {
        Self {
            trial_index: spec.trial_index,
            params: spec.params,
            metrics: HashMap::new(),
            status: TrialStatus::Cancelled,
            error: None,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TrialStatus::Succeeded
    }

    /// Finite value of `metric`, if logged.
    pub fn metric(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().filter(|v| v.is_finite())
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.started_at.map(|start| self.finished_at - start)
    }
}
