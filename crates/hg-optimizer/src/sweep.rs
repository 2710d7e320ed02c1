//! Sweep configuration, lifecycle status and the final report.

use chrono::{DateTime, Utc};
use hg_types::{
    config_error, Goal, ParameterSpace, SweepError, SweepResult, TrialResult, TrialStatus,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::search::Truncation;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Top-level configuration for a sweep.
///
/// The early-termination policy is not part of the serialized config; attach
/// it to the [`Sweep`](crate::Sweep) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// The parameter search space.
    pub parameter_space: ParameterSpace,

    /// Trials beyond this budget are never dispatched.
    pub max_total_trials: usize,

    /// How many trials may execute at once.
    pub max_concurrent: usize,

    /// Metric used to rank trials (e.g. "AUC").
    pub primary_metric: String,

    #[serde(default)]
    pub goal: Goal,

    /// Optional per-trial wall-clock budget in milliseconds.
    #[serde(default)]
    pub trial_timeout_ms: Option<u64>,

    /// Which trials to keep when the grid exceeds `max_total_trials`.
    #[serde(default)]
    pub truncation: Truncation,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, parameter_space: ParameterSpace) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameter_space,
            max_total_trials: 20,
            max_concurrent: 4,
            primary_metric: "AUC".to_string(),
            goal: Goal::Maximize,
            trial_timeout_ms: None,
            truncation: Truncation::First,
        }
    }

    pub fn with_max_total_trials(mut self, n: usize) -> Self {
        self.max_total_trials = n;
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_primary_metric(mut self, metric: &str, goal: Goal) -> Self {
        self.primary_metric = metric.to_string();
        self.goal = goal;
        self
    }

    /// Per-trial timeout, stored with millisecond granularity. Fractions of a
    /// millisecond round up, so any non-zero duration stays a valid timeout.
    pub fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.trial_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_ms.map(Duration::from_millis)
    }

    /// Reject budgets and metric names that cannot drive a sweep.
    pub fn validate(&self) -> SweepResult<()> {
        if self.max_total_trials == 0 {
            return Err(config_error!("max_total_trials must be at least 1"));
        }
        if self.max_concurrent == 0 {
            return Err(config_error!("max_concurrent must be at least 1"));
        }
        if self.primary_metric.trim().is_empty() {
            return Err(config_error!("primary_metric must not be empty"));
        }
        if self.trial_timeout_ms == Some(0) {
            return Err(config_error!("trial_timeout_ms must be positive when set"));
        }
        if self.max_concurrent > self.max_total_trials {
            warn!(
                max_concurrent = self.max_concurrent,
                max_total_trials = self.max_total_trials,
                "max_concurrent exceeds max_total_trials; extra slots stay idle"
            );
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> SweepResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Lifecycle state for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SweepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Aggregate status of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepStatus {
    pub id: SweepId,
    pub name: String,
    pub state: SweepState,
    pub trials_planned: usize,
    pub trials_dispatched: usize,
    pub trials_succeeded: usize,
    pub trials_failed: usize,
    pub trials_cancelled: usize,
    pub trials_running: usize,
    pub best_trial: Option<TrialResult>,
    pub best_value: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SweepStatus {
    pub fn new(id: SweepId, name: String) -> Self {
        Self {
            id,
            name,
            state: SweepState::Created,
            trials_planned: 0,
            trials_dispatched: 0,
            trials_succeeded: 0,
            trials_failed: 0,
            trials_cancelled: 0,
            trials_running: 0,
            best_trial: None,
            best_value: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, planned: usize) {
        self.state = SweepState::Running;
        self.trials_planned = planned;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SweepState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.state = SweepState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SweepState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn record_dispatch(&mut self) {
        self.trials_dispatched += 1;
        self.trials_running += 1;
    }

    /// Count a finished trial and update the running best. Returns true if
    /// the best changed.
    pub fn record_result(&mut self, result: &TrialResult, metric: &str, goal: Goal) -> bool {
        match result.status {
            TrialStatus::Succeeded => self.trials_succeeded += 1,
            TrialStatus::Failed => self.trials_failed += 1,
            TrialStatus::Cancelled => {
                self.trials_cancelled += 1;
                return false;
            }
        }
        self.trials_running = self.trials_running.saturating_sub(1);
        self.update_best(result, metric, goal)
    }

    /// Update the best trial if `result` improves on it. Equal values keep
    /// the lower `trial_index`.
    pub fn update_best(&mut self, result: &TrialResult, metric: &str, goal: Goal) -> bool {
        if !result.is_success() {
            return false;
        }
        let Some(value) = result.metric(metric) else {
            return false;
        };
        let improves = match (&self.best_trial, self.best_value) {
            (Some(current), Some(best)) => {
                goal.is_better(value, best)
                    || (value == best && result.trial_index < current.trial_index)
            }
            _ => true,
        };
        if improves {
            self.best_trial = Some(result.clone());
            self.best_value = Some(value);
        }
        improves
    }
}

/// Everything a finished sweep reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub state: SweepState,
    pub primary_metric: String,
    /// Every trial's outcome, ordered by `trial_index`.
    pub all_results: Vec<TrialResult>,
    pub best: Option<TrialResult>,
    pub status: SweepStatus,
}

impl SweepReport {
    /// The winning trial, or `NoEligibleTrial` if nothing succeeded with the
    /// primary metric logged.
    pub fn best_trial(&self) -> SweepResult<&TrialResult> {
        self.best.as_ref().ok_or_else(|| SweepError::NoEligibleTrial {
            metric: self.primary_metric.clone(),
        })
    }

    pub fn results_with_status(&self, status: TrialStatus) -> impl Iterator<Item = &TrialResult> {
        self.all_results.iter().filter(move |r| r.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_types::{ParameterSet, TrialSpec};
    use std::collections::HashMap;

    fn sample_config() -> SweepConfig {
        let space = ParameterSpace::new().add_choice("--regularization", vec![0.001, 0.01, 0.1]);
        SweepConfig::new("reg_sweep", space)
            .with_max_total_trials(3)
            .with_max_concurrent(2)
            .with_primary_metric("AUC", Goal::Maximize)
    }

    fn auc(index: usize, value: f64) -> TrialResult {
        let mut metrics = HashMap::new();
        metrics.insert("AUC".to_string(), value);
        TrialResult::succeeded(TrialSpec::new(index, ParameterSet::new()), metrics, Utc::now())
    }

    #[test]
    fn config_validation() {
        assert!(sample_config().validate().is_ok());
        assert!(matches!(
            sample_config().with_max_concurrent(0).validate(),
            Err(SweepError::Config(_))
        ));
        assert!(matches!(
            sample_config().with_max_total_trials(0).validate(),
            Err(SweepError::Config(_))
        ));
        assert!(matches!(
            sample_config().with_primary_metric(" ", Goal::Minimize).validate(),
            Err(SweepError::Config(_))
        ));
        // Over-provisioned concurrency is allowed.
        assert!(sample_config().with_max_concurrent(8).validate().is_ok());
    }

    #[test]
    fn config_from_json_applies_defaults() {
        let json = r#"{
            "name": "reg_sweep",
            "parameter_space": {"parameters": [
                {"name": "--regularization", "domain": {"kind": "choice", "values": [0.001, 0.01, 0.1]}}
            ]},
            "max_total_trials": 3,
            "max_concurrent": 2,
            "primary_metric": "AUC",
            "trial_timeout_ms": 60000
        }"#;
        let config = SweepConfig::from_json_str(json).unwrap();
        assert_eq!(config.goal, Goal::Maximize);
        assert_eq!(config.truncation, Truncation::First);
        assert_eq!(config.trial_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.parameter_space.grid_size(), Ok(3));
    }

    #[test]
    fn sub_millisecond_timeouts_round_up() {
        let config = sample_config().with_trial_timeout(Duration::from_micros(250));
        assert_eq!(config.trial_timeout_ms, Some(1));
        assert!(config.validate().is_ok());

        let config = sample_config().with_trial_timeout(Duration::from_micros(1500));
        assert_eq!(config.trial_timeout(), Some(Duration::from_millis(2)));

        let config = sample_config().with_trial_timeout(Duration::from_secs(3));
        assert_eq!(config.trial_timeout_ms, Some(3000));
    }

    #[test]
    fn config_from_json_rejects_bad_budget() {
        let json = r#"{
            "name": "bad",
            "parameter_space": {"parameters": []},
            "max_total_trials": 0,
            "max_concurrent": 1,
            "primary_metric": "AUC"
        }"#;
        assert!(matches!(
            SweepConfig::from_json_str(json),
            Err(SweepError::Config(_))
        ));
        assert!(matches!(
            SweepConfig::from_json_str("{"),
            Err(SweepError::Serialization(_))
        ));
    }

    #[test]
    fn status_lifecycle() {
        let mut status = SweepStatus::new(Uuid::new_v4(), "reg_sweep".into());
        assert_eq!(status.state, SweepState::Created);
        assert!(status.started_at.is_none());

        status.mark_running(3);
        assert_eq!(status.state, SweepState::Running);
        assert_eq!(status.trials_planned, 3);

        status.record_dispatch();
        assert_eq!(status.trials_running, 1);
        status.record_result(&auc(0, 0.9), "AUC", Goal::Maximize);
        assert_eq!(status.trials_running, 0);
        assert_eq!(status.trials_succeeded, 1);

        status.mark_completed();
        assert!(status.state.is_terminal());
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn best_tracking_with_tie_break() {
        let mut status = SweepStatus::new(Uuid::new_v4(), "t".into());
        assert!(status.update_best(&auc(4, 0.5), "AUC", Goal::Maximize));
        assert!(status.update_best(&auc(2, 0.5), "AUC", Goal::Maximize));
        assert!(!status.update_best(&auc(3, 0.5), "AUC", Goal::Maximize));
        assert!(!status.update_best(&auc(1, 0.4), "AUC", Goal::Maximize));
        assert_eq!(status.best_trial.as_ref().unwrap().trial_index, 2);

        assert!(status.update_best(&auc(7, 0.1), "AUC", Goal::Minimize));
        assert_eq!(status.best_value, Some(0.1));
    }

    #[test]
    fn report_without_best_is_no_eligible_trial() {
        let report = SweepReport {
            sweep_id: Uuid::new_v4(),
            state: SweepState::Completed,
            primary_metric: "AUC".into(),
            all_results: Vec::new(),
            best: None,
            status: SweepStatus::new(Uuid::new_v4(), "t".into()),
        };
        assert!(matches!(
            report.best_trial(),
            Err(SweepError::NoEligibleTrial { .. })
        ));
    }
}
