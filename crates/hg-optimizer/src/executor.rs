//! Trial execution with failure isolation.
//!
//! A [`TrialExecutor`] runs the user's [`TrainingProcedure`] for one
//! [`TrialSpec`] on tokio's blocking pool and always returns a
//! [`TrialResult`]: errors, panics and timeouts become `Failed` results rather
//! than propagating to the scheduler. Retries are not attempted here.

use chrono::Utc;
use hg_types::{ParameterSet, TrialError, TrialResult, TrialSpec};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Handle passed to the training procedure for reporting metrics.
///
/// Every logged value is retained; the trial result carries the last value
/// per name. Non-finite values are dropped.
#[derive(Debug, Clone, Default)]
pub struct MetricLogger {
    series: Arc<Mutex<HashMap<String, Vec<f64>>>>,
}

impl MetricLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if !value.is_finite() {
            warn!(metric = %name, value, "ignoring non-finite metric value");
            return;
        }
        self.series.lock().entry(name).or_default().push(value);
    }

    /// Most recent value for `name`.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.series
            .lock()
            .get(name)
            .and_then(|values| values.last().copied())
    }

    /// Every value logged for `name`, oldest first.
    pub fn history(&self, name: &str) -> Vec<f64> {
        self.series.lock().get(name).cloned().unwrap_or_default()
    }

    /// Last value per metric.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.series
            .lock()
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), *v)))
            .collect()
    }
}

/// The opaque, user-supplied training routine.
///
/// Implemented for any `Fn(&ParameterSet, &MetricLogger) -> anyhow::Result<()>`.
pub trait TrainingProcedure: Send + Sync + 'static {
    fn train(&self, params: &ParameterSet, logger: &MetricLogger) -> anyhow::Result<()>;
}

impl<F> TrainingProcedure for F
where
    F: Fn(&ParameterSet, &MetricLogger) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn train(&self, params: &ParameterSet, logger: &MetricLogger) -> anyhow::Result<()> {
        self(params, logger)
    }
}

/// Runs single trials.
#[derive(Clone)]
pub struct TrialExecutor {
    procedure: Arc<dyn TrainingProcedure>,
    timeout: Option<Duration>,
}

impl TrialExecutor {
    pub fn new<P: TrainingProcedure>(procedure: P) -> Self {
        Self {
            procedure: Arc::new(procedure),
            timeout: None,
        }
    }

    /// Per-trial wall-clock budget. On expiry the trial is recorded as failed
    /// and its slot is released, but the procedure itself keeps running on
    /// its blocking thread until it returns.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute one trial. Never fails: every outcome is encoded in the result.
    pub async fn execute(&self, spec: TrialSpec) -> TrialResult {
        let started_at = Utc::now();
        let logger = MetricLogger::new();

        let procedure = Arc::clone(&self.procedure);
        let params = spec.params.clone();
        let trial_logger = logger.clone();
        let handle =
            tokio::task::spawn_blocking(move || procedure.train(&params, &trial_logger));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        trial = spec.trial_index,
                        timeout_ms = limit.as_millis() as u64,
                        "trial exceeded its time budget"
                    );
                    return TrialResult::failed(
                        spec,
                        logger.snapshot(),
                        TrialError::Timeout.to_string(),
                        started_at,
                    );
                }
            },
            None => handle.await,
        };

        let failure = match joined {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(TrialError::Failed {
                message: format!("{e:#}"),
            }),
            Err(join_error) if join_error.is_panic() => Some(TrialError::Panicked {
                message: panic_message(join_error.into_panic()),
            }),
            Err(join_error) => Some(TrialError::Failed {
                message: join_error.to_string(),
            }),
        };

        let metrics = logger.snapshot();
        match failure {
            None => {
                debug!(
                    trial = spec.trial_index,
                    metrics = metrics.len(),
                    "trial succeeded"
                );
                TrialResult::succeeded(spec, metrics, started_at)
            }
            Some(error) => {
                warn!(trial = spec.trial_index, error = %error, "trial failed");
                TrialResult::failed(spec, metrics, error.to_string(), started_at)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
