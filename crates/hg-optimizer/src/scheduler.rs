//! Sweep scheduling: bounded-concurrency admission of trials.
//!
//! A single coordination loop owns the [`RunState`] and is the only writer of
//! `pending`, `in_flight` and `completed`. Trials run on a [`JoinSet`] of
//! executor tasks; the loop admits new trials only after observing a
//! completion, so at most `max_concurrent` trials execute at any time.

use crossbeam_channel::Sender;
use hg_types::{internal_error, SweepResult, TrialResult, TrialSpec};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::{SweepEvent, SweepEventKind};
use crate::executor::{TrainingProcedure, TrialExecutor};
use crate::journal::TrialJournal;
use crate::policy::{NoTermination, PolicyContext, TerminationPolicy};
use crate::search::{plan_trials, GridSearch, SearchStrategy};
use crate::selector::select_best;
use crate::store::ResultStore;
use crate::sweep::{SweepConfig, SweepId, SweepReport, SweepState, SweepStatus};

/// Cooperative cancellation signal for a running sweep.
///
/// Cancelling stops new admissions; trials already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Mutable bookkeeping for one sweep.
#[derive(Debug)]
pub struct RunState {
    pending: VecDeque<TrialSpec>,
    in_flight: BTreeSet<usize>,
    completed: Vec<TrialResult>,
    dispatched: usize,
    cancelled: bool,
}

impl RunState {
    pub fn new(trials: Vec<TrialSpec>) -> Self {
        Self {
            pending: trials.into(),
            in_flight: BTreeSet::new(),
            completed: Vec::new(),
            dispatched: 0,
            cancelled: false,
        }
    }

    /// Pop the next pending trial (FIFO) if a slot and budget are available.
    pub fn admit(&mut self, max_concurrent: usize, max_total: usize) -> Option<TrialSpec> {
        if self.cancelled || self.in_flight.len() >= max_concurrent || self.dispatched >= max_total
        {
            return None;
        }
        let spec = self.pending.pop_front()?;
        self.in_flight.insert(spec.trial_index);
        self.dispatched += 1;
        Some(spec)
    }

    /// Move a finished trial out of `in_flight`. Fails if it was not running.
    pub fn complete(&mut self, result: TrialResult) -> SweepResult<()> {
        if !self.in_flight.remove(&result.trial_index) {
            return Err(internal_error!(
                "trial {} completed but was not in flight",
                result.trial_index
            ));
        }
        self.completed.push(result);
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Remove every trial that was never admitted.
    pub fn drain_pending(&mut self) -> Vec<TrialSpec> {
        self.pending.drain(..).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Results in completion order.
    pub fn completed(&self) -> &[TrialResult] {
        &self.completed
    }
}

/// A configured sweep, ready to run.
pub struct Sweep {
    id: SweepId,
    config: SweepConfig,
    strategy: Box<dyn SearchStrategy>,
    policy: Box<dyn TerminationPolicy>,
    executor: TrialExecutor,
    store: Arc<ResultStore>,
    journal: Option<TrialJournal>,
    events: Option<Sender<SweepEvent>>,
    cancel: CancelToken,
}

impl Sweep {
    pub fn new<P: TrainingProcedure>(config: SweepConfig, procedure: P) -> Self {
        let executor = TrialExecutor::new(procedure).with_timeout(config.trial_timeout());
        Self {
            id: Uuid::new_v4(),
            config,
            strategy: Box::new(GridSearch::new()),
            policy: Box::new(NoTermination),
            executor,
            store: Arc::new(ResultStore::new()),
            journal: None,
            events: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_strategy<S: SearchStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn with_policy<T: TerminationPolicy + 'static>(mut self, policy: T) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_journal(mut self, journal: TrialJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_events(mut self, events: Sender<SweepEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> SweepId {
        self.id
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Token that cancels this sweep from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Live view of results, readable while the sweep runs.
    pub fn results(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    /// Run the sweep to completion or cancellation.
    ///
    /// Configuration and search-space errors are returned before any trial
    /// is dispatched. Trial failures never fail the sweep.
    pub async fn run(self) -> SweepResult<SweepReport> {
        let mut status = SweepStatus::new(self.id, self.config.name.clone());
        let max_concurrent = self.config.max_concurrent;
        let max_total = self.config.max_total_trials;
        let metric = self.config.primary_metric.as_str();
        let goal = self.config.goal;

        self.config.validate()?;
        let generated = match self.strategy.enumerate(&self.config.parameter_space) {
            Ok(trials) => trials,
            Err(e) => {
                status.mark_failed(e.to_string());
                error!(sweep = %self.config.name, error = %e, "sweep failed to start");
                self.emit(SweepEventKind::Finished {
                    state: SweepState::Failed,
                });
                return Err(e);
            }
        };
        let generated_count = generated.len();
        let planned = plan_trials(generated, max_total, self.config.truncation);

        status.mark_running(planned.len());
        info!(
            sweep = %self.config.name,
            id = %self.id,
            strategy = self.strategy.name(),
            policy = self.policy.name(),
            generated = generated_count,
            planned = planned.len(),
            max_concurrent,
            "sweep started"
        );
        self.emit(SweepEventKind::Started {
            planned_trials: planned.len(),
            max_concurrent,
        });

        let mut state = RunState::new(planned);
        let mut join_set: JoinSet<TrialResult> = JoinSet::new();

        loop {
            if !state.is_cancelled() && self.cancel.is_cancelled() {
                self.stop(&mut state, "cancelled by caller");
            }

            while let Some(spec) = state.admit(max_concurrent, max_total) {
                status.record_dispatch();
                debug!(
                    trial = spec.trial_index,
                    in_flight = state.in_flight(),
                    "trial admitted"
                );
                self.emit(SweepEventKind::TrialAdmitted {
                    trial_index: spec.trial_index,
                    in_flight: state.in_flight(),
                });
                let executor = self.executor.clone();
                join_set.spawn(async move { executor.execute(spec).await });
            }

            if state.in_flight() == 0 {
                break;
            }

            tokio::select! {
                biased;
                joined = join_set.join_next() => {
                    let result = match joined {
                        Some(Ok(result)) => result,
                        Some(Err(e)) => return Err(internal_error!("trial task aborted: {e}")),
                        None => return Err(internal_error!(
                            "{} trials in flight but no tasks running",
                            state.in_flight()
                        )),
                    };
                    self.on_trial_finished(&mut state, &mut status, result)?;
                }
                _ = self.cancel.cancelled(), if !state.is_cancelled() => {
                    self.stop(&mut state, "cancelled by caller");
                }
            }
        }

        let left_behind = state.drain_pending();
        let cut_short = !left_behind.is_empty();
        for spec in left_behind {
            let result = TrialResult::cancelled(spec);
            status.record_result(&result, metric, goal);
            self.persist(&result);
            self.store.record(result)?;
        }

        // A sweep that ran every planned trial is complete even if it was
        // asked to stop on the last completion.
        let final_state = if cut_short {
            status.mark_cancelled();
            SweepState::Cancelled
        } else {
            status.mark_completed();
            SweepState::Completed
        };

        let all_results = self.store.by_trial_index();
        let best = select_best(&all_results, metric, goal).ok().cloned();
        match &best {
            Some(best) => info!(
                sweep = %self.config.name,
                state = ?final_state,
                best_trial = best.trial_index,
                best_value = best.metric(metric),
                succeeded = status.trials_succeeded,
                failed = status.trials_failed,
                cancelled = status.trials_cancelled,
                "sweep finished"
            ),
            None => warn!(
                sweep = %self.config.name,
                state = ?final_state,
                metric,
                "sweep finished without an eligible trial"
            ),
        }
        self.emit(SweepEventKind::Finished { state: final_state });

        Ok(SweepReport {
            sweep_id: self.id,
            state: final_state,
            primary_metric: self.config.primary_metric.clone(),
            all_results,
            best,
            status,
        })
    }

    fn on_trial_finished(
        &self,
        state: &mut RunState,
        status: &mut SweepStatus,
        result: TrialResult,
    ) -> SweepResult<()> {
        let metric = self.config.primary_metric.as_str();
        let goal = self.config.goal;
        let trial_index = result.trial_index;
        let trial_status = result.status;

        let improved = status.record_result(&result, metric, goal);
        self.persist(&result);
        self.store.record(result.clone())?;
        state.complete(result)?;

        info!(
            trial = trial_index,
            status = ?trial_status,
            best = improved,
            in_flight = state.in_flight(),
            "trial finished"
        );
        self.emit(SweepEventKind::TrialFinished {
            trial_index,
            status: trial_status,
            in_flight: state.in_flight(),
        });

        if !state.is_cancelled() && state.pending() > 0 {
            let ctx = PolicyContext {
                completed: state.completed(),
                best_value: status.best_value,
                goal,
                metric,
            };
            if self.policy.should_stop(&ctx) {
                let reason = format!("early termination policy '{}'", self.policy.name());
                self.stop(state, &reason);
            }
        }
        Ok(())
    }

    fn stop(&self, state: &mut RunState, reason: &str) {
        state.cancel();
        info!(
            sweep = %self.config.name,
            reason,
            pending = state.pending(),
            in_flight = state.in_flight(),
            "sweep cancelled; draining in-flight trials"
        );
        self.emit(SweepEventKind::Cancelled {
            reason: reason.to_string(),
        });
    }

    fn persist(&self, result: &TrialResult) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(result) {
                warn!(
                    trial = result.trial_index,
                    path = %journal.path().display(),
                    error = %e,
                    "failed to journal trial result"
                );
            }
        }
    }

    fn emit(&self, kind: SweepEventKind) {
        if let Some(tx) = &self.events {
            // Best-effort; a dropped receiver is not an error.
            let _ = tx.try_send(SweepEvent::new(self.id, kind));
        }
    }
}
