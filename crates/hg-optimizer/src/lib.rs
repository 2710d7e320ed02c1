//! # hg-optimizer
//!
//! Grid-search sweep coordination for HyperGrid.
//!
//! Expands a parameter space into trials, runs an opaque training procedure
//! for each with bounded concurrency, records every outcome, and selects the
//! best trial by a primary metric. Results can be streamed to an NDJSON
//! journal and lifecycle events to a channel.

mod events;
mod executor;
mod journal;
mod policy;
mod scheduler;
mod search;
mod selector;
mod store;
mod sweep;

pub use events::{SweepEvent, SweepEventKind};
pub use executor::{MetricLogger, TrainingProcedure, TrialExecutor};
pub use journal::TrialJournal;
pub use policy::{MetricThreshold, NoImprovement, NoTermination, PolicyContext, TerminationPolicy};
pub use scheduler::{CancelToken, RunState, Sweep};
pub use search::{plan_trials, GridSearch, SearchStrategy, Truncation};
pub use selector::{rank, select_best};
pub use store::{ResultCounts, ResultStore};
pub use sweep::{SweepConfig, SweepId, SweepReport, SweepState, SweepStatus};

pub use hg_types::{
    Goal, ParameterDef, ParameterSet, ParameterSpace, ParameterValue, SweepError, SweepResult,
    TrialResult, TrialSpec, TrialStatus,
};
