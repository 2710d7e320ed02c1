//! Sweep lifecycle events for external observers.

use chrono::{DateTime, Utc};
use hg_types::TrialStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sweep::SweepState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SweepEventKind {
    Started {
        planned_trials: usize,
        max_concurrent: usize,
    },
    TrialAdmitted {
        trial_index: usize,
        in_flight: usize,
    },
    TrialFinished {
        trial_index: usize,
        status: TrialStatus,
        in_flight: usize,
    },
    Cancelled {
        reason: String,
    },
    Finished {
        state: SweepState,
    },
}

/// A single event emitted by a running sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEvent {
    pub sweep_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: SweepEventKind,
}

impl SweepEvent {
    pub fn new(sweep_id: Uuid, kind: SweepEventKind) -> Self {
        Self {
            sweep_id,
            timestamp: Utc::now(),
            kind,
        }
    }
}
