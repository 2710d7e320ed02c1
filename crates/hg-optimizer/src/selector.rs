//! Best-trial selection.

use hg_types::{Goal, SweepError, SweepResult, TrialResult};
use std::cmp::Ordering;

/// Pick the best succeeded trial by `metric`.
///
/// Only succeeded trials that logged a finite value for `metric` are
/// eligible. Ties go to the lowest `trial_index`, so the choice does not
/// depend on completion order.
pub fn select_best<'a>(
    results: &'a [TrialResult],
    metric: &str,
    goal: Goal,
) -> SweepResult<&'a TrialResult> {
    let mut best: Option<(&TrialResult, f64)> = None;
    for result in results {
        let Some(value) = eligible_value(result, metric) else {
            continue;
        };
        let replace = match best {
            None => true,
            Some((incumbent, incumbent_value)) => {
                goal.is_better(value, incumbent_value)
                    || (value == incumbent_value && result.trial_index < incumbent.trial_index)
            }
        };
        if replace {
            best = Some((result, value));
        }
    }

    best.map(|(result, _)| result)
        .ok_or_else(|| SweepError::NoEligibleTrial {
            metric: metric.to_string(),
        })
}

/// All eligible trials, best first, with the same tie-break as
/// [`select_best`].
pub fn rank<'a>(
    results: &'a [TrialResult],
    metric: &str,
    goal: Goal,
) -> Vec<(&'a TrialResult, f64)> {
    let mut ranked: Vec<(&TrialResult, f64)> = results
        .iter()
        .filter_map(|r| eligible_value(r, metric).map(|v| (r, v)))
        .collect();

    ranked.sort_by(|(a, va), (b, vb)| {
        let by_value = match goal {
            Goal::Maximize => vb.partial_cmp(va),
            Goal::Minimize => va.partial_cmp(vb),
        }
        .unwrap_or(Ordering::Equal);
        by_value.then(a.trial_index.cmp(&b.trial_index))
    });
    ranked
}

fn eligible_value(result: &TrialResult, metric: &str) -> Option<f64> {
    if result.is_success() {
        result.metric(metric)
    } else {
        None
    }
}
