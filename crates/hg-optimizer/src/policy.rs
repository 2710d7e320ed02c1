//! Early-termination policies.
//!
//! A policy is consulted after every trial completion. When it returns `true`
//! the sweep stops admitting new trials; trials already running finish
//! normally.

use hg_types::{Goal, TrialResult};

/// What a policy gets to look at after each completion.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Results so far, in completion order.
    pub completed: &'a [TrialResult],
    /// Best primary-metric value so far, if any trial produced one.
    pub best_value: Option<f64>,
    pub goal: Goal,
    pub metric: &'a str,
}

pub trait TerminationPolicy: Send + Sync {
    fn should_stop(&self, ctx: &PolicyContext<'_>) -> bool;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> TerminationPolicy for F
where
    F: Fn(&PolicyContext<'_>) -> bool + Send + Sync,
{
    fn should_stop(&self, ctx: &PolicyContext<'_>) -> bool {
        self(ctx)
    }
}

/// Run until the budget is exhausted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTermination;

impl TerminationPolicy for NoTermination {
    fn should_stop(&self, _ctx: &PolicyContext<'_>) -> bool {
        false
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Stop once the best value reaches `target` (>= when maximizing, <= when
/// minimizing).
#[derive(Debug, Clone, Copy)]
pub struct MetricThreshold {
    pub target: f64,
}

impl TerminationPolicy for MetricThreshold {
    fn should_stop(&self, ctx: &PolicyContext<'_>) -> bool {
        match (ctx.best_value, ctx.goal) {
            (Some(best), Goal::Maximize) => best >= self.target,
            (Some(best), Goal::Minimize) => best <= self.target,
            (None, _) => false,
        }
    }

    fn name(&self) -> &str {
        "metric_threshold"
    }
}

/// Stop after `patience` consecutive completions that did not improve the
/// best value. Trials without the metric count as non-improving.
#[derive(Debug, Clone, Copy)]
pub struct NoImprovement {
    pub patience: usize,
}

impl TerminationPolicy for NoImprovement {
    fn should_stop(&self, ctx: &PolicyContext<'_>) -> bool {
        if self.patience == 0 {
            return false;
        }

        let mut best: Option<f64> = None;
        let mut stale = 0usize;
        for result in ctx.completed {
            let value = if result.is_success() {
                result.metric(ctx.metric)
            } else {
                None
            };
            match (value, best) {
                (Some(v), None) => {
                    best = Some(v);
                    stale = 0;
                }
                (Some(v), Some(b)) if ctx.goal.is_better(v, b) => {
                    best = Some(v);
                    stale = 0;
                }
                _ => stale += 1,
            }
        }
        stale >= self.patience
    }

    fn name(&self) -> &str {
        "no_improvement"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hg_types::{ParameterSet, TrialSpec};
    use std::collections::HashMap;

    fn auc(index: usize, value: f64) -> TrialResult {
        let mut metrics = HashMap::new();
        metrics.insert("AUC".to_string(), value);
        TrialResult::succeeded(TrialSpec::new(index, ParameterSet::new()), metrics, Utc::now())
    }

    fn ctx<'a>(completed: &'a [TrialResult], best: Option<f64>, goal: Goal) -> PolicyContext<'a> {
        PolicyContext {
            completed,
            best_value: best,
            goal,
            metric: "AUC",
        }
    }

    #[test]
    fn no_termination_never_stops() {
        let results = vec![auc(0, 1.0)];
        assert!(!NoTermination.should_stop(&ctx(&results, Some(1.0), Goal::Maximize)));
    }

    #[test]
    fn threshold_respects_goal() {
        let policy = MetricThreshold { target: 0.95 };
        let results = vec![auc(0, 0.97)];
        assert!(policy.should_stop(&ctx(&results, Some(0.97), Goal::Maximize)));
        assert!(!policy.should_stop(&ctx(&results, Some(0.90), Goal::Maximize)));
        assert!(policy.should_stop(&ctx(&results, Some(0.90), Goal::Minimize)));
        assert!(!policy.should_stop(&ctx(&results, None, Goal::Maximize)));
    }

    #[test]
    fn no_improvement_counts_stale_completions() {
        let policy = NoImprovement { patience: 2 };

        let improving = vec![auc(0, 0.1), auc(1, 0.2), auc(2, 0.3)];
        assert!(!policy.should_stop(&ctx(&improving, Some(0.3), Goal::Maximize)));

        let stalled = vec![auc(0, 0.5), auc(1, 0.2), auc(2, 0.4)];
        assert!(policy.should_stop(&ctx(&stalled, Some(0.5), Goal::Maximize)));

        // Same data, minimizing: 0.2 improved on 0.5, only one stale after it.
        assert!(!policy.should_stop(&ctx(&stalled, Some(0.2), Goal::Minimize)));
    }

    #[test]
    fn leading_failures_count_as_stale() {
        let policy = NoImprovement { patience: 2 };
        let failed = |index: usize| {
            TrialResult::failed(
                TrialSpec::new(index, ParameterSet::new()),
                HashMap::new(),
                "diverged".to_string(),
                Utc::now(),
            )
        };

        let one = vec![failed(0)];
        assert!(!policy.should_stop(&ctx(&one, None, Goal::Maximize)));

        let two = vec![failed(0), failed(1)];
        assert!(policy.should_stop(&ctx(&two, None, Goal::Maximize)));

        // Exactly `patience` completions after the first best value.
        let after_best = vec![auc(0, 0.9), auc(1, 0.5), failed(2)];
        assert!(policy.should_stop(&ctx(&after_best, Some(0.9), Goal::Maximize)));
        let too_few = vec![auc(0, 0.9), auc(1, 0.5)];
        assert!(!policy.should_stop(&ctx(&too_few, Some(0.9), Goal::Maximize)));
    }

    #[test]
    fn closures_are_policies() {
        let stop_after_two = |c: &PolicyContext<'_>| c.completed.len() >= 2;
        let one = vec![auc(0, 0.1)];
        let two = vec![auc(0, 0.1), auc(1, 0.2)];
        assert!(!stop_after_two.should_stop(&ctx(&one, None, Goal::Maximize)));
        assert!(stop_after_two.should_stop(&ctx(&two, None, Goal::Maximize)));
        assert_eq!(TerminationPolicy::name(&stop_after_two), "custom");
    }
}
