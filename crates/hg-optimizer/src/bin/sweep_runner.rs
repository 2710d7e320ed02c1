use hg_optimizer::{
    rank, Goal, MetricLogger, ParameterSet, ParameterSpace, Sweep, SweepConfig, TrialJournal,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Demo sweep over L2 regularization strength.
fn default_config() -> SweepConfig {
    let space = ParameterSpace::new().add_choice("--regularization", vec![0.001, 0.01, 0.1]);
    SweepConfig::new("regularization_sweep", space)
        .with_max_total_trials(3)
        .with_max_concurrent(2)
        .with_primary_metric("AUC", Goal::Maximize)
}

/// Toy stand-in for a training run: AUC falls as regularization grows.
fn toy_training(params: &ParameterSet, logger: &MetricLogger) -> anyhow::Result<()> {
    let reg = params
        .get("--regularization")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    logger.log("AUC", 1.0 - reg);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HG_SWEEP_CONFIG").ok());
    let config = match config_path {
        Some(path) => {
            info!(path = %path, "loading sweep config");
            SweepConfig::from_json_file(&path)?
        }
        None => default_config(),
    };

    let goal = config.goal;
    let mut sweep = Sweep::new(config, toy_training);
    if let Ok(path) = std::env::var("HG_SWEEP_JOURNAL") {
        info!(path = %path, "journaling trial results");
        sweep = sweep.with_journal(TrialJournal::new(path));
    }

    let cancel = sweep.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling sweep");
            cancel.cancel();
        }
    });

    let report = sweep.run().await?;

    let leaderboard = rank(&report.all_results, &report.primary_metric, goal);
    for (position, (result, value)) in leaderboard.into_iter().enumerate() {
        info!(
            rank = position + 1,
            trial = result.trial_index,
            value,
            params = ?result.params,
            "leaderboard"
        );
    }

    let best = report.best_trial()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "sweep_id": report.sweep_id,
            "state": report.state,
            "best_trial": best.trial_index,
            "params": best.params,
            "metrics": best.metrics,
        }))?
    );
    Ok(())
}
