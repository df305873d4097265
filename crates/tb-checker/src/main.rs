//! Tablebase puzzle checker
//!
//! Replays every filtered endgame puzzle against the lichess tablebase and
//! appends one line per puzzle to the checkpoint file. Safe to interrupt and
//! rerun: finished puzzles are skipped.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use tb_checker::checkpoint::CheckpointStore;
use tb_checker::config::CheckerConfig;
use tb_checker::pipeline::{Pipeline, PipelineConfig};
use tb_checker::puzzle_core::load_puzzles;
use tb_checker::tablebase::TablebaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = CheckerConfig::from_env()?;
    info!(
        puzzles = %config.puzzle_path.display(),
        checked = %config.checked_path.display(),
        tablebase = %config.tablebase_url,
        requests_per_sec = config.requests_per_sec,
        workers = config.workers,
        strict = config.strict,
        "Checker config loaded"
    );

    let puzzles = load_puzzles(&config.puzzle_path)?;
    let store = Arc::new(CheckpointStore::open(&config.checked_path)?);

    let current: HashSet<&str> = puzzles.iter().map(|p| p.puzzle_id.as_str()).collect();
    let stale = store.stale_ids(&current);
    if !stale.is_empty() {
        warn!(count = stale.len(), "Checkpoint has puzzles missing from the input");
    }
    let remaining = puzzles
        .iter()
        .filter(|p| !p.is_mate() && !store.contains(&p.puzzle_id))
        .count();
    info!(
        "{} puzzles already checked, {} still need to be checked",
        store.len(),
        remaining
    );

    let client = TablebaseClient::new(
        &config.tablebase_url,
        config.request_timeout,
        Arc::new(config.rate_limiter()),
        config.retry_policy(),
    )?;
    let pipeline = Pipeline::new(
        Arc::new(client),
        Arc::clone(&store),
        PipelineConfig {
            workers: config.workers,
            verify: config.verify_options(),
        },
    );

    let summary = pipeline.run_until(puzzles, shutdown_signal()).await?;
    info!(
        total = summary.total,
        skipped_mate = summary.skipped_mate,
        skipped_done = summary.skipped_done,
        checked = summary.checked,
        flagged = summary.flagged,
        "Run complete"
    );
    if summary.cancelled {
        info!("Interrupted, rerun to resume");
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
