//! Startup wiring: validate config, open the store and channels, build the
//! verification cycle, then run the scheduler and status server until
//! shutdown.

use crate::channels::{self, ChannelValidationSeverity, Notifier};
use crate::config::WatchConfig;
use crate::cycle::VerificationCycle;
use crate::error::{Result, WatchError};
use crate::probe::HttpProbe;
use crate::scheduler::Scheduler;
use crate::server::run_server;
use crate::status::StatusBoard;
use crate::store::{MemoryStore, StateStore, open_store};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Validate the config and log channel issues.
///
/// # Errors
///
/// Returns [`WatchError::Config`] for any invalid setting, including
/// channel issues of error severity.
pub fn preflight(config: &WatchConfig) -> Result<()> {
    config.validate()?;

    let mut errors = Vec::new();
    for issue in channels::validate_config(&config.channels) {
        match issue.severity {
            ChannelValidationSeverity::Warning => {
                warn!("{}: {}", issue.title, issue.summary);
            }
            ChannelValidationSeverity::Error => {
                error!("{}: {}", issue.title, issue.summary);
                errors.push(issue.id);
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WatchError::Config(format!(
            "channel configuration invalid: {}",
            errors.join(", ")
        )))
    }
}

/// Build a cycle from config, with the given store and notifier.
///
/// # Errors
///
/// Returns [`WatchError::Config`] if the probe client cannot be built.
pub fn build_cycle(
    config: &WatchConfig,
    store: Arc<dyn StateStore>,
    notifier: Notifier,
) -> Result<VerificationCycle> {
    let probe = HttpProbe::new(&config.probe, &config.months)?;
    Ok(VerificationCycle::new(
        store,
        Arc::new(probe),
        notifier,
        config.entity_table(),
        StatusBoard::new(),
    )
    .with_no_data_marker(config.no_data_marker.clone()))
}

/// Cycle wired to the configured store and channels.
///
/// # Errors
///
/// Returns [`WatchError::Config`] when a backend or channel secret is missing.
pub fn build_live_cycle(config: &WatchConfig) -> Result<VerificationCycle> {
    let store = open_store(&config.store)?;
    let notifier = Notifier::from_config(&config.channels)?;
    build_cycle(config, store, notifier)
}

/// Cycle that reads a snapshot of the configured store into memory and
/// sends nothing. Real probes still run.
///
/// # Errors
///
/// Returns [`WatchError::StoreUnavailable`] if the snapshot cannot be read.
pub async fn build_dry_run_cycle(config: &WatchConfig) -> Result<VerificationCycle> {
    let source = open_store(&config.store)?;
    let rows = source.read_all().await?;
    info!(
        "dry run: {} rows copied from {} store, notifications disabled",
        rows.len(),
        source.id()
    );
    build_cycle(
        config,
        Arc::new(MemoryStore::with_rows(rows)),
        Notifier::disabled(),
    )
}

/// Run the scheduler and (if enabled) the status server until `cancel`
/// fires or the server fails. Waits for an in-flight cycle before returning.
///
/// # Errors
///
/// Returns [`WatchError::Server`] if the status server cannot start or stops
/// abnormally.
pub async fn run_service(
    config: &WatchConfig,
    cycle: VerificationCycle,
    cancel: CancellationToken,
) -> Result<()> {
    let status = cycle.status().reader();
    let scheduler = Scheduler::new(
        Arc::new(cycle),
        Duration::from_secs(config.schedule.interval_secs),
    )
    .with_run_on_start(config.schedule.run_on_start)
    .run(cancel.clone());

    let server_result = if config.server.enabled {
        let server_config = config.server.clone();
        let trigger = Some(scheduler.trigger());
        let server_cancel = cancel.clone();
        let mut task = tokio::spawn(async move {
            run_server(&server_config, status, trigger, server_cancel).await
        });
        tokio::select! {
            () = cancel.cancelled() => task.await,
            joined = &mut task => {
                cancel.cancel();
                joined
            }
        }
    } else {
        cancel.cancelled().await;
        Ok(Ok(()))
    };

    info!("shutting down, waiting for in-flight cycle");
    scheduler.shutdown().await;

    match server_result {
        Ok(result) => result,
        Err(e) => Err(WatchError::Server(format!("status server task failed: {e}"))),
    }
}
