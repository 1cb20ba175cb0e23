//! Scheduler background loop.
//!
//! Spawns a tokio task that waits for the next interval tick, a manual
//! trigger or cancellation, and runs the cycle inline. Because the loop
//! awaits each cycle before selecting again, a slow cycle delays the next
//! one instead of running alongside it. Ticks missed while a cycle is in
//! flight are skipped; at most one manual trigger is queued.

use crate::cycle::{CycleResult, VerificationCycle};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_once(&self) -> Result<CycleResult>;
}

#[async_trait]
impl CycleRunner for VerificationCycle {
    async fn run_once(&self) -> Result<CycleResult> {
        VerificationCycle::run_once(self).await
    }
}

/// Whether a cycle is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Running,
    Stopped,
}

/// Result of asking for an immediate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A run was queued and will start as soon as the loop is free.
    Queued,
    /// A manual run is already waiting; this request was coalesced into it.
    AlreadyPending,
    /// The scheduler is no longer running.
    Stopped,
}

/// Cloneable handle for requesting an immediate cycle.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    pub fn request_run(&self) -> TriggerOutcome {
        match self.tx.try_send(()) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(())) => TriggerOutcome::AlreadyPending,
            Err(mpsc::error::TrySendError::Closed(())) => TriggerOutcome::Stopped,
        }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    trigger: TriggerHandle,
    phase: watch::Receiver<SchedulerPhase>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn trigger(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    /// Stop after the in-flight cycle (if any) and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("scheduler task ended abnormally: {e}");
        }
    }

    /// Wait for the loop to exit without cancelling it.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!("scheduler task ended abnormally: {e}");
        }
    }
}

/// Background scheduler that runs verification cycles on an interval.
pub struct Scheduler<R: CycleRunner> {
    runner: Arc<R>,
    interval: Duration,
    run_on_start: bool,
}

impl<R: CycleRunner> Scheduler<R> {
    pub fn new(runner: Arc<R>, interval: Duration) -> Self {
        Self {
            runner,
            interval: interval.max(Duration::from_secs(1)),
            run_on_start: true,
        }
    }

    /// Run the first cycle immediately instead of after one interval.
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    /// Start the background loop. It stops when `cancel` fires; an
    /// in-flight cycle is allowed to finish first.
    pub fn run(self, cancel: CancellationToken) -> SchedulerHandle {
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let (phase_tx, phase_rx) = watch::channel(SchedulerPhase::Idle);
        let loop_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            info!(
                "scheduler started, interval {}s, run on start: {}",
                self.interval.as_secs(),
                self.run_on_start
            );
            let first = if self.run_on_start {
                Instant::now()
            } else {
                Instant::now() + self.interval
            };
            let mut ticker = tokio::time::interval_at(first, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let reason = tokio::select! {
                    biased;
                    () = loop_cancel.cancelled() => break,
                    Some(()) = trigger_rx.recv() => "manual",
                    _ = ticker.tick() => "scheduled",
                };

                phase_tx.send_replace(SchedulerPhase::Running);
                self.execute(reason).await;
                phase_tx.send_replace(SchedulerPhase::Idle);
            }

            phase_tx.send_replace(SchedulerPhase::Stopped);
            info!("scheduler stopped");
        });

        SchedulerHandle {
            trigger: TriggerHandle { tx: trigger_tx },
            phase: phase_rx,
            cancel,
            join,
        }
    }

    /// Run one cycle on its own task so a panic is contained, then log the
    /// result. The loop waits for completion either way.
    async fn execute(&self, reason: &str) {
        debug!("{reason} cycle starting");
        let runner = Arc::clone(&self.runner);
        match tokio::spawn(async move { runner.run_once().await }).await {
            Ok(Ok(result)) => {
                let advanced: Vec<&str> = result.advanced().collect();
                if advanced.is_empty() {
                    debug!("{reason} cycle completed, no changes");
                } else {
                    info!(
                        "{reason} cycle completed, advanced: {}",
                        advanced.join(", ")
                    );
                }
            }
            Ok(Err(e)) => warn!("{reason} cycle failed: {e}"),
            Err(e) => error!("{reason} cycle panicked: {e}"),
        }
    }
}
