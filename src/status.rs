//! Process-wide status snapshot.
//!
//! One [`ProcessStatus`] value lives in a `watch` channel. The verification
//! cycle is the only writer and replaces the whole snapshot at the end of
//! every run; the status server and tests read clones of it at any time.

use crate::cycle::CycleResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Latest observable state of the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    /// When the process started.
    pub started_at: DateTime<Utc>,
    /// End of the last completed cycle; `None` until the first one finishes.
    pub last_run: Option<DateTime<Utc>>,
    /// Entity → date after the last completed cycle.
    pub dates: BTreeMap<String, String>,
    /// Notifications delivered during the last completed cycle.
    pub notifications_sent: usize,
    /// Cycles completed since startup.
    pub cycles_completed: u64,
    /// Most recent cycle-level failure, cleared by the next successful cycle.
    pub last_error: Option<String>,
}

impl ProcessStatus {
    fn placeholder() -> Self {
        Self {
            started_at: Utc::now(),
            last_run: None,
            dates: BTreeMap::new(),
            notifications_sent: 0,
            cycles_completed: 0,
            last_error: None,
        }
    }
}

/// Write side of the status snapshot.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: watch::Sender<ProcessStatus>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// Create a board holding placeholder values.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProcessStatus::placeholder());
        Self { tx }
    }

    /// Read-only accessor for external consumers.
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ProcessStatus {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot with the outcome of a completed cycle.
    pub fn record_cycle(&self, result: &CycleResult) {
        let current = self.snapshot();
        self.tx.send_replace(ProcessStatus {
            started_at: current.started_at,
            last_run: Some(result.ran_at),
            dates: result.dates.clone(),
            notifications_sent: result.notifications_sent,
            cycles_completed: current.cycles_completed + 1,
            last_error: None,
        });
    }

    /// Note a cycle-level failure. Dates from the last good cycle are kept.
    pub fn record_failure(&self, message: impl Into<String>) {
        let mut next = self.snapshot();
        next.last_error = Some(message.into());
        self.tx.send_replace(next);
    }
}

/// Read side of the status snapshot. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<ProcessStatus>,
}

impl StatusReader {
    /// Clone of the latest snapshot.
    pub fn snapshot(&self) -> ProcessStatus {
        self.rx.borrow().clone()
    }

    /// Wait until the snapshot changes. Returns `false` once the board is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn result_with(entity: &str, date: &str) -> CycleResult {
        let mut result = CycleResult::new(Utc::now());
        result.dates.insert(entity.to_owned(), date.to_owned());
        result.notifications_sent = 1;
        result
    }

    #[test]
    fn placeholder_before_first_cycle() {
        let board = StatusBoard::new();
        let status = board.reader().snapshot();
        assert!(status.last_run.is_none());
        assert!(status.dates.is_empty());
        assert_eq!(status.cycles_completed, 0);
    }

    #[test]
    fn cycle_replaces_snapshot_and_clears_error() {
        let board = StatusBoard::new();
        let reader = board.reader();

        board.record_failure("store down");
        assert_eq!(reader.snapshot().last_error.as_deref(), Some("store down"));

        board.record_cycle(&result_with("BANCOS", "29/02/2024"));
        let status = reader.snapshot();
        assert!(status.last_run.is_some());
        assert_eq!(status.dates["BANCOS"], "29/02/2024");
        assert_eq!(status.notifications_sent, 1);
        assert_eq!(status.cycles_completed, 1);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn failure_keeps_last_good_dates() {
        let board = StatusBoard::new();
        board.record_cycle(&result_with("BANCOS", "29/02/2024"));
        board.record_failure("store down");

        let status = board.snapshot();
        assert_eq!(status.dates["BANCOS"], "29/02/2024");
        assert_eq!(status.cycles_completed, 1);
    }

    #[tokio::test]
    async fn reader_wakes_on_change() {
        let board = StatusBoard::new();
        let mut reader = board.reader();
        board.record_cycle(&result_with("CMACS", "31/03/2024"));
        assert!(reader.changed().await);
        assert_eq!(reader.snapshot().dates["CMACS"], "31/03/2024");
    }
}
