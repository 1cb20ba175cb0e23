//! One verification pass over every tracked entity.
//!
//! A cycle reads the whole store, derives the next expected period for each
//! entity, probes the remote server for that period's file and, when it is
//! there, advances the stored date to the end of that month and notifies.
//! Entities are independent: a failure on one is recorded in its outcome and
//! the cycle moves on to the next.

use crate::channels::{Notifier, format_change_message};
use crate::config::Entity;
use crate::error::{Result, WatchError};
use crate::period::next_period;
use crate::probe::{Availability, AvailabilityProbe};
use crate::status::StatusBoard;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marker value meaning an entity has no files to track.
pub const DEFAULT_NO_DATA_MARKER: &str = "Sin archivos disponibles";

/// What happened to one entity during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityOutcome {
    /// The next period's file was found and the stored date advanced.
    Advanced { from: String, to: String },
    /// The next period's file is not published yet.
    NotPublished { period: String },
    /// The probe could not decide; retried next cycle.
    ProbeUnknown { reason: String },
    /// The stored value is not a `DD/MM/YYYY` date.
    InvalidDate { value: String },
    /// The stored value is the no-data marker.
    NoData,
    /// The store holds an entity with no file code.
    UnknownEntity,
    /// The file was found but the new date could not be persisted.
    StoreWriteFailed { reason: String },
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleResult {
    pub ran_at: DateTime<Utc>,
    /// Entity → date after the cycle (persisted values only).
    pub dates: BTreeMap<String, String>,
    pub outcomes: BTreeMap<String, EntityOutcome>,
    /// Change notifications accepted by at least one channel.
    pub notifications_sent: usize,
    /// Individual channel deliveries that failed.
    pub notification_failures: usize,
}

impl CycleResult {
    pub fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            ran_at,
            dates: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            notifications_sent: 0,
            notification_failures: 0,
        }
    }

    /// Entities whose date advanced during this cycle.
    pub fn advanced(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|(name, outcome)| {
            matches!(outcome, EntityOutcome::Advanced { .. }).then_some(name.as_str())
        })
    }
}

/// Wires store, probe and notifier into a runnable cycle.
pub struct VerificationCycle {
    store: Arc<dyn StateStore>,
    probe: Arc<dyn AvailabilityProbe>,
    notifier: Notifier,
    entities: BTreeMap<String, Entity>,
    no_data_marker: String,
    status: StatusBoard,
}

impl VerificationCycle {
    pub fn new(
        store: Arc<dyn StateStore>,
        probe: Arc<dyn AvailabilityProbe>,
        notifier: Notifier,
        entities: Vec<Entity>,
        status: StatusBoard,
    ) -> Self {
        Self {
            store,
            probe,
            notifier,
            entities: entities.into_iter().map(|e| (e.name.clone(), e)).collect(),
            no_data_marker: DEFAULT_NO_DATA_MARKER.to_owned(),
            status,
        }
    }

    pub fn with_no_data_marker(mut self, marker: impl Into<String>) -> Self {
        self.no_data_marker = marker.into();
        self
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Run one full pass and publish the result to the status board.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::StoreUnavailable`] when the store cannot be read.
    /// Nothing is written or sent in that case. Per-entity failures are never
    /// errors; they show up in [`CycleResult::outcomes`].
    pub async fn run_once(&self) -> Result<CycleResult> {
        match self.run_inner().await {
            Ok(result) => {
                self.status.record_cycle(&result);
                Ok(result)
            }
            Err(e) => {
                self.status.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<CycleResult> {
        let rows = self.store.read_all().await?;
        debug!(
            "cycle started: {} entities from {} store",
            rows.len(),
            self.store.id()
        );

        let mut dates = BTreeMap::new();
        let mut outcomes = BTreeMap::new();
        let mut notifications_sent = 0;
        let mut notification_failures = 0;

        for (name, stored) in &rows {
            let outcome = self.check_entity(name, stored).await;
            let current = match &outcome {
                EntityOutcome::Advanced { from, to } => {
                    let report = self
                        .notifier
                        .dispatch(&format_change_message(name, from, to))
                        .await;
                    for failure in &report.failures {
                        warn!(entity = %name, "{failure}");
                    }
                    if report.any_delivered() {
                        notifications_sent += 1;
                    }
                    notification_failures += report.failures.len();
                    to.clone()
                }
                _ => stored.clone(),
            };
            dates.insert(name.clone(), current);
            outcomes.insert(name.clone(), outcome);
        }

        let result = CycleResult {
            ran_at: Utc::now(),
            dates,
            outcomes,
            notifications_sent,
            notification_failures,
        };
        info!(
            "cycle finished: {} entities, {} advanced, {} notifications sent",
            result.outcomes.len(),
            result.advanced().count(),
            result.notifications_sent
        );
        Ok(result)
    }

    async fn check_entity(&self, name: &str, stored: &str) -> EntityOutcome {
        if stored.trim() == self.no_data_marker {
            debug!(entity = %name, "no data marker, skipped");
            return EntityOutcome::NoData;
        }

        let Some(entity) = self.entities.get(name) else {
            warn!(entity = %name, "no file code configured, skipped");
            return EntityOutcome::UnknownEntity;
        };

        let period = match next_period(stored) {
            Ok(period) => period,
            Err(WatchError::InvalidDateFormat { value }) => {
                warn!(entity = %name, "stored date {value:?} is not DD/MM/YYYY, skipped");
                return EntityOutcome::InvalidDate { value };
            }
            Err(e) => {
                warn!(entity = %name, "{e}");
                return EntityOutcome::InvalidDate {
                    value: stored.to_owned(),
                };
            }
        };

        match self.probe.exists(entity, period).await {
            Availability::Present => {}
            Availability::Absent => {
                debug!(entity = %name, "{period} not published yet");
                return EntityOutcome::NotPublished {
                    period: period.to_string(),
                };
            }
            Availability::Unknown(reason) => {
                warn!(entity = %name, "probe for {period} inconclusive: {reason}");
                return EntityOutcome::ProbeUnknown { reason };
            }
        }

        let new_date = period.end_of_month();
        if let Err(e) = self.store.update_one(name, &new_date).await {
            warn!(entity = %name, "found {period} but could not persist {new_date}: {e}");
            return EntityOutcome::StoreWriteFailed {
                reason: e.to_string(),
            };
        }

        info!(entity = %name, "new period published: {} -> {new_date}", stored.trim());
        EntityOutcome::Advanced {
            from: stored.trim().to_owned(),
            to: new_date,
        }
    }
}
