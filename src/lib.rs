//! sbs-watch: detects newly published monthly statistics files.
//!
//! For each tracked entity the watcher keeps the end date of the last period
//! seen. Every cycle it derives the next expected month, checks whether that
//! month's file exists on the remote portal and, if it does, advances the
//! stored date and sends a notification.
//!
//! # Architecture
//!
//! - **Store**: last-known dates (memory, JSON file or a spreadsheet)
//! - **Probe**: one `HEAD` request per entity and period
//! - **Cycle**: read store → derive period → probe → update → notify
//! - **Scheduler**: runs cycles on an interval, never concurrently
//! - **Server**: health, status snapshot and manual trigger over HTTP

pub mod channels;
pub mod config;
pub mod cycle;
pub mod error;
pub mod logging;
pub mod period;
pub mod probe;
pub mod scheduler;
pub mod secret;
pub mod server;
pub mod startup;
pub mod status;
pub mod store;

pub use config::{Entity, WatchConfig};
pub use cycle::{CycleResult, EntityOutcome, VerificationCycle};
pub use error::{Result, WatchError};
pub use period::{Period, end_of_month, next_period, parse_date};
pub use probe::{Availability, AvailabilityProbe, HttpProbe};
pub use status::{ProcessStatus, StatusBoard, StatusReader};
pub use store::StateStore;
