//! Persisted last-known dates, one row per entity.
//!
//! The watcher only needs two operations: read every row, and update one
//! row's date. Backends are interchangeable; the cycle re-reads the whole
//! store at the start of every run and never caches rows between runs.

mod file;
mod memory;
mod sheets;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entity name → persisted `DD/MM/YYYY` date (or a marker value).
pub type DateRows = BTreeMap<String, String>;

/// Key-value row store for entity dates.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stable backend identifier for logs.
    fn id(&self) -> &'static str;

    /// Read every entity row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WatchError::StoreUnavailable`] if the store cannot be read.
    async fn read_all(&self) -> Result<DateRows>;

    /// Persist a new date for one entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WatchError::StoreUnavailable`] if the write fails.
    async fn update_one(&self, entity: &str, date: &str) -> Result<()>;
}

/// Open the configured backend. Credentials are resolved here, so a missing
/// secret fails startup rather than the first cycle.
///
/// # Errors
///
/// Returns [`crate::WatchError::Config`] when the backend is misconfigured.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn StateStore>> {
    let store: Arc<dyn StateStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::with_rows(config.seed.clone())),
        StoreBackend::File => Arc::new(JsonFileStore::new(config.file_path())),
        StoreBackend::Sheets => Arc::new(SheetsStore::new(&config.sheets)?),
    };
    tracing::info!("state store backend: {}", store.id());
    Ok(store)
}
