use super::{DateRows, StateStore};
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-process store. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<DateRows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: DateRows) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Current date for `entity`, if any.
    pub fn get(&self, entity: &str) -> Option<String> {
        self.rows.lock().ok()?.get(entity).cloned()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn read_all(&self) -> Result<DateRows> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .map_err(|_| WatchError::StoreUnavailable("memory store lock poisoned".into()))
    }

    async fn update_one(&self, entity: &str, date: &str) -> Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| WatchError::StoreUnavailable("memory store lock poisoned".into()))?;
        rows.insert(entity.to_owned(), date.to_owned());
        Ok(())
    }
}
