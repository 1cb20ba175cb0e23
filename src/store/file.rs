use super::{DateRows, StateStore};
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Store backed by a JSON object file: `{ "BANCOS": "31/01/2024", ... }`.
///
/// The file is read fresh on every call. Writes go through a temp file and a
/// rename so a crash never leaves a half-written store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<DateRows> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DateRows::new());
            }
            Err(e) => {
                return Err(WatchError::StoreUnavailable(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            WatchError::StoreUnavailable(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    async fn persist(&self, rows: &DateRows) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WatchError::StoreUnavailable(format!(
                    "cannot create store dir {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| WatchError::StoreUnavailable(format!("cannot serialize rows: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            WatchError::StoreUnavailable(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            WatchError::StoreUnavailable(format!(
                "cannot replace {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    fn id(&self) -> &'static str {
        "file"
    }

    async fn read_all(&self) -> Result<DateRows> {
        self.load().await
    }

    async fn update_one(&self, entity: &str, date: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load().await?;
        rows.insert(entity.to_owned(), date.to_owned());
        self.persist(&rows).await
    }
}
