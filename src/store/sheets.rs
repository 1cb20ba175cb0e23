use super::{DateRows, StateStore};
use crate::config::SheetsConfig;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Spreadsheet-backed store using the Sheets v4 values API.
///
/// The worksheet's first row is a header; the entity and date columns are
/// located by header name, so extra columns are tolerated. Token acquisition
/// happens outside this process: `access_token` must already be a valid
/// bearer token.
#[derive(Clone)]
pub struct SheetsStore {
    api_base: String,
    spreadsheet_id: String,
    sheet_name: String,
    entity_column: String,
    date_column: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Parsed worksheet: header positions plus data rows.
struct Sheet {
    entity_idx: usize,
    date_idx: usize,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    fn cell(row: &[String], idx: usize) -> &str {
        row.get(idx).map(String::as_str).unwrap_or_default()
    }

    /// 1-based sheet row number of `entity`.
    fn row_number(&self, entity: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| Self::cell(row, self.entity_idx).trim() == entity)
            .map(|i| i + 2)
    }
}

impl SheetsStore {
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if the access token cannot be resolved
    /// or the HTTP client cannot be built.
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let access_token = config.access_token.require("store.sheets.access_token")?;
        if config.spreadsheet_id.trim().is_empty() {
            return Err(WatchError::Config(
                "store.sheets.spreadsheet_id is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build sheets HTTP client: {e}")))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            entity_column: config.entity_column.clone(),
            date_column: config.date_column.clone(),
            access_token,
            client,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn fetch_sheet(&self) -> Result<Sheet> {
        let url = self.values_url(&quoted_sheet_name(&self.sheet_name));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| WatchError::StoreUnavailable(format!("sheets read failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::StoreUnavailable(format!(
                "sheets read failed ({status}): {body}"
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| WatchError::StoreUnavailable(format!("sheets read malformed: {e}")))?;

        let mut rows = range.values.into_iter().map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
        });

        let header = rows
            .next()
            .ok_or_else(|| WatchError::StoreUnavailable("sheet has no header row".into()))?;
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| {
                    WatchError::StoreUnavailable(format!("sheet header has no {name:?} column"))
                })
        };
        let entity_idx = find(&self.entity_column)?;
        let date_idx = find(&self.date_column)?;

        Ok(Sheet {
            entity_idx,
            date_idx,
            rows: rows.collect(),
        })
    }
}

/// Sheet name as it must appear in A1 notation: wrapped in single quotes,
/// with embedded quotes doubled (`Hoja 1` → `'Hoja 1'`).
fn quoted_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Spreadsheet column letters for a 0-based index (`0` → `A`, `26` → `AA`).
fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[async_trait]
impl StateStore for SheetsStore {
    fn id(&self) -> &'static str {
        "sheets"
    }

    async fn read_all(&self) -> Result<DateRows> {
        let sheet = self.fetch_sheet().await?;
        Ok(sheet
            .rows
            .iter()
            .filter_map(|row| {
                let name = Sheet::cell(row, sheet.entity_idx).trim();
                if name.is_empty() {
                    return None;
                }
                let date = Sheet::cell(row, sheet.date_idx).trim();
                Some((name.to_owned(), date.to_owned()))
            })
            .collect())
    }

    async fn update_one(&self, entity: &str, date: &str) -> Result<()> {
        let sheet = self.fetch_sheet().await?;
        let row = sheet.row_number(entity).ok_or_else(|| {
            WatchError::StoreUnavailable(format!("sheet has no row for entity {entity}"))
        })?;

        let range = format!(
            "{}!{}{row}",
            quoted_sheet_name(&self.sheet_name),
            column_letters(sheet.date_idx)
        );
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[date]],
        });
        let response = self
            .client
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| WatchError::StoreUnavailable(format!("sheets write failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::StoreUnavailable(format!(
                "sheets write failed ({status}): {body}"
            )));
        }
        Ok(())
    }
}
