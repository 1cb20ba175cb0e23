//! Remote file existence probing.
//!
//! Published files follow a fixed layout:
//! `{base}/{year}/{MonthName}/{file_code}-{abbr}{year}.{ext}`, for example
//! `.../2024/Febrero/B-2201-fe2024.xls`. A probe is a single `HEAD` request
//! with a bounded timeout; retry cadence comes from the scheduler.

use crate::config::{Entity, MonthLabel, ProbeConfig};
use crate::error::{Result, WatchError};
use crate::period::Period;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of one existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The server answered `200 OK`.
    Present,
    /// The server answered with any other status.
    Absent,
    /// No definitive answer: network failure, timeout, malformed response.
    Unknown(String),
}

/// Existence check for one entity's file in one period.
///
/// Implementations never fail: every fault is folded into
/// [`Availability::Unknown`].
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn exists(&self, entity: &Entity, period: Period) -> Availability;
}

/// Builds deterministic file URLs from the calendar table.
#[derive(Debug, Clone)]
pub struct FileLocator {
    base_url: String,
    extension: String,
    months: Vec<MonthLabel>,
}

impl FileLocator {
    pub fn new(base_url: &str, extension: &str, months: &[MonthLabel]) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            extension: extension.trim_start_matches('.').to_owned(),
            months: months.to_vec(),
        }
    }

    /// Filename for `entity` in `period`, e.g. `B-2201-fe2024.xls`.
    ///
    /// Returns `None` if the month table has no entry for the period's month.
    pub fn file_name(&self, entity: &Entity, period: Period) -> Option<String> {
        let label = self.label(period)?;
        Some(format!(
            "{}-{}{}.{}",
            entity.file_code,
            label.abbr,
            period.year(),
            self.extension
        ))
    }

    /// Full URL for `entity` in `period`.
    pub fn url_for(&self, entity: &Entity, period: Period) -> Option<String> {
        let label = self.label(period)?;
        let file_name = self.file_name(entity, period)?;
        Some(format!(
            "{}/{}/{}/{}",
            self.base_url,
            period.year(),
            urlencoding::encode(&label.name),
            urlencoding::encode(&file_name)
        ))
    }

    fn label(&self, period: Period) -> Option<&MonthLabel> {
        let index = usize::try_from(period.month()).ok()?.checked_sub(1)?;
        self.months.get(index)
    }
}

/// `HEAD`-based probe over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    locator: FileLocator,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe whose requests time out after `config.timeout_secs`.
    ///
    /// Redirects are not followed: only a direct `200 OK` counts as published.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if the HTTP client cannot be constructed.
    pub fn new(config: &ProbeConfig, months: &[MonthLabel]) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("sbs-watch/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build probe HTTP client: {e}")))?;

        Ok(Self {
            locator: FileLocator::new(&config.base_url, &config.extension, months),
            client,
        })
    }
}

#[async_trait]
impl AvailabilityProbe for HttpProbe {
    async fn exists(&self, entity: &Entity, period: Period) -> Availability {
        let Some(url) = self.locator.url_for(entity, period) else {
            return Availability::Unknown(format!("no month label for {period}"));
        };

        match self.client.head(&url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::debug!(entity = %entity.name, %url, "file present");
                Availability::Present
            }
            Ok(response) => {
                tracing::debug!(
                    entity = %entity.name,
                    %url,
                    status = response.status().as_u16(),
                    "file absent"
                );
                Availability::Absent
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("timed out probing {url}")
                } else {
                    format!("probing {url}: {e}")
                };
                Availability::Unknown(reason)
            }
        }
    }
}
