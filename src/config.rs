//! Configuration types for the watcher.
//!
//! Loaded once at startup from TOML. Every section falls back to defaults so
//! a minimal file only needs the store and channel credentials.

use crate::error::{Result, WatchError};
use crate::secret::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SBS_WATCH_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Store value meaning "nothing published yet"; skipped every cycle.
    pub no_data_marker: String,
    /// Polling cadence.
    pub schedule: ScheduleConfig,
    /// Existence probe settings.
    pub probe: ProbeConfig,
    /// Entity name → file code (e.g. `BANCOS = "B-2201"`).
    pub entities: BTreeMap<String, String>,
    /// State store backend.
    pub store: StoreConfig,
    /// Notification channels.
    pub channels: ChannelsConfig,
    /// Status server.
    pub server: ServerConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Month labels used in remote paths, January first.
    pub months: Vec<MonthLabel>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            no_data_marker: "Sin archivos disponibles".to_owned(),
            schedule: ScheduleConfig::default(),
            probe: ProbeConfig::default(),
            entities: default_entities(),
            store: StoreConfig::default(),
            channels: ChannelsConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            months: default_months(),
        }
    }
}

/// A tracked category of periodic remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Unique key, as stored in the state store.
    pub name: String,
    /// Opaque code used to build the remote filename.
    pub file_code: String,
}

/// Month name and two-letter abbreviation as they appear in remote paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLabel {
    pub name: String,
    pub abbr: String,
}

impl MonthLabel {
    fn new(name: &str, abbr: &str) -> Self {
        Self {
            name: name.to_owned(),
            abbr: abbr.to_owned(),
        }
    }
}

fn default_months() -> Vec<MonthLabel> {
    vec![
        MonthLabel::new("Enero", "en"),
        MonthLabel::new("Febrero", "fe"),
        MonthLabel::new("Marzo", "ma"),
        MonthLabel::new("Abril", "ab"),
        MonthLabel::new("Mayo", "my"),
        MonthLabel::new("Junio", "jn"),
        MonthLabel::new("Julio", "jl"),
        MonthLabel::new("Agosto", "ag"),
        MonthLabel::new("Setiembre", "se"),
        MonthLabel::new("Octubre", "oc"),
        MonthLabel::new("Noviembre", "no"),
        MonthLabel::new("Diciembre", "di"),
    ]
}

fn default_entities() -> BTreeMap<String, String> {
    [
        ("BANCOS", "B-2201"),
        ("FINANCIERAS", "B-3101"),
        ("CMACS", "C-1101"),
        ("CRACS", "C-2101"),
        ("EMPRESAS_CREDITO", "C-4103"),
        ("DEPOSITOS_CAJA", "C-1245"),
        ("DEPOSITOS_FINANCIERAS", "B-3231"),
        ("COLOCACIONES_EC", "C-4223"),
    ]
    .into_iter()
    .map(|(name, code)| (name.to_owned(), code.to_owned()))
    .collect()
}

/// Polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// Run a cycle immediately at startup instead of waiting one interval.
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

/// Existence probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Root of the published statistics tree.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extension of the published files, without the dot.
    pub extension: String,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://intranet2.sbs.gob.pe/estadistica/financiera".to_owned(),
            timeout_secs: 5,
            extension: "xls".to_owned(),
            user_agent: None,
        }
    }
}

/// Which state store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process map seeded from `store.seed`. Lost on exit.
    Memory,
    /// JSON object file at `store.path`.
    #[default]
    File,
    /// Spreadsheet rows via the Sheets values API.
    Sheets,
}

/// State store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// File backend path. Defaults to the platform data dir.
    pub path: Option<PathBuf>,
    /// Initial rows for the memory backend.
    pub seed: BTreeMap<String, String>,
    /// Spreadsheet backend settings.
    pub sheets: SheetsConfig,
}

impl StoreConfig {
    /// Resolved file backend path.
    pub fn file_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sbs-watch")
        .join("dates.json")
}

/// Spreadsheet backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Values API root.
    pub api_base: String,
    /// Spreadsheet identifier (from its URL).
    pub spreadsheet_id: String,
    /// Worksheet (tab) name.
    pub sheet_name: String,
    /// Header of the column holding entity names.
    pub entity_column: String,
    /// Header of the column holding last-known dates.
    pub date_column: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// OAuth bearer token with spreadsheet scope.
    pub access_token: SecretRef,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://sheets.googleapis.com".to_owned(),
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_owned(),
            entity_column: "ENTIDAD".to_owned(),
            date_column: "FECHA_ANTERIOR".to_owned(),
            timeout_secs: 10,
            access_token: SecretRef::None,
        }
    }
}

/// Notification channel settings. A channel is active when its section is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Upper bound for one send, in seconds.
    pub send_timeout_secs: u64,
    pub whatsapp: Option<WhatsAppChannelConfig>,
    pub telegram: Option<TelegramChannelConfig>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: 10,
            whatsapp: None,
            telegram: None,
        }
    }
}

/// WhatsApp delivery through the Twilio Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppChannelConfig {
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
    pub account_sid: String,
    /// Sender, e.g. `whatsapp:+14155238886`.
    pub from: String,
    /// Recipient, e.g. `whatsapp:+51900000000`.
    pub to: String,
    #[serde(default)]
    pub auth_token: SecretRef,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_owned()
}

/// Telegram bot delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    pub chat_id: String,
    #[serde(default)]
    pub bot_token: SecretRef,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_owned()
}

/// Status server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Expose `POST /verify` to request an immediate cycle.
    pub allow_manual_trigger: bool,
    /// Bearer token required by `POST /verify`. Open when unset.
    pub trigger_token: SecretRef,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_owned(),
            port: 8080,
            allow_manual_trigger: true,
            trigger_token: SecretRef::None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files. Stderr only when unset.
    pub directory: Option<PathBuf>,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl WatchConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| WatchError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/sbs-watch/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("sbs-watch").join("config.toml")
        } else if let Some(dir) = dirs::config_dir() {
            dir.join("sbs-watch").join("config.toml")
        } else {
            PathBuf::from("/tmp/sbs-watch/config.toml")
        }
    }

    /// Load from `explicit`, else [`CONFIG_PATH_ENV`], else the default path.
    ///
    /// Only the default path may be absent, in which case built-in defaults
    /// are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(
                "no config at {}, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Static entity table, ordered by name.
    pub fn entity_table(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .map(|(name, code)| Entity {
                name: name.clone(),
                file_code: code.clone(),
            })
            .collect()
    }

    /// Reject configurations the watcher cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.interval_secs == 0 {
            return Err(WatchError::Config(
                "schedule.interval_secs must be greater than 0".into(),
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(WatchError::Config(
                "probe.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.channels.send_timeout_secs == 0 {
            return Err(WatchError::Config(
                "channels.send_timeout_secs must be greater than 0".into(),
            ));
        }
        url::Url::parse(&self.probe.base_url)
            .map_err(|e| WatchError::Config(format!("probe.base_url is invalid: {e}")))?;
        if self.months.len() != 12 {
            return Err(WatchError::Config(format!(
                "months must list 12 entries, found {}",
                self.months.len()
            )));
        }
        if self
            .months
            .iter()
            .any(|m| m.name.trim().is_empty() || m.abbr.trim().is_empty())
        {
            return Err(WatchError::Config(
                "month names and abbreviations must not be empty".into(),
            ));
        }
        if self.entities.is_empty() {
            return Err(WatchError::Config(
                "at least one entity must be configured".into(),
            ));
        }
        for (name, code) in &self.entities {
            if name.trim().is_empty() || code.trim().is_empty() {
                return Err(WatchError::Config(format!(
                    "entity {name:?} must have a non-empty name and file code"
                )));
            }
        }
        if self.store.backend == StoreBackend::Sheets
            && self.store.sheets.spreadsheet_id.trim().is_empty()
        {
            return Err(WatchError::Config(
                "store.sheets.spreadsheet_id is required for the sheets backend".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.interval_secs, 3600);
        assert_eq!(config.probe.timeout_secs, 5);
        assert_eq!(config.months.len(), 12);
        assert_eq!(config.entities.len(), 8);
        assert_eq!(config.entities["BANCOS"], "B-2201");
        assert_eq!(config.months[8].name, "Setiembre");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WatchConfig::default();
        config.schedule.interval_secs = 300;
        config.channels.telegram = Some(TelegramChannelConfig {
            api_base: default_telegram_api_base(),
            chat_id: "42".to_owned(),
            bot_token: SecretRef::Env("TG_TOKEN".to_owned()),
        });
        config.save_to_file(&path).unwrap();

        let loaded = WatchConfig::from_file(&path).unwrap();
        assert_eq!(loaded.schedule.interval_secs, 300);
        let telegram = loaded.channels.telegram.unwrap();
        assert_eq!(telegram.bot_token, SecretRef::Env("TG_TOKEN".to_owned()));
        assert_eq!(loaded.months, default_months());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
            [schedule]
            interval_secs = 600

            [entities]
            BANCOS = "B-2201"

            [channels.whatsapp]
            account_sid = "AC123"
            auth_token = { env = "TWILIO_TOKEN" }
            from = "whatsapp:+14155238886"
            to = "whatsapp:+51900000000"
        "#;
        let config: WatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schedule.interval_secs, 600);
        assert!(config.schedule.run_on_start);
        assert_eq!(config.entities.len(), 1);
        assert_eq!(config.probe.extension, "xls");
        assert_eq!(config.no_data_marker, "Sin archivos disponibles");
        let whatsapp = config.channels.whatsapp.unwrap();
        assert_eq!(whatsapp.api_base, "https://api.twilio.com");
        assert!(config.channels.telegram.is_none());
        assert_eq!(config.store.backend, StoreBackend::File);
    }

    #[test]
    fn store_backend_parses_snake_case() {
        let config: WatchConfig = toml::from_str(
            r#"
            [store]
            backend = "sheets"
            [store.sheets]
            spreadsheet_id = "abc"
            sheet_name = "verificacion_fechas"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sheets);
        assert_eq!(config.store.sheets.sheet_name, "verificacion_fechas");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = WatchConfig::default();
        config.schedule.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = WatchConfig::default();
        config.probe.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn short_month_table_rejected() {
        let mut config = WatchConfig::default();
        config.months.pop();
        assert!(config.validate().unwrap_err().to_string().contains("12"));
    }

    #[test]
    fn empty_entities_rejected() {
        let mut config = WatchConfig::default();
        config.entities.clear();
        assert!(config.validate().unwrap_err().to_string().contains("entity"));
    }

    #[test]
    fn sheets_backend_requires_spreadsheet_id() {
        let mut config = WatchConfig::default();
        config.store.backend = StoreBackend::Sheets;
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("spreadsheet_id")
        );
    }

    #[test]
    fn bad_base_url_rejected() {
        let mut config = WatchConfig::default();
        config.probe.base_url = "not a url".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = WatchConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(res.is_err());
    }

    #[test]
    fn entity_table_is_sorted_by_name() {
        let config = WatchConfig::default();
        let names: Vec<String> = config.entity_table().into_iter().map(|e| e.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
