//! Outbound notification channels (WhatsApp via Twilio, Telegram bot).
//!
//! Channel adapters are pluggable. The [`Notifier`] owns fan-out, per-send
//! timeouts and failure collection; delivery is best effort and never blocks
//! or rolls back a store update.

pub mod telegram;
pub mod traits;
pub mod whatsapp;

use crate::channels::telegram::TelegramChannel;
use crate::channels::traits::NotificationChannel;
use crate::channels::whatsapp::WhatsAppChannel;
use crate::config::ChannelsConfig;
use crate::error::{Result, WatchError};
use std::sync::Arc;
use std::time::Duration;

/// Configuration validation issue for channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValidationSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValidationIssue {
    pub id: String,
    pub title: String,
    pub severity: ChannelValidationSeverity,
    pub summary: String,
}

/// Validate channel configuration without network calls.
#[must_use]
pub fn validate_config(config: &ChannelsConfig) -> Vec<ChannelValidationIssue> {
    let mut issues = Vec::new();

    if config.whatsapp.is_none() && config.telegram.is_none() {
        issues.push(ChannelValidationIssue {
            id: "no-channels-configured".to_owned(),
            title: "No notification channels".to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary: "Date changes will be recorded but nobody will be notified.".to_owned(),
        });
    }

    if let Some(whatsapp) = &config.whatsapp {
        if !whatsapp.auth_token.is_set() {
            issues.push(ChannelValidationIssue {
                id: "whatsapp-missing-auth-token".to_owned(),
                title: "WhatsApp auth token missing".to_owned(),
                severity: ChannelValidationSeverity::Error,
                summary: "Set channels.whatsapp.auth_token or remove the section.".to_owned(),
            });
        }
        if !whatsapp.from.starts_with("whatsapp:") || !whatsapp.to.starts_with("whatsapp:") {
            issues.push(ChannelValidationIssue {
                id: "whatsapp-address-prefix".to_owned(),
                title: "WhatsApp addresses lack prefix".to_owned(),
                severity: ChannelValidationSeverity::Warning,
                summary: "Twilio expects `whatsapp:+<number>` for both from and to.".to_owned(),
            });
        }
    }

    if let Some(telegram) = &config.telegram {
        if !telegram.bot_token.is_set() {
            issues.push(ChannelValidationIssue {
                id: "telegram-missing-bot-token".to_owned(),
                title: "Telegram bot token missing".to_owned(),
                severity: ChannelValidationSeverity::Error,
                summary: "Set channels.telegram.bot_token or remove the section.".to_owned(),
            });
        }
        if telegram.chat_id.trim().is_empty() {
            issues.push(ChannelValidationIssue {
                id: "telegram-missing-chat-id".to_owned(),
                title: "Telegram chat id missing".to_owned(),
                severity: ChannelValidationSeverity::Error,
                summary: "Set channels.telegram.chat_id.".to_owned(),
            });
        }
    }

    issues
}

/// Text sent when an entity's date advances.
#[must_use]
pub fn format_change_message(entity: &str, before: &str, after: &str) -> String {
    format!("📢 Cambio detectado en {entity}:\n{before} → {after}")
}

/// Result of fanning one message out to every channel.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Channels that accepted the message.
    pub delivered: Vec<&'static str>,
    /// One [`WatchError::NotificationFailure`] per failed channel.
    pub failures: Vec<WatchError>,
}

impl DispatchReport {
    /// `true` when at least one channel accepted the message.
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// Fans messages out to every configured channel.
#[derive(Clone)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    send_timeout: Duration,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, send_timeout: Duration) -> Self {
        Self {
            channels,
            send_timeout,
        }
    }

    /// A notifier with no channels; every dispatch is a no-op.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(10))
    }

    /// Build channels from config, resolving their secrets.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] when a configured channel's secret is
    /// missing. Having no channels at all is not an error.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if let Some(whatsapp) = &config.whatsapp {
            channels.push(Arc::new(WhatsAppChannel::new(whatsapp)?));
        }
        if let Some(telegram) = &config.telegram {
            channels.push(Arc::new(TelegramChannel::new(telegram)?));
        }
        if channels.is_empty() {
            tracing::warn!("no notification channels configured");
        } else {
            let ids: Vec<&str> = channels.iter().map(|c| c.id()).collect();
            tracing::info!("notification channels: {}", ids.join(", "));
        }
        Ok(Self::new(
            channels,
            Duration::from_secs(config.send_timeout_secs),
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send `text` to every channel. Failures are collected, never raised.
    pub async fn dispatch(&self, text: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        for channel in &self.channels {
            let outcome = tokio::time::timeout(self.send_timeout, channel.send(text)).await;
            let reason = match outcome {
                Ok(Ok(())) => {
                    report.delivered.push(channel.id());
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {}s", self.send_timeout.as_secs()),
            };
            report.failures.push(WatchError::NotificationFailure {
                channel: channel.id().to_owned(),
                reason,
            });
        }
        report
    }
}
