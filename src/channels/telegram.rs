use crate::channels::traits::NotificationChannel;
use crate::config::TelegramChannelConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;

/// Telegram Bot API adapter (outbound only).
#[derive(Clone)]
pub struct TelegramChannel {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// # Errors
    ///
    /// Returns [`crate::WatchError::Config`] if the bot token cannot be resolved.
    pub fn new(config: &TelegramChannelConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.require("channels.telegram.bot_token")?,
            chat_id: config.chat_id.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        if self.chat_id.trim().is_empty() {
            anyhow::bail!("telegram chat_id is empty");
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("telegram send failed ({status}): {body}");
        }

        let reply: serde_json::Value = response.json().await?;
        if reply.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let description = reply
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("telegram send rejected: {description}");
        }
        Ok(())
    }
}
