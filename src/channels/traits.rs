use async_trait::async_trait;

/// Outbound notification channel. New transports only need to implement this trait.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`, `whatsapp`).
    fn id(&self) -> &'static str;

    /// Deliver one text message to the channel's configured recipient.
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}
