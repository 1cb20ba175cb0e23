use crate::channels::traits::NotificationChannel;
use crate::config::WhatsAppChannelConfig;
use crate::error::Result;
use async_trait::async_trait;

/// WhatsApp delivery through the Twilio Messages API.
///
/// Messages are form-encoded POSTs authenticated with the account SID and
/// auth token. Twilio answers `201 Created` with the message resource.
#[derive(Clone)]
pub struct WhatsAppChannel {
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    /// # Errors
    ///
    /// Returns [`crate::WatchError::Config`] if the auth token cannot be resolved.
    pub fn new(config: &WhatsAppChannelConfig) -> Result<Self> {
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.require("channels.whatsapp.auth_token")?,
            from: config.from.clone(),
            to: config.to.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn id(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        if self.account_sid.trim().is_empty() {
            anyhow::bail!("whatsapp account_sid is empty");
        }
        if self.to.trim().is_empty() {
            anyhow::bail!("whatsapp recipient is empty");
        }

        let form = [
            ("From", self.from.as_str()),
            ("To", self.to.as_str()),
            ("Body", text),
        ];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("whatsapp send failed ({status}): {body}");
        }

        let message: serde_json::Value = response.json().await.unwrap_or_default();
        let sid = message
            .get("sid")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?");
        tracing::debug!("whatsapp message queued: {sid}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::secret::SecretRef;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_channel(api_base: &str) -> WhatsAppChannel {
        let cfg = WhatsAppChannelConfig {
            api_base: api_base.to_owned(),
            account_sid: "AC123".to_owned(),
            from: "whatsapp:+14155238886".to_owned(),
            to: "whatsapp:+51900000000".to_owned(),
            auth_token: SecretRef::Inline("secret".to_owned()),
        };
        WhatsAppChannel::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn send_posts_form_to_account_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Body=hola"))
            .and(body_string_contains("To=whatsapp%3A%2B51900000000"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SM1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        make_channel(&server.uri()).send("hola").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_send_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let err = make_channel(&server.uri()).send("hola").await.unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
    }

    #[test]
    fn missing_token_is_config_error() {
        let cfg = WhatsAppChannelConfig {
            api_base: "http://x".to_owned(),
            account_sid: "AC123".to_owned(),
            from: "a".to_owned(),
            to: "b".to_owned(),
            auth_token: SecretRef::None,
        };
        assert!(WhatsAppChannel::new(&cfg).is_err());
    }
}
