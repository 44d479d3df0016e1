use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use vakil_core::domain::SenderId;
use vakil_core::ports::{DeliveryPort, DeliveryResult};

/// Outbound delivery via the WhatsApp Cloud (Graph) API.
///
/// One POST per reply with a bounded timeout. Exactly one attempt: failures
/// are reported, never retried, and never escape the port boundary.
#[derive(Clone, Debug)]
pub struct WhatsAppSender {
    phone_number_id: String,
    access_token: String,
    base_url: String,
    http: reqwest::Client,
}

impl WhatsAppSender {
    pub fn new(
        base_url: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, vakil_core::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| vakil_core::Error::External(format!("http client build: {e}")))?;
        Ok(Self {
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            base_url: base_url.into(),
            http,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.base_url.trim_end_matches('/'),
            self.phone_number_id
        )
    }
}

#[async_trait]
impl DeliveryPort for WhatsAppSender {
    async fn send_text(&self, to: &SenderId, text: &str) -> DeliveryResult {
        let body = json!({
            "messaging_product": "whatsapp",
            "to": to.as_str(),
            "type": "text",
            "text": { "body": text },
        });

        let resp = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => {
                debug!(%to, "whatsapp message sent");
                DeliveryResult::Sent
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                DeliveryResult::Failed {
                    reason: format!(
                        "http {status}: {}",
                        body.chars().take(200).collect::<String>()
                    ),
                }
            }
            Err(e) => DeliveryResult::Failed {
                reason: format!("request error: {e}"),
            },
        }
    }
}
