//! WhatsApp Cloud API webhook payload model.
//!
//! Only the fields the pipeline consumes are modeled; everything else in the
//! event is ignored. All containers default to empty so partially-shaped
//! events deserialize instead of erroring.

use serde::Deserialize;

use vakil_core::domain::{InboundMessage, SenderId};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

/// Pull `{sender, text}` out of the first message of the first change of the
/// first entry. Non-text messages yield an empty `text`, which the handler
/// answers with a fixed prompt; events with no message at all yield `None`.
pub fn extract_first_message(payload: &WebhookPayload) -> Option<InboundMessage> {
    let message = payload
        .entry
        .first()?
        .changes
        .first()?
        .value
        .messages
        .first()?;

    let from = message.from.as_deref()?.trim();
    if from.is_empty() {
        return None;
    }

    let text = message
        .text
        .as_ref()
        .map(|t| t.body.clone())
        .unwrap_or_default();

    Some(InboundMessage {
        sender: SenderId(from.to_string()),
        text,
    })
}
