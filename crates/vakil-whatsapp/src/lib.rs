//! WhatsApp Cloud API adapter: webhook intake (axum) and outbound delivery
//! (Graph API).

pub mod payload;
pub mod sender;
pub mod webhook;

pub use sender::WhatsAppSender;
pub use webhook::{router, serve, WebhookState};
