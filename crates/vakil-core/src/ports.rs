use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Direction, SenderId};
use crate::Result;

/// Outcome of a single outbound delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryResult {
    Sent,
    Failed { reason: String },
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent)
    }
}

/// Hexagonal port for outbound message delivery.
///
/// Implementations must not panic or return `Err` past this boundary: any
/// transport or HTTP failure is reported as `DeliveryResult::Failed`. The
/// caller logs failures and never retries — duplicate delivery to an end
/// user is worse than a dropped reply.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn send_text(&self, to: &SenderId, text: &str) -> DeliveryResult;
}

/// Hexagonal port for the append-only chat history log.
///
/// Fire-and-forget from the pipeline's point of view: the orchestrator logs
/// and swallows errors, and history failures never affect reply delivery.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(
        &self,
        sender: &SenderId,
        direction: Direction,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;
}
