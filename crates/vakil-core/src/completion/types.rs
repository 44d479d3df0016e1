/// Closed error taxonomy for completion backend calls.
///
/// Backend adapters must map HTTP/transport failures into this enum so the
/// dispatcher's retry logic is total and testable — no exception sniffing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The backend rate-limited us (HTTP 429). Retryable.
    #[error("backend rate limited")]
    RateLimited,

    /// Transient backend failure (5xx, timeout, connection error). Retryable.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// The requested model does not exist or is not available to this key.
    #[error("invalid model")]
    InvalidModel,

    /// The request itself was rejected (other 4xx). Not retryable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything we could not classify. Treated as permanent to avoid retry
    /// storms on unknown failure modes.
    #[error("unknown backend error: {0}")]
    Unknown(String),
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CompletionError::RateLimited | CompletionError::Transient(_))
    }
}

/// A single completion request, immutable once constructed.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_text: String,
    /// Ordered fallback list; always tried in this order, starting cold on
    /// every request (no cross-request model health memory).
    pub model_candidates: Vec<String>,
    pub max_retries_per_model: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Terminal outcome of a dispatch.
#[derive(Clone, Debug)]
pub enum CompletionOutcome {
    Success {
        text: String,
        model_used: String,
    },
    /// Every candidate was exhausted. Not an error: the caller substitutes a
    /// fixed apology and delivers it like any other reply.
    Exhausted {
        last_error: CompletionError,
    },
}
