use async_trait::async_trait;

use super::types::{CompletionError, CompletionRequest};

/// Hexagonal port for a text-generation backend.
///
/// One call = one attempt against one concrete model. Retry and fallback
/// policy live in the dispatcher, not in implementations.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        req: &CompletionRequest,
    ) -> Result<String, CompletionError>;
}
