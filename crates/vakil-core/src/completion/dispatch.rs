use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::port::CompletionBackend;
use super::types::{CompletionError, CompletionOutcome, CompletionRequest};

/// Multi-model fallback dispatcher.
///
/// Tries each candidate model in order, retrying transient failures with
/// exponential backoff, and returns the first success. Backoff sleeps only
/// suspend the current request's task; no shared lock is held across them.
pub struct CompletionDispatcher {
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionDispatcher {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn dispatch(&self, req: &CompletionRequest) -> CompletionOutcome {
        let mut last_error = CompletionError::Unknown("no model candidates".to_string());
        let budget = req.max_retries_per_model.max(1);

        for model in &req.model_candidates {
            for attempt in 0..budget {
                match self.backend.complete(model, req).await {
                    Ok(text) => {
                        info!(%model, attempt, "completion succeeded");
                        return CompletionOutcome::Success {
                            text,
                            model_used: model.clone(),
                        };
                    }
                    Err(err) if err.is_transient() => {
                        warn!(%model, attempt, %err, "transient completion failure");
                        last_error = err;
                        // Retry the same model while budget remains.
                        if attempt + 1 < budget {
                            sleep(backoff_delay(attempt)).await;
                        }
                    }
                    Err(err) => {
                        // Permanent (or unclassified) failure: this model is
                        // done, move on to the next candidate immediately.
                        warn!(%model, attempt, %err, "abandoning model");
                        last_error = err;
                        break;
                    }
                }
            }
        }

        warn!(%last_error, "all completion candidates exhausted");
        CompletionOutcome::Exhausted { last_error }
    }
}

/// `2^attempt + 0.1 * attempt` seconds, attempt counted from zero.
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2f64.powi(attempt as i32) + 0.1 * f64::from(attempt);
    Duration::from_secs_f64(secs)
}
