use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::completion::dispatch::CompletionDispatcher;
use crate::completion::types::{CompletionOutcome, CompletionRequest};
use crate::config::Config;
use crate::domain::{Direction, InboundMessage, SenderId};
use crate::limiter::RateLimiter;
use crate::ports::{DeliveryPort, DeliveryResult, HistoryStore};

/// Fixed trailing string appended to every user-facing reply.
pub const DISCLAIMER: &str =
    "\n\nNote: this is general legal information, not a substitute for advice from a qualified lawyer.";

/// User-facing apology delivered when every model candidate is exhausted.
/// This is a valid terminal outcome of dispatch, not an error.
pub const APOLOGY: &str =
    "Sorry, I could not process your question right now. Please try again in a few minutes.";

/// Reply for messages with no usable text (stickers, media, empty bodies).
pub const EMPTY_TEXT_REPLY: &str = "Please send your question as a text message.";

/// Terminal state of one inbound event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Message had no usable text; a fixed prompt reply was attempted.
    EmptyText,
    /// Rejected by the rate limiter. Silent drop: no reply, no backend call.
    RateLimited,
    /// The pipeline ran to completion and a reply delivery was attempted.
    Replied { delivered: bool },
}

/// Orchestrates one inbound message through the pipeline:
/// rate limit → completion dispatch → disclaimer → delivery → history.
///
/// `handle` is infallible by construction: every collaborator failure is
/// recovered into a degraded-but-valid outcome, so the webhook layer can
/// always acknowledge the platform with a 2xx and never trigger its
/// retry-on-error semantics.
pub struct InboundHandler {
    cfg: Arc<Config>,
    limiter: Arc<Mutex<RateLimiter>>,
    dispatcher: CompletionDispatcher,
    delivery: Arc<dyn DeliveryPort>,
    history: Arc<dyn HistoryStore>,
}

impl InboundHandler {
    pub fn new(
        cfg: Arc<Config>,
        limiter: Arc<Mutex<RateLimiter>>,
        dispatcher: CompletionDispatcher,
        delivery: Arc<dyn DeliveryPort>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            cfg,
            limiter,
            dispatcher,
            delivery,
            history,
        }
    }

    pub async fn handle(&self, msg: InboundMessage) -> HandlerOutcome {
        let sender = msg.sender.clone();

        if msg.text.trim().is_empty() {
            // No rate limiting and no dispatch for non-text content; just
            // tell the user what we can work with.
            info!(%sender, "inbound message without text");
            let result = self.delivery.send_text(&sender, EMPTY_TEXT_REPLY).await;
            self.log_delivery(&sender, &result);
            return HandlerOutcome::EmptyText;
        }

        let admitted = { self.limiter.lock().await.admit(&sender) };
        if !admitted {
            info!(%sender, "rate limited, dropping message");
            return HandlerOutcome::RateLimited;
        }

        self.record(&sender, Direction::Inbound, &msg.text).await;

        let request = CompletionRequest {
            system_prompt: self.cfg.system_prompt.clone(),
            user_text: msg.text,
            model_candidates: self.cfg.model_candidates(),
            max_retries_per_model: self.cfg.max_retries_per_model,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };

        let reply = match self.dispatcher.dispatch(&request).await {
            CompletionOutcome::Success { text, model_used } => {
                info!(%sender, model = %model_used, "reply generated");
                text
            }
            CompletionOutcome::Exhausted { last_error } => {
                warn!(%sender, %last_error, "dispatch exhausted, substituting apology");
                APOLOGY.to_string()
            }
        };

        let final_text = format!("{reply}{DISCLAIMER}");
        let result = self.delivery.send_text(&sender, &final_text).await;
        self.log_delivery(&sender, &result);

        self.record(&sender, Direction::Outbound, &final_text).await;

        HandlerOutcome::Replied {
            delivered: result.is_sent(),
        }
    }

    fn log_delivery(&self, sender: &SenderId, result: &DeliveryResult) {
        match result {
            DeliveryResult::Sent => info!(%sender, "reply delivered"),
            // No alternate channel exists, so there is nothing further to do.
            DeliveryResult::Failed { reason } => warn!(%sender, %reason, "delivery failed"),
        }
    }

    async fn record(&self, sender: &SenderId, direction: Direction, text: &str) {
        if let Err(e) = self
            .history
            .append(sender, direction, text, Utc::now())
            .await
        {
            warn!(%sender, direction = direction.as_str(), error = %e, "history append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::completion::port::CompletionBackend;
    use crate::completion::types::CompletionError;
    use crate::{Error, Result};

    use super::*;

    fn test_config() -> Config {
        Config {
            verify_token: "token".into(),
            phone_number_id: "12345".into(),
            access_token: "secret".into(),
            graph_api_base: "https://graph.example".into(),
            openai_api_key: "key".into(),
            openai_api_base: "https://api.example/v1".into(),
            primary_model: "primary".into(),
            fallback_models: vec!["fallback".into()],
            system_prompt: "be helpful".into(),
            max_tokens: 256,
            temperature: 0.4,
            max_retries_per_model: 2,
            rate_limit_window: Duration::from_secs(3),
            send_timeout: Duration::from_secs(15),
            completion_timeout: Duration::from_secs(30),
            db_path: PathBuf::from(":memory:"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }

    /// Backend that always succeeds, counting calls.
    struct HealthyBackend {
        calls: StdMutex<u32>,
    }

    #[async_trait]
    impl CompletionBackend for HealthyBackend {
        async fn complete(
            &self,
            _model: &str,
            _req: &CompletionRequest,
        ) -> std::result::Result<String, CompletionError> {
            *self.calls.lock().unwrap() += 1;
            Ok("To file an FIR, visit your nearest police station.".to_string())
        }
    }

    /// Backend where every model fails permanently.
    struct BrokenBackend {
        calls: StdMutex<u32>,
    }

    #[async_trait]
    impl CompletionBackend for BrokenBackend {
        async fn complete(
            &self,
            _model: &str,
            _req: &CompletionRequest,
        ) -> std::result::Result<String, CompletionError> {
            *self.calls.lock().unwrap() += 1;
            Err(CompletionError::BadRequest("no".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        sent: StdMutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl DeliveryPort for RecordingDelivery {
        async fn send_text(&self, to: &SenderId, text: &str) -> DeliveryResult {
            self.sent
                .lock()
                .unwrap()
                .push((to.as_str().to_string(), text.to_string()));
            if self.fail {
                DeliveryResult::Failed {
                    reason: "http 500".to_string(),
                }
            } else {
                DeliveryResult::Sent
            }
        }
    }

    #[derive(Default)]
    struct MemoryHistory {
        rows: StdMutex<Vec<(String, &'static str, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl HistoryStore for MemoryHistory {
        async fn append(
            &self,
            sender: &SenderId,
            direction: Direction,
            text: &str,
            _timestamp: DateTime<Utc>,
        ) -> Result<()> {
            if self.fail {
                return Err(Error::External("disk full".to_string()));
            }
            self.rows.lock().unwrap().push((
                sender.as_str().to_string(),
                direction.as_str(),
                text.to_string(),
            ));
            Ok(())
        }
    }

    struct Harness {
        handler: InboundHandler,
        delivery: Arc<RecordingDelivery>,
        history: Arc<MemoryHistory>,
    }

    fn harness(backend: Arc<dyn CompletionBackend>) -> Harness {
        harness_with(backend, RecordingDelivery::default(), MemoryHistory::default())
    }

    fn harness_with(
        backend: Arc<dyn CompletionBackend>,
        delivery: RecordingDelivery,
        history: MemoryHistory,
    ) -> Harness {
        let cfg = Arc::new(test_config());
        let delivery = Arc::new(delivery);
        let history = Arc::new(history);
        let limiter = Arc::new(Mutex::new(RateLimiter::new(cfg.rate_limit_window)));
        let handler = InboundHandler::new(
            cfg,
            limiter,
            CompletionDispatcher::new(backend),
            delivery.clone(),
            history.clone(),
        );
        Harness {
            handler,
            delivery,
            history,
        }
    }

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            sender: SenderId("911234567890".to_string()),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn admitted_message_gets_reply_with_disclaimer() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness(backend.clone());

        let outcome = h
            .handler
            .handle(inbound("What is the process to file an FIR?"))
            .await;
        assert_eq!(outcome, HandlerOutcome::Replied { delivered: true });

        let sent = h.delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "911234567890");
        assert!(sent[0].1.ends_with(DISCLAIMER));
        assert!(sent[0].1.contains("FIR"));
        assert_eq!(*backend.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn second_message_within_window_is_silently_dropped() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness(backend.clone());

        let first = h.handler.handle(inbound("What is an FIR?")).await;
        assert_eq!(first, HandlerOutcome::Replied { delivered: true });

        // Arrives well inside the 3s window.
        let second = h.handler.handle(inbound("And a chargesheet?")).await;
        assert_eq!(second, HandlerOutcome::RateLimited);

        // One delivery and one backend call total: the drop is silent.
        assert_eq!(h.delivery.sent.lock().unwrap().len(), 1);
        assert_eq!(*backend.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausted_dispatch_delivers_apology_with_disclaimer() {
        let backend = Arc::new(BrokenBackend {
            calls: StdMutex::new(0),
        });
        let h = harness(backend.clone());

        let outcome = h.handler.handle(inbound("Help me")).await;
        assert_eq!(outcome, HandlerOutcome::Replied { delivered: true });

        let sent = h.delivery.sent.lock().unwrap();
        assert_eq!(sent[0].1, format!("{APOLOGY}{DISCLAIMER}"));
        // Two candidates, permanent errors: one attempt each.
        assert_eq!(*backend.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_text_short_circuits_before_limiter_and_dispatch() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness(backend.clone());

        let outcome = h.handler.handle(inbound("   ")).await;
        assert_eq!(outcome, HandlerOutcome::EmptyText);

        let sent = h.delivery.sent.lock().unwrap();
        assert_eq!(sent[0].1, EMPTY_TEXT_REPLY);
        assert_eq!(*backend.calls.lock().unwrap(), 0);

        // Bypassing the limiter means a real question right after still goes
        // through.
        drop(sent);
        let next = h.handler.handle(inbound("What is bail?")).await;
        assert_eq!(next, HandlerOutcome::Replied { delivered: true });
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_but_not_fatal() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness_with(
            backend,
            RecordingDelivery {
                sent: StdMutex::new(Vec::new()),
                fail: true,
            },
            MemoryHistory::default(),
        );

        let outcome = h.handler.handle(inbound("What is bail?")).await;
        assert_eq!(outcome, HandlerOutcome::Replied { delivered: false });
        // Exactly one attempt: no outbound retry.
        assert_eq!(h.delivery.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_failure_never_blocks_the_reply() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness_with(
            backend,
            RecordingDelivery::default(),
            MemoryHistory {
                rows: StdMutex::new(Vec::new()),
                fail: true,
            },
        );

        let outcome = h.handler.handle(inbound("What is bail?")).await;
        assert_eq!(outcome, HandlerOutcome::Replied { delivered: true });
        assert_eq!(h.delivery.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn both_directions_are_recorded() {
        let backend = Arc::new(HealthyBackend {
            calls: StdMutex::new(0),
        });
        let h = harness(backend);

        h.handler.handle(inbound("What is bail?")).await;

        let rows = h.history.rows.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, "inbound");
        assert_eq!(rows[0].2, "What is bail?");
        assert_eq!(rows[1].1, "outbound");
        assert!(rows[1].2.ends_with(DISCLAIMER));
    }
}
