use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use vakil_core::{
    completion::dispatch::CompletionDispatcher, config::Config, handler::InboundHandler,
    limiter::RateLimiter,
};
use vakil_openai::OpenAiClient;
use vakil_sqlite::SqliteHistory;
use vakil_whatsapp::{WebhookState, WhatsAppSender};

#[tokio::main]
async fn main() -> Result<(), vakil_core::Error> {
    vakil_core::logging::init("vakil");

    let cfg = Arc::new(Config::load()?);
    info!(
        primary = %cfg.primary_model,
        fallbacks = cfg.fallback_models.len(),
        window_secs = cfg.rate_limit_window.as_secs(),
        "configuration loaded"
    );

    let history = Arc::new(SqliteHistory::open(&cfg.db_path)?);

    let backend = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.openai_api_base.clone(),
        cfg.completion_timeout,
    )?);

    let delivery = Arc::new(WhatsAppSender::new(
        cfg.graph_api_base.clone(),
        cfg.phone_number_id.clone(),
        cfg.access_token.clone(),
        cfg.send_timeout,
    )?);

    let limiter = Arc::new(Mutex::new(RateLimiter::new(cfg.rate_limit_window)));

    let handler = Arc::new(InboundHandler::new(
        cfg.clone(),
        limiter,
        CompletionDispatcher::new(backend),
        delivery,
        history,
    ));

    let state = Arc::new(WebhookState {
        verify_token: cfg.verify_token.clone(),
        handler,
    });

    vakil_whatsapp::serve(cfg.bind_addr, state)
        .await
        .map_err(|e| vakil_core::Error::External(format!("webhook server failed: {e}")))?;

    Ok(())
}
