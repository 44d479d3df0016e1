use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Default system prompt for the legal-information assistant.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that explains Indian law and \
legal procedures in simple, plain language. Keep answers short, practical and neutral. If a \
question needs a qualified professional, say so.";

/// Typed configuration, loaded from environment variables (with `.env` support).
#[derive(Clone, Debug)]
pub struct Config {
    // WhatsApp Cloud API
    pub verify_token: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub graph_api_base: String,

    // Completion backend
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub primary_model: String,
    pub fallback_models: Vec<String>,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries_per_model: u32,

    // Resilience / timeouts
    pub rate_limit_window: Duration,
    pub send_timeout: Duration,
    pub completion_timeout: Duration,

    // Storage / server
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let verify_token = require_env("WHATSAPP_VERIFY_TOKEN")?;
        let phone_number_id = require_env("WHATSAPP_PHONE_ID")?;
        let access_token = require_env("WHATSAPP_ACCESS_TOKEN")?;
        let openai_api_key = require_env("OPENAI_API_KEY")?;

        let graph_api_base = env_str("GRAPH_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://graph.facebook.com/v16.0".to_string());
        let openai_api_base = env_str("OPENAI_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let primary_model = env_str("PRIMARY_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let fallback_models = parse_csv(env_str("FALLBACK_MODELS"));

        let system_prompt = env_str("SYSTEM_PROMPT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let max_tokens = env_u32("MAX_TOKENS").unwrap_or(512);
        let temperature = env_f32("TEMPERATURE").unwrap_or(0.4);
        let max_retries_per_model = env_u32("MAX_RETRIES_PER_MODEL").unwrap_or(2).max(1);

        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW_SECS").unwrap_or(3));
        let send_timeout = Duration::from_secs(env_u64("SEND_TIMEOUT_SECS").unwrap_or(15));
        let completion_timeout = Duration::from_secs(env_u64("COMPLETION_TIMEOUT_SECS").unwrap_or(30));

        let db_path = PathBuf::from(env_str("DB_PATH").unwrap_or("vakil_messages.db".to_string()));

        let port = env_u64("PORT").unwrap_or(5000) as u16;
        let bind_addr = env_str("BIND_ADDR")
            .and_then(|s| s.trim().parse::<SocketAddr>().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], port)));

        Ok(Self {
            verify_token,
            phone_number_id,
            access_token,
            graph_api_base,
            openai_api_key,
            openai_api_base,
            primary_model,
            fallback_models,
            system_prompt,
            max_tokens,
            temperature,
            max_retries_per_model,
            rate_limit_window,
            send_timeout,
            completion_timeout,
            db_path,
            bind_addr,
        })
    }

    /// The ordered candidate list tried by the dispatcher: primary first,
    /// then the configured fallbacks.
    pub fn model_candidates(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.fallback_models.len());
        out.push(self.primary_model.clone());
        for m in &self.fallback_models {
            if m != &self.primary_model {
                out.push(m.clone());
            }
        }
        out
    }
}

fn require_env(key: &str) -> Result<String> {
    match env_str(key).and_then(non_empty) {
        Some(v) => Ok(v),
        None => Err(Error::Config(format!(
            "{key} environment variable is required"
        ))),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_f32(key: &str) -> Option<f32> {
    env_str(key).and_then(|s| s.trim().parse::<f32>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_trims_and_skips_empties() {
        let models = parse_csv(Some(" gpt-4o , ,mixtral-8x7b,".to_string()));
        assert_eq!(models, vec!["gpt-4o".to_string(), "mixtral-8x7b".to_string()]);
        assert!(parse_csv(None).is_empty());
    }

    #[test]
    fn candidates_start_with_primary_and_dedupe() {
        let cfg = Config {
            verify_token: "t".into(),
            phone_number_id: "p".into(),
            access_token: "a".into(),
            graph_api_base: "https://graph.example".into(),
            openai_api_key: "k".into(),
            openai_api_base: "https://api.example/v1".into(),
            primary_model: "gpt-4o-mini".into(),
            fallback_models: vec!["gpt-4o-mini".into(), "mixtral-8x7b".into()],
            system_prompt: "s".into(),
            max_tokens: 256,
            temperature: 0.4,
            max_retries_per_model: 2,
            rate_limit_window: Duration::from_secs(3),
            send_timeout: Duration::from_secs(15),
            completion_timeout: Duration::from_secs(30),
            db_path: PathBuf::from(":memory:"),
            bind_addr: "0.0.0.0:5000".parse().unwrap(),
        };
        assert_eq!(
            cfg.model_candidates(),
            vec!["gpt-4o-mini".to_string(), "mixtral-8x7b".to_string()]
        );
    }
}
