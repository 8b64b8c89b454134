use std::net::SocketAddr;
use std::path::PathBuf;

use quizhub_api::llm::{DEFAULT_LLM_MODEL, DEFAULT_LLM_URL};

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me", "secret"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("QUIZHUB_JWT_SECRET is unset or still a placeholder")]
    WeakJwtSecret,

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub llm: Option<LlmConfig>,
    pub billing_secret: Option<String>,
    /// Echo password reset tokens in API responses. Off by default.
    pub expose_reset_tokens: bool,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, so tests need not touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("QUIZHUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::WeakJwtSecret);
        }

        let port = match var("QUIZHUB_PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "QUIZHUB_PORT",
                value: v,
            })?,
            None => 8000,
        };

        let token_ttl_minutes = match var("QUIZHUB_TOKEN_TTL_MINUTES") {
            Some(v) => v
                .parse()
                .ok()
                .filter(|m: &i64| *m > 0)
                .ok_or(ConfigError::Invalid {
                    name: "QUIZHUB_TOKEN_TTL_MINUTES",
                    value: v,
                })?,
            None => 60 * 24 * 7,
        };

        let llm = var("QUIZHUB_LLM_API_KEY").map(|api_key| LlmConfig {
            api_key,
            url: var("QUIZHUB_LLM_URL").unwrap_or_else(|| DEFAULT_LLM_URL.into()),
            model: var("QUIZHUB_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
        });

        let expose_reset_tokens = match var("QUIZHUB_EXPOSE_RESET_TOKENS") {
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid {
                name: "QUIZHUB_EXPOSE_RESET_TOKENS",
                value: v,
            })?,
            None => false,
        };

        let cors_origins = var("QUIZHUB_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var("QUIZHUB_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("QUIZHUB_DB_PATH").unwrap_or_else(|| "quizhub.db".into()).into(),
            jwt_secret,
            token_ttl_minutes,
            llm,
            billing_secret: var("QUIZHUB_BILLING_SECRET"),
            expose_reset_tokens,
            cors_origins,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: "QUIZHUB_HOST",
            value: raw,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
