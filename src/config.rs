//! Configuration for the database and LLM boundaries.
//!
//! Environment-first: every value can come from an environment variable, and
//! the CLI mirrors the database variables as flags.

use crate::types::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenRouter model.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// Never serialized
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Per-query timeout; exceeding it is a scored `Timeout` failure
    pub query_timeout: Duration,
}

impl DatabaseConfig {
    /// Create config with default port (5432) and timeouts (10s connect,
    /// 30s per query), no password.
    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            dbname: dbname.into(),
            user: user.into(),
            password: None,
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
        }
    }

    /// Create from environment variables.
    ///
    /// Uses `DB_HOST`, `DB_PORT` (default 5432), `DB_NAME`, `DB_USER`,
    /// `DB_PASSWORD` (optional), `DB_CONNECT_TIMEOUT_SECS` (default 10),
    /// `DB_QUERY_TIMEOUT_SECS` (default 30).
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ConfigError` if a required variable is missing or
    /// a numeric variable does not parse
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required_var("DB_HOST")?,
            required_var("DB_NAME")?,
            required_var("DB_USER")?,
        );
        config.port = parsed_var("DB_PORT", config.port)?;
        config.password = std::env::var("DB_PASSWORD").ok();
        config.connect_timeout = Duration::from_secs(parsed_var(
            "DB_CONNECT_TIMEOUT_SECS",
            config.connect_timeout.as_secs(),
        )?);
        config.query_timeout = Duration::from_secs(parsed_var(
            "DB_QUERY_TIMEOUT_SECS",
            config.query_timeout.as_secs(),
        )?);
        Ok(config)
    }

    /// Convert to a `tokio-postgres` connection config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .application_name("nl2sql-eval")
            .connect_timeout(self.connect_timeout)
            .options(&format!(
                "-c statement_timeout={}",
                self.query_timeout.as_millis()
            ));
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenRouter,
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    /// Infer provider from model name.
    ///
    /// `claude*` → Anthropic, `gpt*` / `o1*` / `o3*` → OpenAI, anything else
    /// (including `vendor/model` ids) → OpenRouter.
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Self::Anthropic
        } else if model.starts_with("gpt") || model.starts_with("o1") || model.starts_with("o3") {
            Self::OpenAI
        } else {
            Self::OpenRouter
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Default API endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            Self::OpenAI => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// LLM client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// Override for the provider endpoint (proxies, tests)
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Extra attempts when the model returns no extractable SQL
    pub max_retries: usize,
    pub request_timeout: Duration,
}

impl LlmConfig {
    /// Create config for a model with an explicit key.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            provider: LlmProvider::for_model(&model),
            model,
            api_key: api_key.into(),
            endpoint: None,
            max_tokens: 500,
            temperature: 0.0,
            max_retries: 2,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Create from environment variables.
    ///
    /// Uses `NL2SQL_MODEL` (default: `deepseek/deepseek-chat-v3-0324:free`),
    /// then `OPENROUTER_API_KEY`, `OPENAI_API_KEY` or `ANTHROPIC_API_KEY`
    /// based on model. Optional: `NL2SQL_ENDPOINT`, `NL2SQL_MAX_TOKENS`,
    /// `NL2SQL_MAX_RETRIES`.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ConfigError` if the API key is not set
    pub fn from_env() -> Result<Self> {
        let model = std::env::var("NL2SQL_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let provider = LlmProvider::for_model(&model);
        let api_key = required_var(provider.api_key_var())?;

        let mut config = Self::new(model, api_key);
        config.endpoint = std::env::var("NL2SQL_ENDPOINT").ok();
        config.max_tokens = parsed_var("NL2SQL_MAX_TOKENS", config.max_tokens)?;
        config.max_retries = parsed_var("NL2SQL_MAX_RETRIES", config.max_retries)?;
        Ok(config)
    }

    /// Endpoint to call (override or provider default).
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(self.provider.endpoint())
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| EvalError::config(format!("{} environment variable not set", name)))
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| EvalError::config(format!("{} has invalid value '{}'", name, value))),
        Err(_) => Ok(default),
    }
}
