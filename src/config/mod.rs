use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::errors::ParlanceError;

/// Environment variables read by [`GatewayConfig::from_env`].
pub const ENV_ENDPOINT: &str = "PARLANCE_ENDPOINT";
pub const ENV_AGENT_ID: &str = "PARLANCE_AGENT_ID";
pub const ENV_API_KEY: &str = "PARLANCE_API_KEY";
pub const ENV_MAX_RETRIES: &str = "PARLANCE_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "PARLANCE_RETRY_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "PARLANCE_TIMEOUT_SECS";
pub const ENV_RATE_LIMIT: &str = "PARLANCE_RATE_LIMIT_PER_MINUTE";

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_per_minute() -> u32 {
    30
}

/// Settings for one conversation gateway and the agent service behind it.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the remote agent service.
    #[serde(default)]
    pub endpoint: String,
    /// Identifier of the remote agent every run executes against.
    #[serde(default, rename = "agentId")]
    pub agent_id: String,
    /// Bearer credential for the agent service, if it requires one.
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    /// Extra send attempts after the first one fails retryably.
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: usize,
    /// Base backoff delay; doubles per attempt up to `max_retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms", rename = "retryDelayMs")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms", rename = "maxRetryDelayMs")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier", rename = "backoffMultiplier")]
    pub backoff_multiplier: f64,
    /// Budget for a single remote call, including run polling.
    #[serde(default = "default_timeout_secs", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    /// Per-chat admission limit enforced before any remote call.
    #[serde(default = "default_rate_limit_per_minute", rename = "rateLimitPerMinute")]
    pub rate_limit_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            agent_id: String::new(),
            api_key: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_secs: default_timeout_secs(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("agent_id", &self.agent_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("timeout_secs", &self.timeout_secs)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

impl GatewayConfig {
    /// Load settings from `PARLANCE_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_env_with(&|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup,
    /// so tests never have to mutate process-wide environment state.
    pub fn from_env_with(get: &dyn Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(agent_id) = get(ENV_AGENT_ID) {
            config.agent_id = agent_id;
        }
        if let Some(api_key) = get(ENV_API_KEY)
            && !api_key.trim().is_empty()
        {
            config.api_key = Some(api_key);
        }
        if let Some(max_retries) = parse_env(get, ENV_MAX_RETRIES) {
            config.max_retries = max_retries;
        }
        if let Some(delay) = parse_env(get, ENV_RETRY_DELAY_MS) {
            config.retry_delay_ms = delay;
        }
        if let Some(timeout) = parse_env(get, ENV_TIMEOUT_SECS) {
            config.timeout_secs = timeout;
        }
        if let Some(limit) = parse_env(get, ENV_RATE_LIMIT) {
            config.rate_limit_per_minute = limit;
        }

        config
    }

    /// Whether endpoint, agent id, and api key are all present in the
    /// environment. Callers use this to decide if the gateway should be
    /// offered at all.
    pub fn is_enabled() -> bool {
        Self::enabled_with(&|key| std::env::var(key).ok())
    }

    /// Injectable variant of [`is_enabled`](Self::is_enabled).
    pub fn enabled_with(get: &dyn Fn(&str) -> Option<String>) -> bool {
        [ENV_ENDPOINT, ENV_AGENT_ID, ENV_API_KEY]
            .iter()
            .all(|key| get(key).is_some_and(|value| !value.trim().is_empty()))
    }

    /// Reject configurations the gateway cannot operate with. Called once
    /// at construction; a failure here is fatal, not retryable.
    pub fn validate(&self) -> Result<(), ParlanceError> {
        if self.endpoint.trim().is_empty() || self.agent_id.trim().is_empty() {
            return Err(ParlanceError::Config(
                "agent service not configured: endpoint and agent id are required".to_string(),
            ));
        }
        Url::parse(&self.endpoint).map_err(|e| {
            ParlanceError::Config(format!("invalid endpoint URL {}: {}", self.endpoint, e))
        })?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparsable {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests;
