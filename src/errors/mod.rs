use thiserror::Error;

/// Typed error hierarchy for parlance.
///
/// Use at module boundaries (agent API calls, config validation, chat stores).
/// Internal/leaf functions can continue using `anyhow::Result` — the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum ParlanceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Agent service error: {0}")]
    Service(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ParlanceError {
    /// Whether the failed operation should be retried with backoff.
    ///
    /// Rate-limit and authentication failures go straight to the caller;
    /// the HTTP layer above translates them into 429 and 401.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(_) | Self::Internal(_) => true,
            Self::Config(_) | Self::Auth(_) | Self::RateLimit { .. } => false,
        }
    }
}
