use std::num::NonZeroU32;

use governor::Quota;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use tracing::warn;

use crate::errors::ParlanceError;

/// Per-key admission control for outbound agent traffic.
///
/// `check` must be cheap and callable from concurrent tasks. A denial is
/// reported as [`ParlanceError::RateLimit`] and the caller gives up on the
/// request immediately; denials are never retried.
pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> Result<(), ParlanceError>;
}

/// GCRA limiter keyed by chat id: `limit` calls per 60-second window, with
/// burst capacity equal to the full window.
pub struct KeyedRateLimiter<C: Clock + Clone = DefaultClock> {
    limiter: governor::RateLimiter<
        String,
        DefaultKeyedStateStore<String>,
        C,
        NoOpMiddleware<C::Instant>,
    >,
    clock: C,
    per_minute: u32,
}

impl KeyedRateLimiter<DefaultClock> {
    pub fn per_minute(limit: u32) -> Self {
        Self::with_clock(limit, &DefaultClock::default())
    }
}

impl<C: Clock + Clone> KeyedRateLimiter<C> {
    /// Build against an explicit clock; tests drive this with
    /// `governor::clock::FakeRelativeClock`. A zero limit is clamped to one
    /// call per minute rather than locking every caller out.
    pub fn with_clock(limit: u32, clock: &C) -> Self {
        let cells = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: governor::RateLimiter::new(
                Quota::per_minute(cells),
                DefaultKeyedStateStore::default(),
                clock.clone(),
            ),
            clock: clock.clone(),
            per_minute: cells.get(),
        }
    }

    pub fn per_minute_limit(&self) -> u32 {
        self.per_minute
    }
}

impl<C> RateLimiter for KeyedRateLimiter<C>
where
    C: Clock + Clone + Send + Sync,
    C::Instant: Send + Sync,
{
    fn check(&self, key: &str) -> Result<(), ParlanceError> {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                warn!(
                    "rate limit exceeded for {}: {} calls/min, next slot in {:?}",
                    key, self.per_minute, wait
                );
                Err(ParlanceError::RateLimit {
                    retry_after: Some(wait.as_secs().max(1)),
                })
            }
        }
    }
}
