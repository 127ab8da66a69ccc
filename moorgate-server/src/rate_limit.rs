//! Rate limiting for challenge issuance.
//!
//! Issuing a challenge writes a nonce row and may call out to discovery
//! and the execution node, so issuance is limited per account. Submission
//! is not limited here: every attempt burns a nonce, which is its own
//! throttle.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

const BURST: u32 = 10;

/// Per-account limiter over challenge issuance.
#[derive(Clone)]
pub struct ChallengeRateLimiter {
    limiter: Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>,
}

impl ChallengeRateLimiter {
    /// Allow `per_minute` sustained requests per account, with bursts of
    /// up to 10 on top. Zero is clamped to one.
    pub fn new(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(BURST).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Whether one more challenge may be issued to `account` right now.
    pub fn check(&self, account: &str) -> bool {
        self.limiter.check_key(&account.to_string()).is_ok()
    }

    /// Drop per-key state that has fully replenished.
    pub fn shrink(&self) {
        self.limiter.retain_recent();
    }
}
