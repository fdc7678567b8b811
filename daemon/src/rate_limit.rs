use governor::{clock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::config::RateLimitConfig;

/// Token-bucket limiter over incoming IPC commands, so a misbehaving
/// client cannot flood the daemon with capture requests.
pub struct CommandRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, clock::DefaultClock>,
    enabled: bool,
}

impl CommandRateLimiter {
    /// Build a limiter allowing `commands_per_second` sustained with
    /// bursts up to `burst_capacity`.
    ///
    /// # Panics
    /// Panics if `commands_per_second` or `burst_capacity` is 0.
    pub fn new(commands_per_second: u32, burst_capacity: u32, enabled: bool) -> Self {
        let quota = Quota::per_second(Self::non_zero(commands_per_second))
            .allow_burst(Self::non_zero(burst_capacity));

        Self {
            limiter: RateLimiter::direct(quota),
            enabled,
        }
    }

    /// Build from the `[rate_limit]` config section. Zero values are
    /// rejected by `Config::validate` before a loaded config reaches
    /// this point.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.commands_per_second,
            config.burst_capacity,
            config.enabled,
        )
    }

    /// Immediate check, no waiting. Returns false when the command
    /// should be rejected.
    pub fn check(&self) -> bool {
        if !self.enabled {
            return true;
        }

        self.limiter.check().is_ok()
    }

    /// Wait until a token is available. Connection handlers should use
    /// `check` instead so a flooded daemon rejects rather than queues.
    pub async fn acquire(&self) {
        if !self.enabled {
            return;
        }

        self.limiter.until_ready().await;
    }

    fn non_zero(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).expect("commands_per_second and burst_capacity must be non-zero")
    }
}
