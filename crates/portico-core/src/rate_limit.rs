//! Per-client fixed-window rate limiting
//!
//! Each client gets a window that starts at its first request and resets
//! wholesale once `window` has fully elapsed. Every attempt is counted,
//! including the ones that get denied.

use crate::{CoreError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Rate limiter settings
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in seconds
    pub window_secs: u64,
    /// Requests admitted per window
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 10,
        }
    }
}

/// Outcome of a rate-limit check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured maximum per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// Seconds until the window ends; zero when allowed
    pub retry_after_secs: u64,
}

/// Counter state for one client
#[derive(Clone, Copy, Debug)]
struct ClientWindow {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Fixed-window limiter keyed by client identifier
pub struct RateLimiter {
    windows: DashMap<String, ClientWindow>,
    window: TimeDelta,
    max_requests: u32,
}

impl RateLimiter {
    /// Create a limiter from settings
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        if config.window_secs == 0 {
            return Err(CoreError::ZeroSetting("rate limit window"));
        }
        if config.max_requests == 0 {
            return Err(CoreError::ZeroSetting("rate limit max requests"));
        }

        let window = i64::try_from(config.window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(CoreError::ZeroSetting("rate limit window"))?;

        Ok(Self {
            windows: DashMap::new(),
            window,
            max_requests: config.max_requests,
        })
    }

    /// Count a request from `client_id` and decide whether to admit it
    ///
    /// The read-modify-write of the client's window happens under the map
    /// shard's write lock, so concurrent calls for one client serialize.
    pub fn check(&self, client_id: &str, now: DateTime<Utc>) -> Decision {
        self.sweep(now);

        let (count, window_start) = {
            let mut window = self
                .windows
                .entry(client_id.to_string())
                .or_insert(ClientWindow {
                    count: 0,
                    window_start: now,
                });

            if now - window.window_start > self.window {
                window.count = 0;
                window.window_start = now;
            }
            window.count = window.count.saturating_add(1);

            (window.count, window.window_start)
        };

        let reset_at = window_start + self.window;
        let remaining = self.max_requests.saturating_sub(count);

        if count > self.max_requests {
            let elapsed = (now - window_start).max(TimeDelta::zero());
            let left_ms = (self.window - elapsed).num_milliseconds().max(0);
            let retry_after_secs = (left_ms as u64).div_ceil(1000).max(1);

            tracing::debug!(
                client = %client_id,
                count,
                limit = self.max_requests,
                retry_after_secs,
                "Rate limit exceeded"
            );

            return Decision {
                allowed: false,
                limit: self.max_requests,
                remaining,
                reset_at,
                retry_after_secs,
            };
        }

        Decision {
            allowed: true,
            limit: self.max_requests,
            remaining,
            reset_at,
            retry_after_secs: 0,
        }
    }

    /// Drop every window that has fully expired
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now - w.window_start <= self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Configured maximum per window
    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Window length
    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// Number of tracked client windows
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if no client is tracked
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
