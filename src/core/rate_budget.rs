//! Per-provider fixed-window request budget.
//!
//! Every provider owns one [`RateWindow`] behind its own mutex, so providers
//! never contend with each other. A denied attempt returns immediately; the
//! budget never queues or sleeps.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::clock::{Clock, SystemClock};
use crate::models::{Provider, RateLimitStatus};

/// Window length used by every provider unless configured otherwise
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Limit and window length for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Request counter for the current fixed window of one provider
#[derive(Debug, Clone)]
pub struct RateWindow {
    pub window_start: DateTime<Utc>,
    pub count: u32,
    pub limit: u32,
    pub window_duration: chrono::Duration,
}

impl RateWindow {
    pub fn new(config: RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 0,
            limit: config.limit,
            window_duration: chrono::Duration::from_std(config.window)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn reset_time(&self) -> DateTime<Utc> {
        self.window_start
            .checked_add_signed(self.window_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time()
    }

    /// Start a new window if the current one has elapsed
    fn roll(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        self.roll(now);
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Effective state at `now`, without starting a new window
    fn status_at(&self, now: DateTime<Utc>) -> RateLimitStatus {
        if self.is_expired(now) {
            RateLimitStatus {
                current: 0,
                max: self.limit,
                reset_time: now
                    .checked_add_signed(self.window_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            }
        } else {
            RateLimitStatus {
                current: self.count,
                max: self.limit,
                reset_time: self.reset_time(),
            }
        }
    }
}

/// Fixed-window rate budget shared by every concurrent search
///
/// Built once at startup and shared behind an `Arc`. Providers without a
/// configured window are unlimited.
pub struct RateBudget {
    windows: HashMap<Provider, Mutex<RateWindow>>,
    clock: Arc<dyn Clock>,
}

impl RateBudget {
    /// Create a budget backed by the system clock
    pub fn new(configs: impl IntoIterator<Item = (Provider, RateLimitConfig)>) -> Self {
        Self::with_clock(configs, Arc::new(SystemClock))
    }

    pub fn with_clock(
        configs: impl IntoIterator<Item = (Provider, RateLimitConfig)>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let windows = configs
            .into_iter()
            .map(|(provider, config)| (provider, Mutex::new(RateWindow::new(config, now))))
            .collect();

        Self { windows, clock }
    }

    /// Lock one provider's window, recovering from poison
    fn lock(window: &Mutex<RateWindow>) -> MutexGuard<'_, RateWindow> {
        window.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Rate window mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Take one request from the provider's current window.
    ///
    /// Returns `false` without consuming anything when the window is exhausted.
    pub fn try_consume(&self, provider: Provider) -> bool {
        let Some(window) = self.windows.get(&provider) else {
            return true;
        };

        let now = self.clock.now();
        let mut window = Self::lock(window);
        let allowed = window.try_consume(now);

        if allowed {
            tracing::trace!("{} budget: {}/{}", provider, window.count, window.limit);
        } else {
            tracing::warn!(
                "{} rate limit reached ({}/{}), resets at {}",
                provider,
                window.count,
                window.limit,
                window.reset_time().to_rfc3339()
            );
        }

        allowed
    }

    /// Current state of one provider's window
    pub fn status(&self, provider: Provider) -> Option<RateLimitStatus> {
        let now = self.clock.now();
        self.windows
            .get(&provider)
            .map(|window| Self::lock(window).status_at(now))
    }

    /// Current state of every configured window, keyed by provider
    pub fn snapshot(&self) -> BTreeMap<Provider, RateLimitStatus> {
        let now = self.clock.now();
        self.windows
            .iter()
            .map(|(provider, window)| (*provider, Self::lock(window).status_at(now)))
            .collect()
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.windows.keys().copied().collect();
        providers.sort();
        providers
    }
}

impl std::fmt::Debug for RateBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateBudget")
            .field("providers", &self.providers())
            .finish()
    }
}
