//! Per-caller fixed-window admission control.
//!
//! A window opens on a caller's first request and lasts `window`; up to
//! `max_requests` are admitted inside it. Entries whose window ended more than
//! `expiry_grace` ago are removed by a periodic sweep.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use docket_core::settings::RateLimitSettings;
use docket_telemetry::{names, MetricsRecorder};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
    pub expiry_grace: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}

impl RateLimitConfig {
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests_per_minute,
            window: Duration::from_secs(settings.window_secs),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs.max(1)),
            expiry_grace: Duration::from_secs(settings.expiry_grace_secs),
        }
    }
}

/// Outcome of one admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Refused { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Service-scoped store of caller windows.
///
/// Checks on one key hold that key's shard lock for the whole
/// read-modify-write, and the sweep takes the same locks, so a sweep never
/// interleaves with an increment.
pub struct RateLimitStore {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl RateLimitStore {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let admission = {
            let mut window = self.windows.entry(key.to_string()).or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.config.window,
            });
            if now > window.reset_at {
                window.count = 0;
                window.reset_at = now + self.config.window;
            }
            if window.count >= self.config.max_requests {
                Admission::Refused {
                    retry_after: window.reset_at.saturating_duration_since(now),
                }
            } else {
                window.count += 1;
                Admission::Allowed {
                    remaining: self.config.max_requests - window.count,
                }
            }
        };

        if let (Admission::Refused { .. }, Some(metrics)) = (&admission, &self.metrics) {
            metrics.counter_inc(names::RATE_LIMIT_REJECTIONS_TOTAL, &[], 1);
        }
        admission
    }

    /// Drop windows that ended more than the grace period before `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let grace = self.config.expiry_grace;
        let mut removed = 0;
        self.windows.retain(|_, w| {
            let keep = now <= w.reset_at + grace;
            if !keep {
                removed += 1;
            }
            keep
        });
        if let Some(metrics) = &self.metrics {
            metrics.gauge_set(names::RATE_LIMIT_TRACKED_CLIENTS, &[], self.windows.len() as f64);
        }
        removed
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Sweep on a fixed interval until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.config.sweep_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_at(Instant::now());
                        if removed > 0 {
                            tracing::debug!(removed, tracked = store.tracked(), "rate limit sweep");
                        }
                    }
                }
            }
        })
    }
}
