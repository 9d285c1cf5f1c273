//! Per-exchange health record

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Step applied to `success_rate` on a successful probe.
pub const SUCCESS_STEP: f64 = 0.1;
/// Step applied to `success_rate` on a failed probe.
pub const FAILURE_STEP: f64 = 0.2;
/// Smoothing constant in `error_count / (error_count + k)`.
pub const ERROR_RATE_SMOOTHING: f64 = 10.0;
/// Success rate at or above which an exchange counts as recovered.
pub const RECOVERY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeHealth {
    pub exchange_id: String,
    pub connected: bool,
    pub last_ping_at: Option<DateTime<Utc>>,
    pub latency_ms: f64,
    pub error_count: u32,
    pub success_rate: f64,
    pub api_calls_used: u32,
    pub api_calls_limit: u32,
    pub features: BTreeMap<String, bool>,
    #[serde(skip)]
    api_window_started: DateTime<Utc>,
}

impl ExchangeHealth {
    /// A freshly connected exchange: connected, perfect success rate, no errors.
    pub fn new(
        exchange_id: impl Into<String>,
        api_calls_limit: u32,
        features: BTreeMap<String, bool>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            connected: true,
            last_ping_at: Some(now),
            latency_ms: 0.0,
            error_count: 0,
            success_rate: 1.0,
            api_calls_used: 0,
            api_calls_limit,
            features,
            api_window_started: now,
        }
    }

    /// Applies a successful probe. Returns true when the success rate
    /// crossed upward through the recovery threshold.
    pub fn record_success(&mut self, latency_ms: f64, now: DateTime<Utc>) -> bool {
        let previous = self.success_rate;

        self.connected = true;
        self.last_ping_at = Some(now);
        self.latency_ms = latency_ms;
        self.error_count = self.error_count.saturating_sub(1);
        self.success_rate = (self.success_rate + SUCCESS_STEP).clamp(0.0, 1.0);

        previous < RECOVERY_THRESHOLD && self.success_rate >= RECOVERY_THRESHOLD
    }

    /// Applies a failed probe. Returns whether the exchange was connected
    /// before the failure.
    pub fn record_failure(&mut self) -> bool {
        let was_connected = self.connected;

        self.connected = false;
        self.error_count = self.error_count.saturating_add(1);
        self.success_rate = (self.success_rate - FAILURE_STEP).clamp(0.0, 1.0);

        was_connected
    }

    /// Latency breaker tripped: the exchange stays out of routing without
    /// touching its counters.
    pub fn mark_degraded(&mut self) {
        self.connected = false;
    }

    pub fn error_rate(&self) -> f64 {
        let errors = self.error_count as f64;
        errors / (errors + ERROR_RATE_SMOOTHING)
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.success_rate > RECOVERY_THRESHOLD
    }

    pub fn supports(&self, feature: &str) -> bool {
        self.features.get(feature).copied().unwrap_or(false)
    }

    /// Counts an API call against a one-minute window.
    pub fn record_api_call(&mut self, now: DateTime<Utc>) {
        if now - self.api_window_started >= TimeDelta::minutes(1) {
            self.api_window_started = now;
            self.api_calls_used = 0;
        }
        self.api_calls_used = self.api_calls_used.saturating_add(1);
    }

    /// Fraction of the per-minute allowance consumed.
    pub fn rate_limit_usage(&self) -> f64 {
        if self.api_calls_limit == 0 {
            return 0.0;
        }
        self.api_calls_used as f64 / self.api_calls_limit as f64
    }
}
