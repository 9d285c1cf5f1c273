//! Level filtering and per-key throttling in front of another sink

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use super::{AlertEvent, AlertLevel, AlertSink};

pub const DEFAULT_MIN_ALERT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub sent: u64,
    pub throttled: u64,
    pub filtered: u64,
}

pub struct ThrottledAlertSink<S: AlertSink> {
    inner: S,
    min_level: AlertLevel,
    min_interval: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
    sent: AtomicU64,
    throttled: AtomicU64,
    filtered: AtomicU64,
}

impl<S: AlertSink> ThrottledAlertSink<S> {
    pub fn new(inner: S, min_level: AlertLevel, min_interval: Duration) -> Self {
        Self {
            inner,
            min_level,
            min_interval,
            last_sent: Mutex::new(HashMap::new()),
            sent: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> AlertStats {
        AlertStats {
            sent: self.sent.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
        }
    }

    fn should_throttle(&self, key: &str, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        match last_sent.get(key) {
            Some(at) if now.duration_since(*at) < self.min_interval => true,
            _ => {
                last_sent.insert(key.to_string(), now);
                false
            }
        }
    }
}

impl<S: AlertSink> AlertSink for ThrottledAlertSink<S> {
    fn notify(&self, event: AlertEvent) {
        if event.level() < self.min_level {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            debug!("Alert below min level, skipping: {:?}", event);
            return;
        }

        if let Some(key) = event.throttle_key() {
            if self.should_throttle(&key, Instant::now()) {
                self.throttled.fetch_add(1, Ordering::Relaxed);
                debug!("Alert throttled: {}", key);
                return;
            }
        }

        self.sent.fetch_add(1, Ordering::Relaxed);
        self.inner.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MemoryAlertSink;

    #[test]
    fn repeated_keys_are_throttled_within_interval() {
        let sink = ThrottledAlertSink::new(
            MemoryAlertSink::default(),
            AlertLevel::Info,
            Duration::from_secs(60),
        );
        sink.exchange_disconnected("okx", "timeout");
        sink.exchange_disconnected("okx", "timeout");
        sink.exchange_disconnected("bybit", "timeout");

        assert_eq!(sink.inner().len(), 2);
        assert_eq!(sink.stats().throttled, 1);
        assert_eq!(sink.stats().sent, 2);
    }

    #[test]
    fn events_below_min_level_are_dropped() {
        let sink = ThrottledAlertSink::new(
            MemoryAlertSink::default(),
            AlertLevel::Warning,
            Duration::ZERO,
        );
        sink.exchange_reconnected("okx");
        sink.exchange_disconnected("okx", "reset");

        assert_eq!(sink.inner().len(), 1);
        assert_eq!(sink.stats().filtered, 1);
    }

    #[test]
    fn unkeyed_events_pass_through() {
        let sink = ThrottledAlertSink::new(
            MemoryAlertSink::default(),
            AlertLevel::Info,
            Duration::from_secs(3600),
        );
        sink.exchange_reconnected("okx");
        sink.exchange_reconnected("okx");
        assert_eq!(sink.inner().len(), 2);
    }
}
