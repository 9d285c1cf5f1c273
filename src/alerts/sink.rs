//! Alert events and the sink capability the core notifies

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::breaker::BreakerScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertEvent {
    BreakerOpened {
        name: String,
        scope: BreakerScope,
        value: f64,
        threshold: f64,
    },
    BreakerClosed {
        name: String,
        scope: BreakerScope,
        duration_secs: f64,
    },
    ExchangeDegraded {
        exchange: String,
        latency_ms: f64,
        threshold: f64,
    },
    ExchangeDisconnected {
        exchange: String,
        error: String,
    },
    ExchangeReconnected {
        exchange: String,
    },
}

impl AlertEvent {
    pub fn level(&self) -> AlertLevel {
        match self {
            AlertEvent::BreakerOpened { .. }
            | AlertEvent::ExchangeDegraded { .. }
            | AlertEvent::ExchangeDisconnected { .. } => AlertLevel::Warning,
            AlertEvent::BreakerClosed { .. } | AlertEvent::ExchangeReconnected { .. } => {
                AlertLevel::Info
            }
        }
    }

    /// Deduplication key used by throttling sinks. Reconnects carry none.
    pub fn throttle_key(&self) -> Option<String> {
        match self {
            AlertEvent::BreakerOpened { name, scope, .. } => {
                Some(format!("cb_open_{}_{}", name, scope))
            }
            AlertEvent::BreakerClosed { name, scope, .. } => {
                Some(format!("cb_close_{}_{}", name, scope))
            }
            AlertEvent::ExchangeDegraded { exchange, .. } => {
                Some(format!("exchange_degraded_{}", exchange))
            }
            AlertEvent::ExchangeDisconnected { exchange, .. } => {
                Some(format!("exchange_disconnect_{}", exchange))
            }
            AlertEvent::ExchangeReconnected { .. } => None,
        }
    }

    pub fn exchange(&self) -> Option<&str> {
        match self {
            AlertEvent::BreakerOpened { scope, .. } | AlertEvent::BreakerClosed { scope, .. } => {
                scope.exchange()
            }
            AlertEvent::ExchangeDegraded { exchange, .. }
            | AlertEvent::ExchangeDisconnected { exchange, .. }
            | AlertEvent::ExchangeReconnected { exchange } => Some(exchange),
        }
    }
}

/// Receives state transitions from breakers and the health monitor.
///
/// Notifications are delivered synchronously from inside the transition
/// that caused them, so implementations must not block. Formatting,
/// throttling and transport belong to the implementation.
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: AlertEvent);

    fn breaker_opened(&self, name: &str, scope: &BreakerScope, value: f64, threshold: f64) {
        self.notify(AlertEvent::BreakerOpened {
            name: name.to_string(),
            scope: scope.clone(),
            value,
            threshold,
        });
    }

    fn breaker_closed(&self, name: &str, scope: &BreakerScope, duration_secs: f64) {
        self.notify(AlertEvent::BreakerClosed {
            name: name.to_string(),
            scope: scope.clone(),
            duration_secs,
        });
    }

    fn exchange_degraded(&self, exchange: &str, latency_ms: f64, threshold: f64) {
        self.notify(AlertEvent::ExchangeDegraded {
            exchange: exchange.to_string(),
            latency_ms,
            threshold,
        });
    }

    fn exchange_disconnected(&self, exchange: &str, error: &str) {
        self.notify(AlertEvent::ExchangeDisconnected {
            exchange: exchange.to_string(),
            error: error.to_string(),
        });
    }

    fn exchange_reconnected(&self, exchange: &str) {
        self.notify(AlertEvent::ExchangeReconnected {
            exchange: exchange.to_string(),
        });
    }
}

/// Delivers every event to each wrapped sink in order.
pub struct FanoutAlertSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutAlertSink {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

impl AlertSink for FanoutAlertSink {
    fn notify(&self, event: AlertEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}
