//! Alert sink that writes events to the tracing log

use tracing::{info, warn};
use super::{AlertEvent, AlertSink};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, event: AlertEvent) {
        match event {
            AlertEvent::BreakerOpened { name, scope, value, threshold } => {
                warn!(
                    breaker = %name,
                    scope = %scope,
                    value,
                    threshold,
                    "🔴 Circuit breaker OPENED: {} ({:.2} > {:.2})",
                    name, value, threshold
                );
            }
            AlertEvent::BreakerClosed { name, scope, duration_secs } => {
                info!(
                    breaker = %name,
                    scope = %scope,
                    duration_secs,
                    "🟢 Circuit breaker CLOSED: {} (duration: {:.0}s)",
                    name, duration_secs
                );
            }
            AlertEvent::ExchangeDegraded { exchange, latency_ms, threshold } => {
                warn!(
                    exchange = %exchange,
                    latency_ms,
                    threshold,
                    "⚠️ {} degraded: latency {:.0}ms over {:.0}ms",
                    exchange, latency_ms, threshold
                );
            }
            AlertEvent::ExchangeDisconnected { exchange, error } => {
                warn!(exchange = %exchange, "⚠️ Exchange disconnected: {} - {}", exchange, error);
            }
            AlertEvent::ExchangeReconnected { exchange } => {
                info!(exchange = %exchange, "✅ Exchange reconnected: {}", exchange);
            }
        }
    }
}
