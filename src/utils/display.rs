//! Display and printing utilities

use tracing::{info, warn};
use crate::types::SystemStatus;

pub fn print_status_report(status: &SystemStatus) {
    info!("\n📊 Sentinel Status ({})", status.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    info!("   Routing mode: {}", status.routing_mode);
    info!(
        "   System health: {} ({} healthy / {} connected / {} tracked)",
        if status.system_healthy { "HEALTHY" } else { "DEGRADED" },
        status.healthy_exchanges.len(),
        status.connected_count(),
        status.exchanges.len()
    );

    info!("   🔌 EXCHANGES:");
    for health in &status.exchanges {
        info!(
            "     {} {}: latency {:.0}ms, success {:.0}%, errors {}, api {}/{}",
            if health.connected { "🟢" } else { "🔴" },
            health.exchange_id,
            health.latency_ms,
            health.success_rate * 100.0,
            health.error_count,
            health.api_calls_used,
            health.api_calls_limit
        );
    }

    if status.open_breaker_count == 0 {
        info!("   ⚡ CIRCUIT BREAKERS: all closed");
    } else {
        warn!("   ⚡ CIRCUIT BREAKERS: {} open", status.open_breaker_count);
        for breaker in &status.open_breakers {
            warn!(
                "     🚨 {} [{}]: last value {:.4} > {:.4}, triggered {} time(s)",
                breaker.name,
                breaker.scope,
                breaker.metadata.last_trigger_value.unwrap_or_default(),
                breaker.threshold,
                breaker.trigger_count
            );
        }
    }

    if !status.recent_alerts.is_empty() {
        info!("   🔔 Recent alerts: {}", status.recent_alerts.len());
        for event in status.recent_alerts.iter().rev().take(5) {
            info!("     {:?}", event);
        }
    }

    info!("");
}
