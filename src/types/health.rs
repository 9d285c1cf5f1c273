//! Status surface types

use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::{
    alerts::AlertEvent,
    breaker::{BreakerSnapshot, RegistryStatus},
    health::ExchangeHealth,
    routing::RoutingMode,
};

/// Point-in-time view of breakers and exchange health for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub generated_at: DateTime<Utc>,
    pub routing_mode: RoutingMode,
    pub breakers: RegistryStatus,
    pub open_breaker_count: usize,
    pub open_breakers: Vec<BreakerSnapshot>,
    pub exchanges: Vec<ExchangeHealth>,
    pub healthy_exchanges: Vec<String>,
    pub system_healthy: bool,
    pub recent_alerts: Vec<AlertEvent>,
}

impl SystemStatus {
    pub fn connected_count(&self) -> usize {
        self.exchanges.iter().filter(|health| health.connected).count()
    }
}
