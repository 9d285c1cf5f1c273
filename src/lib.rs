//! Exchange Sentinel - circuit breakers and health orchestration for
//! multi-exchange crypto trading
//!
//! Per-metric circuit breakers (global and per exchange) latch on sustained
//! threshold violations. A concurrent health monitor probes every exchange,
//! feeds latency, error-rate, spread and volatility samples into those
//! breakers, and a router picks a healthy exchange for each symbol.

pub mod config;
pub mod types;
pub mod errors;
pub mod alerts;
pub mod breaker;
pub mod exchange;
pub mod health;
pub mod network;
pub mod routing;
pub mod volatility;
pub mod utils;
pub mod storage;

// Re-export commonly used items
pub use alerts::{AlertEvent, AlertLevel, AlertSink};
pub use breaker::{BreakerScope, CircuitBreaker, CircuitBreakerRegistry, MetricKind};
pub use config::Config;
pub use errors::{SentinelError, SentinelResult};
pub use exchange::{ExchangeAdapter, ExchangeManager};
pub use health::{ExchangeHealth, HealthBook, HealthMonitor};
pub use routing::{Router, RoutingMode};
pub use types::*;
