//! Sentinel configuration: TOML file plus environment overrides

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use crate::{
    alerts::{AlertLevel, DEFAULT_ALERT_HISTORY},
    breaker::{cooldown_delta, MetricKind, DEFAULT_MAX_CONSECUTIVE},
    errors::{SentinelError, SentinelResult},
    exchange::SimulationProfile,
    routing::RoutingMode,
};

pub const DEFAULT_CONFIG_PATH: &str = "sentinel.toml";
pub const DEFAULT_RATE_LIMIT: u32 = 600;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub breakers: BreakerSettings,
    pub strategy: StrategySettings,
    pub alerts: AlertSettings,
    pub logging: LoggingSettings,
    pub exchanges: Vec<ExchangeSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub latency_threshold_ms: f64,
    pub spread_threshold_bps: f64,
    pub volatility_threshold: f64,
    pub error_rate_threshold: f64,
    pub drawdown_threshold_bps: f64,
    pub cooldown_secs: u64,
    pub max_consecutive: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 500.0,
            spread_threshold_bps: 20.0,
            volatility_threshold: 0.05,
            error_rate_threshold: 0.1,
            drawdown_threshold_bps: 100.0,
            cooldown_secs: 300, // 5 minutes
            max_consecutive: DEFAULT_MAX_CONSECUTIVE,
        }
    }
}

impl BreakerSettings {
    pub fn threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Latency => self.latency_threshold_ms,
            MetricKind::Spread => self.spread_threshold_bps,
            MetricKind::Volatility => self.volatility_threshold,
            MetricKind::ErrorRate => self.error_rate_threshold,
            MetricKind::Drawdown => self.drawdown_threshold_bps,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategySettings {
    pub mode: RoutingMode,
    pub primary_exchange: Option<String>,
    pub failover_order: Vec<String>,
    pub load_balance_weights: BTreeMap<String, f64>,
    pub health_check_interval_secs: u64,
    pub min_healthy_exchanges: usize,
    pub error_backoff_secs: u64,
    pub status_report_secs: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            primary_exchange: None,
            failover_order: Vec::new(),
            load_balance_weights: BTreeMap::new(),
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            min_healthy_exchanges: 1,
            error_backoff_secs: DEFAULT_ERROR_BACKOFF_SECS,
            status_report_secs: 60,
        }
    }
}

impl StrategySettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertSettings {
    pub min_level: AlertLevel,
    pub throttle_secs: u64,
    pub history: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            min_level: AlertLevel::Warning,
            throttle_secs: 60,
            history: DEFAULT_ALERT_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: "output/logs".to_string(),
            file_prefix: "exchange-sentinel.log".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    /// Empty means every symbol is allowed.
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    /// Symbol whose ticker feeds the spread and volatility breakers.
    #[serde(default)]
    pub watch_symbol: Option<String>,
    #[serde(default)]
    pub breakers: Option<ExchangeBreakerSettings>,
    #[serde(default)]
    pub simulation: SimulationProfile,
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

impl ExchangeSettings {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            symbols: Vec::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            features: BTreeMap::new(),
            watch_symbol: None,
            breakers: None,
            simulation: SimulationProfile::default(),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn supports_symbol(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == symbol)
    }
}

/// Thresholds for breakers scoped to a single exchange. Only metrics given
/// here get an exchange-level breaker; the rest rely on the global ones.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeBreakerSettings {
    pub latency_threshold_ms: Option<f64>,
    pub spread_threshold_bps: Option<f64>,
    pub volatility_threshold: Option<f64>,
    pub error_rate_threshold: Option<f64>,
    pub drawdown_threshold_bps: Option<f64>,
    pub cooldown_secs: Option<u64>,
}

impl ExchangeBreakerSettings {
    pub fn thresholds(&self) -> Vec<(MetricKind, f64)> {
        [
            (MetricKind::Latency, self.latency_threshold_ms),
            (MetricKind::Spread, self.spread_threshold_bps),
            (MetricKind::Volatility, self.volatility_threshold),
            (MetricKind::ErrorRate, self.error_rate_threshold),
            (MetricKind::Drawdown, self.drawdown_threshold_bps),
        ]
        .into_iter()
        .filter_map(|(kind, threshold)| threshold.map(|t| (kind, t)))
        .collect()
    }
}

impl Config {
    /// Reads the TOML file, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> SentinelResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> SentinelResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = lookup("SENTINEL_ROUTING_MODE").and_then(|s| s.parse().ok()) {
            self.strategy.mode = mode;
        }
        if let Some(secs) = lookup("SENTINEL_HEALTH_CHECK_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.strategy.health_check_interval_secs = secs;
        }
        if let Some(ms) = lookup("SENTINEL_LATENCY_THRESHOLD_MS").and_then(|s| s.parse().ok()) {
            self.breakers.latency_threshold_ms = ms;
        }
        if let Some(secs) = lookup("SENTINEL_CIRCUIT_COOLDOWN_SECS").and_then(|s| s.parse().ok()) {
            self.breakers.cooldown_secs = secs;
        }
    }

    pub fn enabled_exchanges(&self) -> impl Iterator<Item = &ExchangeSettings> {
        self.exchanges.iter().filter(|e| e.enabled)
    }

    pub fn exchange(&self, id: &str) -> Option<&ExchangeSettings> {
        self.exchanges.iter().find(|e| e.id == id)
    }

    pub fn validate(&self) -> SentinelResult<()> {
        for kind in MetricKind::ALL {
            let threshold = self.breakers.threshold(kind);
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(SentinelError::config(format!(
                    "{} threshold must be a non-negative number, got {}",
                    kind, threshold
                )));
            }
        }
        if cooldown_delta(self.breakers.cooldown_secs).is_none() {
            return Err(SentinelError::config(format!(
                "breakers.cooldown_secs out of range: {}",
                self.breakers.cooldown_secs
            )));
        }
        if self.breakers.max_consecutive == 0 {
            return Err(SentinelError::config("breakers.max_consecutive must be at least 1"));
        }
        if self.strategy.health_check_interval_secs == 0 {
            return Err(SentinelError::config("strategy.health_check_interval_secs must be positive"));
        }

        let mut seen = HashSet::new();
        for exchange in &self.exchanges {
            if !seen.insert(exchange.id.as_str()) {
                return Err(SentinelError::config(format!("duplicate exchange id {}", exchange.id)));
            }
            if let Some(overrides) = &exchange.breakers {
                for (kind, threshold) in overrides.thresholds() {
                    if !threshold.is_finite() || threshold < 0.0 {
                        return Err(SentinelError::config(format!(
                            "{} {} threshold must be a non-negative number",
                            exchange.id, kind
                        )));
                    }
                }
                if let Some(secs) = overrides.cooldown_secs {
                    if cooldown_delta(secs).is_none() {
                        return Err(SentinelError::config(format!(
                            "{} breakers.cooldown_secs out of range: {}",
                            exchange.id, secs
                        )));
                    }
                }
            }
        }

        let enabled: HashSet<&str> = self.enabled_exchanges().map(|e| e.id.as_str()).collect();
        if enabled.is_empty() {
            return Err(SentinelError::config("no enabled exchanges configured"));
        }
        let require_enabled = |id: &str, context: &str| {
            if enabled.contains(id) {
                Ok(())
            } else {
                Err(SentinelError::config(format!(
                    "{} references unknown or disabled exchange {}",
                    context, id
                )))
            }
        };

        match self.strategy.mode {
            RoutingMode::Single => {
                if self.strategy.primary_exchange.is_none() {
                    return Err(SentinelError::config("single mode requires strategy.primary_exchange"));
                }
            }
            RoutingMode::Failover => {
                if self.strategy.failover_order.is_empty() {
                    return Err(SentinelError::config("failover mode requires strategy.failover_order"));
                }
            }
            RoutingMode::LoadBalance => {
                if self.strategy.load_balance_weights.is_empty() {
                    return Err(SentinelError::config(
                        "load_balance mode requires strategy.load_balance_weights",
                    ));
                }
            }
            RoutingMode::BestExecution => {}
        }

        if let Some(primary) = self.strategy.primary_exchange.as_deref() {
            require_enabled(primary, "strategy.primary_exchange")?;
        }
        for id in &self.strategy.failover_order {
            require_enabled(id, "strategy.failover_order")?;
        }
        for (id, weight) in &self.strategy.load_balance_weights {
            require_enabled(id, "strategy.load_balance_weights")?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(SentinelError::config(format!("weight for {} must be non-negative", id)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [breakers]
        latency_threshold_ms = 750
        cooldown_secs = 120

        [strategy]
        mode = "failover"
        failover_order = ["binance", "okx"]

        [[exchanges]]
        id = "binance"
        enabled = true
        symbols = ["BTC/USDT", "ETH/USDT"]
        rate_limit = 1200

        [exchanges.features]
        futures = true

        [[exchanges]]
        id = "okx"
        enabled = true

        [exchanges.breakers]
        latency_threshold_ms = 900

        [[exchanges]]
        id = "kraken"
    "#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = Config::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.breakers.latency_threshold_ms, 750.0);
        assert_eq!(config.breakers.cooldown_secs, 120);
        assert_eq!(config.breakers.error_rate_threshold, 0.1);
        assert_eq!(config.strategy.health_check_interval_secs, 30);
        assert_eq!(config.exchanges.len(), 3);
        assert_eq!(config.enabled_exchanges().count(), 2);

        let binance = config.exchange("binance").unwrap();
        assert_eq!(binance.rate_limit, 1200);
        assert_eq!(binance.features.get("futures"), Some(&true));
        assert!(binance.supports_symbol("ETH/USDT"));
        assert!(!binance.supports_symbol("SOL/USDT"));

        let okx = config.exchange("okx").unwrap();
        assert_eq!(okx.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(okx.supports_symbol("SOL/USDT"));
        assert_eq!(
            okx.breakers.as_ref().unwrap().thresholds(),
            vec![(MetricKind::Latency, 900.0)]
        );
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.apply_overrides(|key| match key {
            "SENTINEL_ROUTING_MODE" => Some("best_execution".to_string()),
            "SENTINEL_CIRCUIT_COOLDOWN_SECS" => Some("45".to_string()),
            "SENTINEL_LATENCY_THRESHOLD_MS" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.strategy.mode, RoutingMode::BestExecution);
        assert_eq!(config.breakers.cooldown_secs, 45);
        assert_eq!(config.breakers.latency_threshold_ms, 750.0);
    }

    #[test]
    fn rejects_failover_entry_for_disabled_exchange() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.strategy.failover_order.push("kraken".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kraken"));
    }

    #[test]
    fn single_mode_requires_primary() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.strategy.mode = RoutingMode::Single;
        assert!(matches!(config.validate(), Err(SentinelError::Configuration(_))));

        config.strategy.primary_exchange = Some("okx".into());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.breakers.spread_threshold_bps = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cooldown_beyond_time_range() {
        let raw = SAMPLE.replace("cooldown_secs = 120", "cooldown_secs = 10000000000000000");
        let config = Config::from_toml(&raw).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("breakers.cooldown_secs out of range"));

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.breakers.cooldown_secs = 86_400;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_exchange_cooldown_beyond_time_range() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        let okx = config.exchanges.iter_mut().find(|e| e.id == "okx").unwrap();
        okx.breakers.as_mut().unwrap().cooldown_secs = Some(u64::MAX);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("okx breakers.cooldown_secs out of range"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.exchanges.push(ExchangeSettings::new("okx"));
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn empty_config_has_no_enabled_exchanges() {
        let config = Config::from_toml("").unwrap();
        assert!(config.validate().is_err());
    }
}
