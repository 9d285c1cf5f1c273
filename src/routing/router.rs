//! Symbol routing across healthy exchanges

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use crate::{
    config::Config,
    errors::SentinelError,
    health::{ExchangeHealth, HealthBook},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Single,
    #[default]
    Failover,
    LoadBalance,
    BestExecution,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Single => "single",
            RoutingMode::Failover => "failover",
            RoutingMode::LoadBalance => "load_balance",
            RoutingMode::BestExecution => "best_execution",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingMode {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(RoutingMode::Single),
            "failover" => Ok(RoutingMode::Failover),
            "load_balance" => Ok(RoutingMode::LoadBalance),
            "best_execution" => Ok(RoutingMode::BestExecution),
            other => Err(SentinelError::config(format!("unknown routing mode {}", other))),
        }
    }
}

/// Weighted score used by best-execution routing.
pub fn execution_score(health: &ExchangeHealth) -> f64 {
    health.success_rate * 100.0 - health.latency_ms / 10.0
}

/// Picks the exchange that should serve a symbol.
///
/// `None` means nothing is eligible right now; callers defer or skip.
/// Candidates are enumerated in health-book order, and ties keep the
/// first candidate seen.
#[derive(Debug, Clone, Default)]
pub struct Router {
    mode: RoutingMode,
    primary: Option<String>,
    failover_order: Vec<String>,
    weights: BTreeMap<String, f64>,
    allowed_symbols: HashMap<String, Vec<String>>,
}

impl Router {
    pub fn new(mode: RoutingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.strategy.mode,
            primary: config.strategy.primary_exchange.clone(),
            failover_order: config.strategy.failover_order.clone(),
            weights: config.strategy.load_balance_weights.clone(),
            allowed_symbols: config
                .exchanges
                .iter()
                .map(|e| (e.id.clone(), e.symbols.clone()))
                .collect(),
        }
    }

    pub fn with_primary(mut self, exchange: impl Into<String>) -> Self {
        self.primary = Some(exchange.into());
        self
    }

    pub fn with_failover_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failover_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_weight(mut self, exchange: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(exchange.into(), weight);
        self
    }

    pub fn with_symbols<I, S>(mut self, exchange: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_symbols
            .insert(exchange.into(), symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// An exchange with no allow-list accepts every symbol.
    pub fn symbol_supported(&self, exchange: &str, symbol: &str) -> bool {
        match self.allowed_symbols.get(exchange) {
            Some(symbols) if !symbols.is_empty() => symbols.iter().any(|s| s == symbol),
            _ => true,
        }
    }

    pub fn select_exchange(&self, symbol: &str, book: &HealthBook) -> Option<String> {
        let selected = match self.mode {
            RoutingMode::Single => self.select_single(book),
            RoutingMode::Failover => self.select_failover(symbol, book),
            RoutingMode::LoadBalance => self.select_load_balanced(symbol, book),
            RoutingMode::BestExecution => self.select_best_execution(symbol, book),
        };

        debug!(symbol, mode = %self.mode, selected = ?selected, "Routing decision");
        selected
    }

    fn select_single(&self, book: &HealthBook) -> Option<String> {
        let primary = self.primary.as_deref()?;
        book.is_connected(primary).then(|| primary.to_string())
    }

    fn select_failover(&self, symbol: &str, book: &HealthBook) -> Option<String> {
        self.failover_order
            .iter()
            .find(|id| book.is_connected(id) && self.symbol_supported(id, symbol))
            .cloned()
    }

    fn select_load_balanced(&self, symbol: &str, book: &HealthBook) -> Option<String> {
        let candidates = self.candidates(symbol, book).into_iter().filter_map(|health| {
            self.weights
                .get(&health.exchange_id)
                .map(|weight| (health.exchange_id, *weight))
        });
        pick_max(candidates)
    }

    fn select_best_execution(&self, symbol: &str, book: &HealthBook) -> Option<String> {
        let candidates = self
            .candidates(symbol, book)
            .into_iter()
            .map(|health| {
                let score = execution_score(&health);
                (health.exchange_id, score)
            });
        pick_max(candidates)
    }

    /// Connected exchanges that accept the symbol, in book order.
    fn candidates(&self, symbol: &str, book: &HealthBook) -> Vec<ExchangeHealth> {
        book.snapshots()
            .into_iter()
            .filter(|health| health.connected && self.symbol_supported(&health.exchange_id, symbol))
            .collect()
    }
}

/// Highest value wins; only a strictly greater value displaces the leader.
fn pick_max(candidates: impl Iterator<Item = (String, f64)>) -> Option<String> {
    let mut best: Option<(String, f64)> = None;
    for (id, value) in candidates {
        match &best {
            Some((_, best_value)) if value <= *best_value => {}
            _ => best = Some((id, value)),
        }
    }
    best.map(|(id, _)| id)
}
