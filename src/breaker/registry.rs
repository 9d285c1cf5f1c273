//! Registry of global and per-exchange circuit breakers

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use crate::{
    alerts::AlertSink,
    config::BreakerSettings,
    utils::Clock,
};
use super::{BreakerScope, BreakerSnapshot, CircuitBreaker, MetricKind};

type SharedBreaker = Arc<Mutex<CircuitBreaker>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub global: BTreeMap<String, BreakerSnapshot>,
    pub exchanges: BTreeMap<String, BTreeMap<String, BreakerSnapshot>>,
}

/// Owns one global breaker per metric plus lazily created exchange-scoped
/// breakers.
///
/// Every breaker sits behind its own lock, so probes for different
/// exchanges only contend when they touch the same breaker. The global
/// breakers are shared by all exchanges: samples from every exchange feed
/// the same violation streak, which makes them a market-wide trip wire.
pub struct CircuitBreakerRegistry {
    global: BTreeMap<MetricKind, SharedBreaker>,
    exchanges: RwLock<BTreeMap<String, BTreeMap<MetricKind, SharedBreaker>>>,
    max_consecutive: u32,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(settings: &BreakerSettings, alerts: Arc<dyn AlertSink>, clock: Arc<dyn Clock>) -> Self {
        let global = MetricKind::ALL
            .into_iter()
            .map(|kind| {
                let breaker = CircuitBreaker::new(
                    format!("Global {}", kind.label()),
                    kind,
                    BreakerScope::Global,
                    settings.threshold(kind),
                    settings.cooldown_secs,
                    alerts.clone(),
                )
                .with_max_consecutive(settings.max_consecutive);
                (kind, Arc::new(Mutex::new(breaker)))
            })
            .collect();

        info!(
            cooldown_secs = settings.cooldown_secs,
            max_consecutive = settings.max_consecutive,
            "Circuit breaker registry initialized"
        );

        Self {
            global,
            exchanges: RwLock::new(BTreeMap::new()),
            max_consecutive: settings.max_consecutive,
            alerts,
            clock,
        }
    }

    /// Registers a breaker scoped to one exchange. An existing breaker for
    /// the same pair is kept untouched and false is returned.
    pub fn create_exchange_breaker(
        &self,
        exchange: &str,
        kind: MetricKind,
        threshold: f64,
        cooldown_secs: u64,
    ) -> bool {
        let mut exchanges = self.exchanges.write();
        let breakers = exchanges.entry(exchange.to_string()).or_default();
        if breakers.contains_key(&kind) {
            debug!("Breaker {} {} already registered", exchange, kind);
            return false;
        }

        let breaker = CircuitBreaker::new(
            format!("{} {}", exchange, kind),
            kind,
            BreakerScope::Exchange(exchange.to_string()),
            threshold,
            cooldown_secs,
            self.alerts.clone(),
        )
        .with_max_consecutive(self.max_consecutive);
        breakers.insert(kind, Arc::new(Mutex::new(breaker)));

        info!("Created exchange-specific breaker: {} {} (threshold {})", exchange, kind, threshold);
        true
    }

    /// Feeds a sample to the global breaker for `kind` and, when `exchange`
    /// is given and has a breaker for `kind`, to that one as well.
    ///
    /// An open global breaker ends the check: the call only tests its
    /// cooldown and the exchange breaker never sees the sample.
    pub fn check(&self, kind: MetricKind, value: f64, exchange: Option<&str>) {
        let now = self.clock.now();

        if let Some(breaker) = self.global.get(&kind) {
            if Self::observe(breaker, value, now) {
                return;
            }
        }

        if let Some(breaker) = exchange.and_then(|id| self.exchange_breaker(id, kind)) {
            Self::observe(&breaker, value, now);
        }
    }

    /// Same as [`check`](Self::check) keyed by metric name; unknown names are ignored.
    pub fn check_named(&self, metric: &str, value: f64, exchange: Option<&str>) {
        match metric.parse::<MetricKind>() {
            Ok(kind) => self.check(kind, value, exchange),
            Err(_) => debug!("Ignoring sample for unknown metric {}", metric),
        }
    }

    /// True if the global breaker or the exchange's own breaker is open.
    pub fn is_open(&self, kind: MetricKind, exchange: Option<&str>) -> bool {
        let global_open = self
            .global
            .get(&kind)
            .is_some_and(|breaker| breaker.lock().is_open());
        if global_open {
            return true;
        }

        exchange
            .and_then(|id| self.exchange_breaker(id, kind))
            .is_some_and(|breaker| breaker.lock().is_open())
    }

    pub fn is_open_named(&self, metric: &str, exchange: Option<&str>) -> bool {
        metric
            .parse::<MetricKind>()
            .map(|kind| self.is_open(kind, exchange))
            .unwrap_or(false)
    }

    /// Threshold of the exchange's own breaker when it has one, else the global one.
    pub fn threshold(&self, kind: MetricKind, exchange: Option<&str>) -> f64 {
        exchange
            .and_then(|id| self.exchange_breaker(id, kind))
            .or_else(|| self.global.get(&kind).cloned())
            .map(|breaker| breaker.lock().threshold())
            .unwrap_or(f64::INFINITY)
    }

    pub fn open_count(&self) -> usize {
        self.all_breakers()
            .iter()
            .filter(|breaker| breaker.lock().is_open())
            .count()
    }

    pub fn open_breakers(&self) -> Vec<BreakerSnapshot> {
        self.all_breakers()
            .iter()
            .filter_map(|breaker| {
                let breaker = breaker.lock();
                breaker.is_open().then(|| breaker.snapshot())
            })
            .collect()
    }

    pub fn snapshot(&self, kind: MetricKind, exchange: Option<&str>) -> Option<BreakerSnapshot> {
        let breaker = match exchange {
            Some(id) => self.exchange_breaker(id, kind)?,
            None => self.global.get(&kind)?.clone(),
        };
        let snapshot = breaker.lock().snapshot();
        Some(snapshot)
    }

    pub fn status(&self) -> RegistryStatus {
        let global = self
            .global
            .iter()
            .map(|(kind, breaker)| (kind.to_string(), breaker.lock().snapshot()))
            .collect();

        let exchanges = self
            .exchanges
            .read()
            .iter()
            .map(|(exchange, breakers)| {
                let snapshots = breakers
                    .iter()
                    .map(|(kind, breaker)| (kind.to_string(), breaker.lock().snapshot()))
                    .collect();
                (exchange.clone(), snapshots)
            })
            .collect();

        RegistryStatus { global, exchanges }
    }

    /// Closes one breaker regardless of cooldown. `None` targets the global breaker.
    pub fn force_close(&self, kind: MetricKind, exchange: Option<&str>) -> bool {
        let breaker = match exchange {
            Some(id) => self.exchange_breaker(id, kind),
            None => self.global.get(&kind).cloned(),
        };
        let now = self.clock.now();
        breaker.is_some_and(|breaker| breaker.lock().force_close(now))
    }

    /// Emergency reset of every breaker. Returns how many were open.
    pub fn close_all(&self) -> usize {
        warn!("🚨 Force closing ALL circuit breakers");
        let now = self.clock.now();
        self.all_breakers()
            .iter()
            .filter(|breaker| breaker.lock().force_close(now))
            .count()
    }

    /// While open the sample is discarded; only the cooldown is tested.
    /// Returns `true` when the breaker was open on entry.
    fn observe(breaker: &SharedBreaker, value: f64, now: DateTime<Utc>) -> bool {
        let mut breaker = breaker.lock();
        if breaker.is_open() {
            if breaker.can_close(now) {
                breaker.close(now);
            }
            return true;
        }

        if breaker.evaluate(value) {
            breaker.open(value, now);
        }
        false
    }

    fn exchange_breaker(&self, exchange: &str, kind: MetricKind) -> Option<SharedBreaker> {
        self.exchanges
            .read()
            .get(exchange)
            .and_then(|breakers| breakers.get(&kind))
            .cloned()
    }

    fn all_breakers(&self) -> Vec<SharedBreaker> {
        let mut breakers: Vec<SharedBreaker> = self.global.values().cloned().collect();
        breakers.extend(
            self.exchanges
                .read()
                .values()
                .flat_map(|scoped| scoped.values().cloned()),
        );
        breakers
    }
}
