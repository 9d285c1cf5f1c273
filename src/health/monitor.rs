//! Periodic health probing across all exchanges

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use crate::{
    alerts::AlertSink,
    breaker::{CircuitBreakerRegistry, MetricKind},
    config::{DEFAULT_ERROR_BACKOFF_SECS, DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_PROBE_TIMEOUT_MS},
    errors::{SentinelError, SentinelResult},
    exchange::ExchangeAdapter,
    utils::Clock,
    volatility::VolatilityCalculator,
};
use super::HealthBook;

/// Seconds of ticker history behind the volatility figure.
pub const DEFAULT_VOLATILITY_WINDOW_SECS: i64 = 300;

/// One exchange the monitor probes every cycle.
#[derive(Clone)]
pub struct ProbeTarget {
    pub exchange: String,
    pub adapter: Arc<dyn ExchangeAdapter>,
    pub timeout: Duration,
    /// Symbol whose ticker feeds the spread and volatility breakers.
    pub watch_symbol: Option<String>,
}

impl ProbeTarget {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self {
            exchange: adapter.id().to_string(),
            adapter,
            timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            watch_symbol: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn watching(mut self, symbol: impl Into<String>) -> Self {
        self.watch_symbol = Some(symbol.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Healthy,
    /// Responded, but the latency breaker is open.
    Degraded,
    Failed,
    /// No health record exists for the exchange.
    Untracked,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub healthy: usize,
    pub degraded: usize,
    pub failed: usize,
    pub untracked: usize,
    pub elapsed_ms: u64,
}

impl CycleReport {
    fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Healthy => self.healthy += 1,
            ProbeOutcome::Degraded => self.degraded += 1,
            ProbeOutcome::Failed => self.failed += 1,
            ProbeOutcome::Untracked => self.untracked += 1,
        }
    }

    pub fn probed(&self) -> usize {
        self.healthy + self.degraded + self.failed + self.untracked
    }
}

/// Probes every exchange concurrently on a fixed interval and feeds the
/// results into the health book and the breaker registry.
///
/// Cloning is cheap; every clone shares the same book, registry and
/// volatility windows.
#[derive(Clone)]
pub struct HealthMonitor {
    targets: Arc<Vec<ProbeTarget>>,
    book: Arc<HealthBook>,
    registry: Arc<CircuitBreakerRegistry>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    error_backoff: Duration,
    volatility_window_secs: i64,
    volatility: Arc<Mutex<HashMap<String, VolatilityCalculator>>>,
}

impl HealthMonitor {
    pub fn new(
        targets: Vec<ProbeTarget>,
        book: Arc<HealthBook>,
        registry: Arc<CircuitBreakerRegistry>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            targets: Arc::new(targets),
            book,
            registry,
            alerts,
            clock,
            interval: Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            error_backoff: Duration::from_secs(DEFAULT_ERROR_BACKOFF_SECS),
            volatility_window_secs: DEFAULT_VOLATILITY_WINDOW_SECS,
            volatility: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn with_volatility_window(mut self, secs: i64) -> Self {
        self.volatility_window_secs = secs;
        self
    }

    pub fn book(&self) -> &Arc<HealthBook> {
        &self.book
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Runs cycles until `shutdown` fires or its sender is dropped.
    ///
    /// A failed cycle is logged and followed by the error backoff; the
    /// loop itself never exits on a cycle error.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        info!(
            exchanges = self.targets.len(),
            interval_secs = self.interval.as_secs(),
            "🩺 Health monitor started"
        );

        loop {
            let pause = match self.run_cycle().await {
                Ok(report) => {
                    debug!(
                        healthy = report.healthy,
                        degraded = report.degraded,
                        failed = report.failed,
                        elapsed_ms = report.elapsed_ms,
                        "Health check cycle complete"
                    );
                    self.interval
                }
                Err(e) => {
                    error!("Health monitor error: {}", e);
                    self.error_backoff
                }
            };

            tokio::select! {
                _ = time::sleep(pause) => {}
                _ = &mut shutdown => {
                    info!("🛑 Health monitor stopping");
                    break;
                }
            }
        }
    }

    /// Probes every target concurrently and waits for all of them.
    ///
    /// A probe task that panics or is cancelled turns the whole cycle into
    /// a `Monitor` error after the remaining probes have finished.
    pub async fn run_cycle(&self) -> SentinelResult<CycleReport> {
        let started = Instant::now();
        let mut probes = JoinSet::new();

        for target in self.targets.iter().cloned() {
            let monitor = self.clone();
            probes.spawn(async move { monitor.probe(&target).await });
        }

        let mut report = CycleReport::default();
        let mut failures = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => failures.push(e.to_string()),
            }
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if !failures.is_empty() {
            return Err(SentinelError::Monitor {
                message: format!("{} probe task(s) failed: {}", failures.len(), failures.join("; ")),
                source: None,
            });
        }
        Ok(report)
    }

    /// Runs one probe against `target` and applies the result.
    pub async fn probe(&self, target: &ProbeTarget) -> ProbeOutcome {
        let exchange = target.exchange.as_str();
        let Some(slot) = self.book.get(exchange) else {
            debug!("No health record for {}, skipping probe", exchange);
            return ProbeOutcome::Untracked;
        };

        let started = Instant::now();
        let result = match time::timeout(target.timeout, target.adapter.fetch_balance()).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(SentinelError::Timeout {
                exchange: exchange.to_string(),
                timeout: target.timeout,
            }),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let now = self.clock.now();
        slot.lock().record_api_call(now);

        if let Err(e) = result {
            let (was_connected, error_rate) = {
                let mut health = slot.lock();
                let was_connected = health.record_failure();
                (was_connected, health.error_rate())
            };

            error!("❌ Health check failed for {}: {}", exchange, e);
            if was_connected {
                self.alerts.exchange_disconnected(exchange, &e.to_string());
            }
            self.registry.check(MetricKind::ErrorRate, error_rate, Some(exchange));
            return ProbeOutcome::Failed;
        }

        self.registry.check(MetricKind::Latency, latency_ms, Some(exchange));
        if self.registry.is_open(MetricKind::Latency, Some(exchange)) {
            slot.lock().mark_degraded();
            let threshold = self.registry.threshold(MetricKind::Latency, Some(exchange));
            debug!(exchange, latency_ms, threshold, "Latency breaker open, marking degraded");
            self.alerts.exchange_degraded(exchange, latency_ms, threshold);
            return ProbeOutcome::Degraded;
        }

        let (recovered, error_rate) = {
            let mut health = slot.lock();
            let recovered = health.record_success(latency_ms, now);
            (recovered, health.error_rate())
        };
        if recovered {
            info!("✅ {} recovered", exchange);
            self.alerts.exchange_reconnected(exchange);
        }
        self.registry.check(MetricKind::ErrorRate, error_rate, Some(exchange));

        if let Some(symbol) = target.watch_symbol.as_deref() {
            self.sample_market(target, symbol).await;
        }

        ProbeOutcome::Healthy
    }

    /// Feeds spread and rolling volatility for `symbol` into the breakers.
    /// Ticker failures only affect this sample.
    async fn sample_market(&self, target: &ProbeTarget, symbol: &str) {
        let exchange = target.exchange.as_str();
        let ticker = match time::timeout(target.timeout, target.adapter.fetch_ticker(symbol)).await {
            Ok(Ok(ticker)) => ticker,
            Ok(Err(e)) => {
                warn!("Ticker fetch failed for {} on {}: {}", symbol, exchange, e);
                return;
            }
            Err(_) => {
                warn!("Ticker fetch timed out for {} on {}", symbol, exchange);
                return;
            }
        };

        let now = self.clock.now();
        if let Some(slot) = self.book.get(exchange) {
            slot.lock().record_api_call(now);
        }

        if let Some(spread_bps) = ticker.spread_bps() {
            self.registry.check(MetricKind::Spread, spread_bps, Some(exchange));
        }

        let volatility = {
            let mid = ticker.mid().to_f64();
            let mut windows = self.volatility.lock();
            let window = windows
                .entry(exchange.to_string())
                .or_insert_with(|| VolatilityCalculator::new(self.volatility_window_secs));
            if let Some(mid) = mid {
                window.add_price(mid, now);
            }
            window.relative_volatility()
        };
        if let Some(volatility) = volatility {
            self.registry.check(MetricKind::Volatility, volatility, Some(exchange));
        }
    }
}
