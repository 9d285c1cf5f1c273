//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use exchange_sentinel::{
    alerts::{AlertEvent, MemoryAlertSink},
    breaker::CircuitBreakerRegistry,
    config::BreakerSettings,
    errors::{SentinelError, SentinelResult},
    exchange::ExchangeAdapter,
    health::{ExchangeHealth, HealthBook, HealthMonitor, ProbeTarget},
    types::{Balance, Order, OrderBook, OrderRequest, Position, Ticker},
    utils::{Clock, ManualClock},
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// What the next balance call does.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Respond { delay_ms: u64 },
    Fail,
    Hang,
    Panic,
}

/// Adapter whose balance calls follow a script; once the script runs out
/// every call responds immediately.
pub struct ScriptedExchange {
    id: String,
    steps: Mutex<VecDeque<Step>>,
    connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    quote: Mutex<(Decimal, Decimal)>,
    closed: AtomicU32,
}

impl ScriptedExchange {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            steps: Mutex::new(VecDeque::new()),
            connect_failures: AtomicU32::new(0),
            connect_attempts: AtomicU32::new(0),
            quote: Mutex::new((Decimal::new(9999, 2), Decimal::new(10001, 2))),
            closed: AtomicU32::new(0),
        })
    }

    pub fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.steps.lock().extend(steps);
    }

    pub fn fail_connects(&self, times: u32) {
        self.connect_failures.store(times, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn set_quote(&self, bid: Decimal, ask: Decimal) {
        *self.quote.lock() = (bid, ask);
    }

    pub fn close_calls(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .pop_front()
            .unwrap_or(Step::Respond { delay_ms: 0 })
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedExchange {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> SentinelResult<()> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SentinelError::connection(&self.id, "refused"));
        }
        Ok(())
    }

    async fn fetch_balance(&self) -> SentinelResult<Balance> {
        match self.next_step() {
            Step::Respond { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Balance::default())
            }
            Step::Fail => Err(SentinelError::connection(&self.id, "503 service unavailable")),
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(Balance::default())
            }
            Step::Panic => panic!("scripted panic on {}", self.id),
        }
    }

    async fn fetch_ticker(&self, symbol: &str) -> SentinelResult<Ticker> {
        let (bid, ask) = *self.quote.lock();
        Ok(Ticker {
            symbol: symbol.to_string(),
            bid,
            ask,
            last: bid,
            timestamp: Utc::now(),
        })
    }

    async fn fetch_order_book(&self, _symbol: &str, _limit: Option<usize>) -> SentinelResult<OrderBook> {
        Err(SentinelError::connection(&self.id, "not scripted"))
    }

    async fn fetch_positions(&self, _symbols: Option<&[String]>) -> SentinelResult<Vec<Position>> {
        Ok(Vec::new())
    }

    async fn create_order(&self, request: &OrderRequest) -> SentinelResult<Order> {
        Err(SentinelError::InvalidOrder {
            exchange: self.id.clone(),
            reason: format!("scripted exchange does not trade {}", request.symbol),
        })
    }

    async fn cancel_order(&self, order_id: &str, _symbol: &str) -> SentinelResult<Order> {
        Err(SentinelError::InvalidOrder {
            exchange: self.id.clone(),
            reason: format!("unknown order {}", order_id),
        })
    }

    async fn close(&self) -> SentinelResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub registry: Arc<CircuitBreakerRegistry>,
    pub book: Arc<HealthBook>,
    pub alerts: Arc<MemoryAlertSink>,
    pub clock: Arc<ManualClock>,
    pub monitor: HealthMonitor,
    pub targets: Vec<ProbeTarget>,
}

impl Harness {
    pub fn new(exchanges: &[Arc<ScriptedExchange>], settings: BreakerSettings) -> Self {
        Self::build(exchanges, settings, |target| target)
    }

    pub fn build(
        exchanges: &[Arc<ScriptedExchange>],
        settings: BreakerSettings,
        customize: impl Fn(ProbeTarget) -> ProbeTarget,
    ) -> Self {
        let alerts = Arc::new(MemoryAlertSink::new(1000));
        let clock = Arc::new(ManualClock::new(start_time()));
        let registry = Arc::new(CircuitBreakerRegistry::new(&settings, alerts.clone(), clock.clone()));

        let mut book = HealthBook::new();
        let mut targets = Vec::new();
        for exchange in exchanges {
            book.insert(ExchangeHealth::new(exchange.id(), 600, BTreeMap::new(), clock.now()));
            let adapter: Arc<dyn ExchangeAdapter> = exchange.clone();
            targets.push(customize(ProbeTarget::new(adapter).with_timeout(PROBE_TIMEOUT)));
        }
        let book = Arc::new(book);

        let monitor = HealthMonitor::new(
            targets.clone(),
            book.clone(),
            registry.clone(),
            alerts.clone(),
            clock.clone(),
        )
        .with_interval(Duration::from_secs(1))
        .with_error_backoff(Duration::from_millis(10));

        Self {
            registry,
            book,
            alerts,
            clock,
            monitor,
            targets,
        }
    }

    pub fn health(&self, exchange: &str) -> ExchangeHealth {
        self.book.snapshot(exchange).unwrap()
    }

    pub fn count(&self, predicate: impl Fn(&AlertEvent) -> bool) -> usize {
        self.alerts.count_matching(predicate)
    }
}

pub fn disconnects(exchange: &'static str) -> impl Fn(&AlertEvent) -> bool {
    move |event| matches!(event, AlertEvent::ExchangeDisconnected { exchange: id, .. } if id == exchange)
}

pub fn reconnects(exchange: &'static str) -> impl Fn(&AlertEvent) -> bool {
    move |event| matches!(event, AlertEvent::ExchangeReconnected { exchange: id } if id == exchange)
}

pub fn degraded(exchange: &'static str) -> impl Fn(&AlertEvent) -> bool {
    move |event| matches!(event, AlertEvent::ExchangeDegraded { exchange: id, .. } if id == exchange)
}
