//! Owns the connected exchanges, their health and routing

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time;
use tracing::{error, info, warn};
use crate::{
    alerts::{AlertSink, MemoryAlertSink},
    breaker::CircuitBreakerRegistry,
    config::{Config, ExchangeSettings},
    errors::{SentinelError, SentinelResult},
    health::{ExchangeHealth, HealthBook, HealthMonitor, ProbeTarget},
    network::{retry_with_backoff, RetryConfig},
    routing::Router,
    types::SystemStatus,
    utils::Clock,
};
use super::ExchangeAdapter;

pub struct ExchangeManager {
    config: Arc<Config>,
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    book: Arc<HealthBook>,
    registry: Arc<CircuitBreakerRegistry>,
    router: Router,
    monitor: HealthMonitor,
    clock: Arc<dyn Clock>,
    history: Option<Arc<MemoryAlertSink>>,
}

impl ExchangeManager {
    pub async fn initialize(
        config: Arc<Config>,
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        registry: Arc<CircuitBreakerRegistry>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> SentinelResult<Self> {
        Self::initialize_with_retry(config, adapters, registry, alerts, clock, &RetryConfig::default())
            .await
    }

    /// Connects every enabled exchange in configuration order. Exchanges
    /// that cannot be connected are logged and left out; they are not
    /// monitored or routed to.
    pub async fn initialize_with_retry(
        config: Arc<Config>,
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        registry: Arc<CircuitBreakerRegistry>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        retry: &RetryConfig,
    ) -> SentinelResult<Self> {
        let mut book = HealthBook::new();
        let mut connected = Vec::new();
        let mut targets = Vec::new();

        for settings in config.enabled_exchanges() {
            let Some(adapter) = adapters.iter().find(|a| a.id() == settings.id).cloned() else {
                warn!("No adapter available for enabled exchange {}", settings.id);
                continue;
            };

            if let Err(e) = Self::connect(&adapter, settings, retry).await {
                error!("❌ Failed to initialize {}: {}", settings.id, e);
                continue;
            }

            book.insert(ExchangeHealth::new(
                settings.id.clone(),
                settings.rate_limit,
                settings.features.clone(),
                clock.now(),
            ));

            if let Some(overrides) = &settings.breakers {
                let cooldown = overrides.cooldown_secs.unwrap_or(config.breakers.cooldown_secs);
                for (kind, threshold) in overrides.thresholds() {
                    registry.create_exchange_breaker(&settings.id, kind, threshold, cooldown);
                }
            }

            let mut target = ProbeTarget::new(adapter.clone()).with_timeout(settings.probe_timeout());
            if let Some(symbol) = &settings.watch_symbol {
                target = target.watching(symbol.clone());
            }
            targets.push(target);
            connected.push(adapter);

            info!("✅ Initialized {}", settings.id);
        }

        if connected.len() < config.strategy.min_healthy_exchanges {
            warn!(
                "⚠️ Only {} exchange(s) connected, minimum healthy is {}",
                connected.len(),
                config.strategy.min_healthy_exchanges
            );
        }

        let book = Arc::new(book);
        let monitor = HealthMonitor::new(targets, book.clone(), registry.clone(), alerts, clock.clone())
            .with_interval(config.strategy.health_check_interval())
            .with_error_backoff(config.strategy.error_backoff());

        Ok(Self {
            router: Router::from_config(&config),
            config,
            adapters: connected,
            book,
            registry,
            monitor,
            clock,
            history: None,
        })
    }

    async fn connect(
        adapter: &Arc<dyn ExchangeAdapter>,
        settings: &ExchangeSettings,
        retry: &RetryConfig,
    ) -> SentinelResult<()> {
        let timeout = settings.probe_timeout();
        retry_with_backoff(
            || {
                let adapter = adapter.clone();
                async move {
                    match time::timeout(timeout, adapter.connect()).await {
                        Ok(result) => result,
                        Err(_) => Err(SentinelError::Timeout {
                            exchange: adapter.id().to_string(),
                            timeout,
                        }),
                    }
                }
            },
            retry,
            &format!("connect {}", settings.id),
        )
        .await
    }

    /// Attaches the alert history reported in [`status`](Self::status).
    pub fn with_alert_history(mut self, history: Arc<MemoryAlertSink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn select_exchange_id(&self, symbol: &str) -> Option<String> {
        self.router.select_exchange(symbol, &self.book)
    }

    pub fn select_exchange(&self, symbol: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        let id = self.select_exchange_id(symbol)?;
        self.adapter(&id)
    }

    pub fn adapter(&self, exchange: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.iter().find(|a| a.id() == exchange).cloned()
    }

    pub fn connected_exchanges(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.id().to_string()).collect()
    }

    /// Connected exchanges with a success rate above one half.
    pub fn healthy_exchanges(&self) -> Vec<String> {
        self.book.healthy_ids()
    }

    pub fn is_system_healthy(&self) -> bool {
        self.healthy_exchanges().len() >= self.config.strategy.min_healthy_exchanges
    }

    pub fn symbols_for_exchange(&self, exchange: &str) -> Vec<String> {
        self.config
            .exchange(exchange)
            .map(|settings| settings.symbols.clone())
            .unwrap_or_default()
    }

    /// Every configured symbol across enabled exchanges, deduplicated and sorted.
    pub fn all_symbols(&self) -> Vec<String> {
        self.config
            .enabled_exchanges()
            .flat_map(|settings| settings.symbols.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn exchange_health(&self) -> Vec<ExchangeHealth> {
        self.book.snapshots()
    }

    pub fn status(&self) -> SystemStatus {
        let open_breakers = self.registry.open_breakers();
        SystemStatus {
            generated_at: self.clock.now(),
            routing_mode: self.router.mode(),
            breakers: self.registry.status(),
            open_breaker_count: open_breakers.len(),
            open_breakers,
            exchanges: self.book.snapshots(),
            healthy_exchanges: self.healthy_exchanges(),
            system_healthy: self.is_system_healthy(),
            recent_alerts: self
                .history
                .as_ref()
                .map(|history| history.events())
                .unwrap_or_default(),
        }
    }

    /// Monitor sharing this manager's health book and registry.
    pub fn monitor(&self) -> HealthMonitor {
        self.monitor.clone()
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthBook> {
        &self.book
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes every connected adapter. Errors are logged, not returned.
    pub async fn shutdown(&self) {
        for adapter in &self.adapters {
            match adapter.close().await {
                Ok(()) => info!("Closed {}", adapter.id()),
                Err(e) => error!("Error closing {}: {}", adapter.id(), e),
            }
        }
    }
}
