//! Exchange Sentinel - Main Entry Point
//!
//! Runs the health monitor against simulated exchanges and reports breaker
//! and routing state until Ctrl+C.

use exchange_sentinel::*;
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};
use exchange_sentinel::{
    alerts::{FanoutAlertSink, MemoryAlertSink, ThrottledAlertSink, TracingAlertSink},
    config::DEFAULT_CONFIG_PATH,
    exchange::SimulatedExchange,
    storage::save_status_snapshot,
    utils::{print_status_report, setup_logging, setup_output_directories, SystemClock},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = env::var("SENTINEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Arc::new(
        Config::load(&config_path).with_context(|| format!("loading {}", config_path))?,
    );

    setup_output_directories(&config.logging)?;
    let _logging_guard = setup_logging(&config.logging)?;

    info!("🛡️  Exchange Sentinel v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Config file: {}", config_path);
    info!("   Routing mode: {}", config.strategy.mode);
    info!("   Health check interval: {}s", config.strategy.health_check_interval_secs);
    info!("   Latency threshold: {}ms", config.breakers.latency_threshold_ms);
    info!("   Breaker cooldown: {}s", config.breakers.cooldown_secs);
    info!("   Exchanges: {}", config.enabled_exchanges().map(|e| e.id.as_str()).collect::<Vec<_>>().join(", "));
    info!("   ⚠️  SIMULATION MODE - exchanges are in-process simulators");

    let history = Arc::new(MemoryAlertSink::new(config.alerts.history));
    let operator: Arc<dyn AlertSink> = Arc::new(ThrottledAlertSink::new(
        TracingAlertSink,
        config.alerts.min_level,
        Duration::from_secs(config.alerts.throttle_secs),
    ));
    let recorder: Arc<dyn AlertSink> = history.clone();
    let alerts: Arc<dyn AlertSink> = Arc::new(FanoutAlertSink::new(vec![operator, recorder]));
    let clock = Arc::new(SystemClock);
    let registry = Arc::new(CircuitBreakerRegistry::new(&config.breakers, alerts.clone(), clock.clone()));

    let adapters: Vec<Arc<dyn ExchangeAdapter>> = config
        .enabled_exchanges()
        .map(|settings| {
            Arc::new(SimulatedExchange::new(settings.id.clone(), settings.simulation.clone()))
                as Arc<dyn ExchangeAdapter>
        })
        .collect();

    let manager = ExchangeManager::initialize(config.clone(), adapters, registry, alerts, clock)
        .await?
        .with_alert_history(history);

    if manager.connected_exchanges().is_empty() {
        return Err(anyhow::anyhow!("No exchange could be connected"));
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let monitor_handle = tokio::spawn(manager.monitor().run(shutdown_rx));

    info!("\n🚀 Starting sentinel loop...\n");

    let mut report_interval = time::interval(Duration::from_secs(config.strategy.status_report_secs.max(1)));
    let symbols = manager.all_symbols();

    loop {
        tokio::select! {
            _ = report_interval.tick() => {
                report(&manager, &symbols);
            }
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("\n📛 Received shutdown signal (Ctrl+C)..."),
                    Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = monitor_handle.await {
        error!("Health monitor task ended abnormally: {}", e);
    }

    manager.shutdown().await;

    let status = manager.status();
    print_status_report(&status);
    match save_status_snapshot(&status) {
        Ok(path) => info!("💾 Final status written to {}", path.display()),
        Err(e) => error!("Failed to save final status: {}", e),
    }

    info!("👋 Sentinel stopped");
    Ok(())
}

fn report(manager: &ExchangeManager, symbols: &[String]) {
    let status = manager.status();
    print_status_report(&status);

    for symbol in symbols {
        match manager.select_exchange_id(symbol) {
            Some(exchange) => info!("🧭 {} -> {}", symbol, exchange),
            None => warn!("🧭 {} -> no eligible exchange, deferring", symbol),
        }
    }

    if !status.system_healthy {
        warn!(
            "⚠️ System below minimum healthy exchanges ({} < {})",
            status.healthy_exchanges.len(),
            manager.config().strategy.min_healthy_exchanges
        );
    }

    if let Err(e) = save_status_snapshot(&status) {
        error!("Failed to save status snapshot: {}", e);
    }
}
