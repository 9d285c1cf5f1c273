mod common;

use common::*;
use exchange_sentinel::{
    alerts::AlertEvent,
    breaker::MetricKind,
    config::BreakerSettings,
    errors::SentinelError,
    health::ProbeOutcome,
};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::oneshot;

fn lenient() -> BreakerSettings {
    BreakerSettings {
        error_rate_threshold: 1.0,
        ..BreakerSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_disconnects_once() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Hang, Step::Hang]);
    let harness = Harness::new(&[x.clone()], lenient());

    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);

    let health = harness.health("x");
    assert!(!health.connected);
    assert_eq!(health.error_count, 1);
    assert!((health.success_rate - 0.8).abs() < 1e-9);
    assert_eq!(harness.count(disconnects("x")), 1);

    harness.monitor.run_cycle().await.unwrap();
    let health = harness.health("x");
    assert_eq!(health.error_count, 2);
    assert_eq!(harness.count(disconnects("x")), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_is_reported_in_disconnect_detail() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Hang]);
    let harness = Harness::new(&[x.clone()], lenient());

    harness.monitor.run_cycle().await.unwrap();

    let events = harness.alerts.events();
    let detail = events
        .iter()
        .find_map(|event| match event {
            AlertEvent::ExchangeDisconnected { error, .. } => Some(error.clone()),
            _ => None,
        })
        .unwrap();
    assert!(detail.contains("timed out"), "detail was {}", detail);
}

#[tokio::test(start_paused = true)]
async fn recovery_crossing_half_fires_reconnect_once() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Fail, Step::Fail, Step::Fail]);
    let harness = Harness::new(&[x.clone()], lenient());

    for _ in 0..3 {
        harness.monitor.run_cycle().await.unwrap();
    }
    let health = harness.health("x");
    assert!(health.success_rate < 0.5);
    assert_eq!(harness.count(reconnects("x")), 0);

    harness.monitor.run_cycle().await.unwrap();
    let health = harness.health("x");
    assert!(health.connected);
    assert!(health.success_rate >= 0.5);
    assert_eq!(health.error_count, 2);
    assert_eq!(harness.count(reconnects("x")), 1);

    harness.monitor.run_cycle().await.unwrap();
    assert_eq!(harness.count(reconnects("x")), 1);
    assert_eq!(harness.count(disconnects("x")), 1);
}

#[tokio::test(start_paused = true)]
async fn success_after_single_failure_reconnects_without_alert() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Fail]);
    let harness = Harness::new(&[x.clone()], lenient());

    harness.monitor.run_cycle().await.unwrap();
    harness.monitor.run_cycle().await.unwrap();

    let health = harness.health("x");
    assert!(health.connected);
    assert_eq!(health.error_count, 0);
    assert!((health.success_rate - 0.9).abs() < 1e-9);
    assert_eq!(harness.count(reconnects("x")), 0);
}

#[tokio::test(start_paused = true)]
async fn sustained_latency_degrades_exchange() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Respond { delay_ms: 900 }; 3]);
    let harness = Harness::build(&[x.clone()], lenient(), |t| t.with_timeout(Duration::from_secs(5)));

    for _ in 0..2 {
        let report = harness.monitor.run_cycle().await.unwrap();
        assert_eq!(report.healthy, 1);
    }
    assert!(harness.health("x").connected);
    assert!(harness.health("x").latency_ms >= 900.0);

    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.degraded, 1);
    assert!(!harness.health("x").connected);
    assert!(harness.registry.is_open(MetricKind::Latency, Some("x")));
    assert_eq!(harness.count(degraded("x")), 1);
    assert_eq!(
        harness.count(|e| matches!(e, AlertEvent::BreakerOpened { name, .. } if name == "Global Latency")),
        1
    );

    // Latched: fast responses do not restore the exchange before cooldown.
    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.degraded, 1);
    assert_eq!(harness.count(degraded("x")), 2);

    harness.clock.advance_secs(300);
    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.healthy, 1);
    assert!(harness.health("x").connected);
    assert!(!harness.registry.is_open(MetricKind::Latency, Some("x")));
}

#[tokio::test(start_paused = true)]
async fn rising_error_rate_opens_breaker() {
    let x = ScriptedExchange::new("x");
    x.script([Step::Fail; 4]);
    let harness = Harness::new(&[x.clone()], BreakerSettings::default());

    // 1/11, 2/12, 3/13, 4/14: the last three exceed 0.1.
    for _ in 0..4 {
        harness.monitor.run_cycle().await.unwrap();
    }
    assert!(harness.registry.is_open(MetricKind::ErrorRate, None));
}

#[tokio::test(start_paused = true)]
async fn one_slow_exchange_does_not_block_others() {
    let slow = ScriptedExchange::new("slow");
    let fast = ScriptedExchange::new("fast");
    slow.script([Step::Hang]);
    fast.script([Step::Respond { delay_ms: 5 }]);
    let harness = Harness::new(&[slow.clone(), fast.clone()], lenient());

    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.healthy, 1);
    assert_eq!(report.probed(), 2);
    assert!(harness.health("fast").connected);
    assert!(!harness.health("slow").connected);
}

#[tokio::test(start_paused = true)]
async fn panicking_probe_becomes_monitor_error() {
    let bad = ScriptedExchange::new("bad");
    let good = ScriptedExchange::new("good");
    bad.script([Step::Panic]);
    let harness = Harness::new(&[bad.clone(), good.clone()], lenient());

    let result = harness.monitor.run_cycle().await;
    assert!(matches!(result, Err(SentinelError::Monitor { .. })));
    assert!(harness.health("good").connected);

    let report = harness.monitor.run_cycle().await.unwrap();
    assert_eq!(report.healthy, 2);
}

#[tokio::test(start_paused = true)]
async fn watch_symbol_feeds_spread_breaker() {
    let x = ScriptedExchange::new("x");
    // 200 / 10000 = 200 bps, far above the 20 bps threshold.
    x.set_quote(dec!(9900), dec!(10100));
    let harness = Harness::build(&[x.clone()], lenient(), |t| t.watching("BTC/USDT"));

    for _ in 0..3 {
        harness.monitor.run_cycle().await.unwrap();
    }
    let snapshot = harness.registry.snapshot(MetricKind::Spread, None).unwrap();
    assert!(snapshot.is_open);
    assert_eq!(snapshot.metadata.last_trigger_value, Some(200.0));
    assert!(harness.health("x").connected);
}

#[tokio::test(start_paused = true)]
async fn run_loop_survives_errors_and_stops_on_signal() {
    let bad = ScriptedExchange::new("bad");
    bad.script([Step::Panic, Step::Fail]);
    let harness = Harness::new(&[bad.clone()], lenient());

    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(harness.monitor.clone().run(rx));

    tokio::time::sleep(Duration::from_secs(3)).await;
    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    // Panic cycle, failing cycle, then at least one healthy cycle.
    let health = harness.health("bad");
    assert!(health.connected);
    assert_eq!(harness.count(disconnects("bad")), 1);
}
