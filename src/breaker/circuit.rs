//! Circuit breaker for a single risk metric in a single scope

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use crate::alerts::AlertSink;
use super::{BreakerScope, MetricKind};

pub const DEFAULT_MAX_CONSECUTIVE: u32 = 3;

/// Cooldown as a [`TimeDelta`], or `None` when `secs` does not fit in one.
pub fn cooldown_delta(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakerMetadata {
    pub last_trigger_value: Option<f64>,
    pub last_opened: Option<DateTime<Utc>>,
    pub last_closed: Option<DateTime<Utc>>,
    pub last_duration_secs: Option<f64>,
}

/// Point-in-time view of a breaker for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub metric: MetricKind,
    pub scope: BreakerScope,
    pub is_open: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub consecutive_violations: u32,
    pub max_consecutive: u32,
    pub threshold: f64,
    pub cooldown_secs: u64,
    pub metadata: BreakerMetadata,
}

/// Latching fault detector.
///
/// Violations (samples strictly above `threshold`) add one to the streak,
/// good samples take one away, so a lone good reading does not wipe out a
/// sustained degradation. Once the streak reaches `max_consecutive` the
/// breaker opens and stays open until `cooldown_secs` have passed and it
/// is closed, or until it is force-closed.
///
/// Invariant: `is_open` iff `opened_at` is set.
pub struct CircuitBreaker {
    name: String,
    kind: MetricKind,
    scope: BreakerScope,
    threshold: f64,
    cooldown_secs: u64,
    max_consecutive: u32,
    is_open: bool,
    opened_at: Option<DateTime<Utc>>,
    trigger_count: u64,
    consecutive_violations: u32,
    metadata: BreakerMetadata,
    alerts: Arc<dyn AlertSink>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        scope: BreakerScope,
        threshold: f64,
        cooldown_secs: u64,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
            threshold,
            cooldown_secs,
            max_consecutive: DEFAULT_MAX_CONSECUTIVE,
            is_open: false,
            opened_at: None,
            trigger_count: 0,
            consecutive_violations: 0,
            metadata: BreakerMetadata::default(),
            alerts,
        }
    }

    pub fn with_max_consecutive(mut self, max_consecutive: u32) -> Self {
        self.max_consecutive = max_consecutive.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn scope(&self) -> &BreakerScope {
        &self.scope
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn consecutive_violations(&self) -> u32 {
        self.consecutive_violations
    }

    pub fn metadata(&self) -> &BreakerMetadata {
        &self.metadata
    }

    /// Feed one sample. Returns true when the violation streak has reached
    /// the trip level; the caller decides whether to `open`.
    pub fn evaluate(&mut self, value: f64) -> bool {
        if value > self.threshold {
            self.consecutive_violations += 1;
        } else {
            self.consecutive_violations = self.consecutive_violations.saturating_sub(1);
        }

        self.consecutive_violations >= self.max_consecutive
    }

    /// Returns false (and notifies nobody) if already open.
    pub fn open(&mut self, trigger_value: f64, now: DateTime<Utc>) -> bool {
        if self.is_open {
            return false;
        }

        self.is_open = true;
        self.opened_at = Some(now);
        self.trigger_count += 1;
        self.metadata.last_trigger_value = Some(trigger_value);
        self.metadata.last_opened = Some(now);

        debug!(
            breaker = %self.name,
            metric = %self.kind,
            scope = %self.scope,
            trigger_value,
            threshold = self.threshold,
            trigger_count = self.trigger_count,
            "Breaker transitioned to open"
        );

        self.alerts
            .breaker_opened(&self.name, &self.scope, trigger_value, self.threshold);
        true
    }

    pub fn can_close(&self, now: DateTime<Utc>) -> bool {
        match (self.is_open, self.opened_at) {
            (true, Some(opened_at)) => now - opened_at >= self.cooldown(),
            _ => false,
        }
    }

    /// Time left before the cooldown allows closing, if open.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let opened_at = self.opened_at?;
        let remaining = match self.cooldown().checked_sub(&(now - opened_at)) {
            Some(remaining) => remaining.to_std().unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        };
        Some(remaining)
    }

    /// Returns false (and notifies nobody) if already closed.
    pub fn close(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_open {
            return false;
        }

        let duration_secs = self
            .opened_at
            .map(|opened_at| (now - opened_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        self.is_open = false;
        self.opened_at = None;
        self.consecutive_violations = 0;
        self.metadata.last_closed = Some(now);
        self.metadata.last_duration_secs = Some(duration_secs);

        debug!(
            breaker = %self.name,
            scope = %self.scope,
            duration_secs,
            "Breaker transitioned to closed"
        );

        self.alerts
            .breaker_closed(&self.name, &self.scope, duration_secs);
        true
    }

    /// Emergency override: closes regardless of the cooldown.
    pub fn force_close(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_open {
            warn!("⚠️ Force closing circuit breaker: {}", self.name);
        }
        self.close(now)
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            name: self.name.clone(),
            metric: self.kind,
            scope: self.scope.clone(),
            is_open: self.is_open,
            opened_at: self.opened_at,
            trigger_count: self.trigger_count,
            consecutive_violations: self.consecutive_violations,
            max_consecutive: self.max_consecutive,
            threshold: self.threshold,
            cooldown_secs: self.cooldown_secs,
            metadata: self.metadata.clone(),
        }
    }

    fn cooldown(&self) -> TimeDelta {
        cooldown_delta(self.cooldown_secs).unwrap_or(TimeDelta::MAX)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("threshold", &self.threshold)
            .field("is_open", &self.is_open)
            .field("opened_at", &self.opened_at)
            .field("trigger_count", &self.trigger_count)
            .field("consecutive_violations", &self.consecutive_violations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertEvent, MemoryAlertSink};

    fn breaker(alerts: Arc<MemoryAlertSink>) -> CircuitBreaker {
        CircuitBreaker::new(
            "Global Latency",
            MetricKind::Latency,
            BreakerScope::Global,
            500.0,
            300,
            alerts,
        )
    }

    #[test]
    fn good_sample_only_decays_streak_by_one() {
        let mut cb = breaker(Arc::new(MemoryAlertSink::default()));
        assert!(!cb.evaluate(600.0));
        assert!(!cb.evaluate(600.0));
        assert!(!cb.evaluate(100.0));
        assert_eq!(cb.consecutive_violations(), 1);
        assert!(!cb.evaluate(600.0));
        assert!(cb.evaluate(600.0));
    }

    #[test]
    fn value_equal_to_threshold_is_not_a_violation() {
        let mut cb = breaker(Arc::new(MemoryAlertSink::default()));
        for _ in 0..5 {
            assert!(!cb.evaluate(500.0));
        }
        assert_eq!(cb.consecutive_violations(), 0);
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let alerts = Arc::new(MemoryAlertSink::default());
        let mut cb = breaker(alerts.clone());
        let now = Utc::now();

        assert!(!cb.close(now));
        assert!(alerts.is_empty());

        assert!(cb.open(900.0, now));
        assert!(!cb.open(950.0, now));
        assert_eq!(cb.trigger_count(), 1);
        assert_eq!(cb.metadata().last_trigger_value, Some(900.0));
        assert_eq!(alerts.len(), 1);

        assert!(cb.force_close(now));
        assert!(!cb.close(now));
        assert_eq!(alerts.len(), 2);
        assert!(cb.opened_at().is_none());
        assert_eq!(cb.consecutive_violations(), 0);
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut cb = breaker(Arc::new(MemoryAlertSink::default()));
        let opened = Utc::now();
        cb.open(900.0, opened);

        assert!(!cb.can_close(opened + TimeDelta::seconds(299)));
        assert!(cb.can_close(opened + TimeDelta::seconds(300)));
        assert_eq!(
            cb.cooldown_remaining(opened + TimeDelta::seconds(100)),
            Some(Duration::from_secs(200))
        );
    }

    #[test]
    fn oversized_cooldown_saturates() {
        let mut cb = CircuitBreaker::new(
            "Global Latency",
            MetricKind::Latency,
            BreakerScope::Global,
            500.0,
            10_000_000_000_000_000,
            Arc::new(MemoryAlertSink::default()),
        );
        let opened = Utc::now();
        cb.open(900.0, opened);

        assert!(!cb.can_close(opened + TimeDelta::days(365 * 100)));
        assert!(cb.cooldown_remaining(opened).is_some());
        assert!(cb.cooldown_remaining(opened - TimeDelta::seconds(1)).is_some());
        assert!(cooldown_delta(u64::MAX).is_none());
        assert_eq!(cooldown_delta(300), Some(TimeDelta::seconds(300)));
    }

    #[test]
    fn close_records_duration() {
        let alerts = Arc::new(MemoryAlertSink::default());
        let mut cb = breaker(alerts.clone());
        let opened = Utc::now();
        cb.open(900.0, opened);
        cb.close(opened + TimeDelta::seconds(320));

        assert_eq!(cb.metadata().last_duration_secs, Some(320.0));
        let events = alerts.events();
        assert!(matches!(
            &events[1],
            AlertEvent::BreakerClosed { duration_secs, .. } if *duration_secs == 320.0
        ));
    }
}
