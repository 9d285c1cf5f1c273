//! Risk metrics a breaker can watch, and the scope it applies to

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use crate::errors::SentinelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Latency,
    Spread,
    Volatility,
    ErrorRate,
    Drawdown,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Latency,
        MetricKind::Spread,
        MetricKind::Volatility,
        MetricKind::ErrorRate,
        MetricKind::Drawdown,
    ];

    /// Registry key, also the name used in status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Latency => "latency",
            MetricKind::Spread => "spread",
            MetricKind::Volatility => "volatility",
            MetricKind::ErrorRate => "error_rate",
            MetricKind::Drawdown => "drawdown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Latency => "Latency",
            MetricKind::Spread => "Spread",
            MetricKind::Volatility => "Volatility",
            MetricKind::ErrorRate => "Error Rate",
            MetricKind::Drawdown => "Drawdown",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SentinelError::UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BreakerScope {
    Global,
    Exchange(String),
}

impl BreakerScope {
    pub fn exchange(&self) -> Option<&str> {
        match self {
            BreakerScope::Global => None,
            BreakerScope::Exchange(id) => Some(id),
        }
    }
}

impl fmt::Display for BreakerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerScope::Global => f.write_str("global"),
            BreakerScope::Exchange(id) => f.write_str(id),
        }
    }
}

impl Serialize for BreakerScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
