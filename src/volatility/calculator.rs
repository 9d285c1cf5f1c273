//! Rolling price volatility over a time window

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use tracing::warn;

/// Samples required before a volatility figure is reported.
pub const MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone)]
pub struct VolatilityCalculator {
    window: VecDeque<(DateTime<Utc>, f64)>,
    max_age: TimeDelta,
}

impl VolatilityCalculator {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: VecDeque::new(),
            max_age: TimeDelta::seconds(window_secs),
        }
    }

    pub fn add_price(&mut self, price: f64, at: DateTime<Utc>) {
        if !price.is_finite() || price <= 0.0 {
            warn!("Ignoring unusable price sample: {}", price);
            return;
        }

        if let Some((last, _)) = self.window.back() {
            if at < *last {
                warn!("Dropping out-of-order price sample at {}", at);
                return;
            }
        }

        self.window.push_back((at, price));
        while let Some((timestamp, _)) = self.window.front() {
            if at - *timestamp > self.max_age {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Population standard deviation of the windowed prices.
    pub fn std_dev(&self) -> Option<f64> {
        if self.window.len() < MIN_SAMPLES {
            return None;
        }

        let mean = self.mean();
        let variance = self
            .window
            .iter()
            .map(|(_, price)| (price - mean).powi(2))
            .sum::<f64>()
            / self.window.len() as f64;

        Some(variance.sqrt())
    }

    /// Standard deviation relative to the mean, as a fraction (0.05 = 5%).
    pub fn relative_volatility(&self) -> Option<f64> {
        let std_dev = self.std_dev()?;
        let mean = self.mean();
        (mean > 0.0).then(|| std_dev / mean)
    }

    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    fn mean(&self) -> f64 {
        self.window.iter().map(|(_, price)| *price).sum::<f64>() / self.window.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_minimum_samples() {
        let start = Utc::now();
        let mut calc = VolatilityCalculator::new(300);
        for i in 0..(MIN_SAMPLES - 1) {
            calc.add_price(100.0, start + TimeDelta::seconds(i as i64));
        }
        assert_eq!(calc.relative_volatility(), None);

        calc.add_price(100.0, start + TimeDelta::seconds(20));
        assert_eq!(calc.relative_volatility(), Some(0.0));
    }

    #[test]
    fn alternating_prices() {
        let start = Utc::now();
        let mut calc = VolatilityCalculator::new(300);
        for i in 0..10 {
            let price = if i % 2 == 0 { 90.0 } else { 110.0 };
            calc.add_price(price, start + TimeDelta::seconds(i));
        }
        let vol = calc.relative_volatility().unwrap();
        assert!((vol - 0.1).abs() < 1e-9);
    }

    #[test]
    fn evicts_old_samples() {
        let start = Utc::now();
        let mut calc = VolatilityCalculator::new(60);
        for i in 0..5 {
            calc.add_price(100.0, start + TimeDelta::seconds(i));
        }
        calc.add_price(101.0, start + TimeDelta::seconds(120));
        assert_eq!(calc.sample_count(), 1);
    }

    #[test]
    fn rejects_bad_samples() {
        let start = Utc::now();
        let mut calc = VolatilityCalculator::new(60);
        calc.add_price(f64::NAN, start);
        calc.add_price(-1.0, start);
        calc.add_price(100.0, start + TimeDelta::seconds(5));
        calc.add_price(100.0, start);
        assert_eq!(calc.sample_count(), 1);
    }
}
