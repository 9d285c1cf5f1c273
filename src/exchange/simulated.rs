//! In-process exchange with synthetic latency, failures and prices

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;
use crate::{
    errors::{SentinelError, SentinelResult},
    types::{
        Balance, Order, OrderBook, OrderRequest, OrderSide, OrderStatus, OrderType, Position,
        PriceLevel, Ticker,
    },
};
use super::ExchangeAdapter;

const DEFAULT_BOOK_DEPTH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationProfile {
    pub base_latency_ms: u64,
    pub jitter_ms: u64,
    /// Probability in [0, 1] that any call fails.
    pub failure_rate: f64,
    pub mid_price: f64,
    pub spread_bps: f64,
    /// Largest relative move per ticker step.
    pub price_step: f64,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            base_latency_ms: 40,
            jitter_ms: 30,
            failure_rate: 0.02,
            mid_price: 65_000.0,
            spread_bps: 4.0,
            price_step: 0.001,
        }
    }
}

#[derive(Debug)]
struct SimState {
    connected: bool,
    mid: f64,
    orders: BTreeMap<String, Order>,
}

pub struct SimulatedExchange {
    id: String,
    profile: SimulationProfile,
    state: Mutex<SimState>,
}

impl SimulatedExchange {
    pub fn new(id: impl Into<String>, profile: SimulationProfile) -> Self {
        let mid = profile.mid_price;
        Self {
            id: id.into(),
            profile,
            state: Mutex::new(SimState {
                connected: false,
                mid,
                orders: BTreeMap::new(),
            }),
        }
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.profile
    }

    pub fn open_orders(&self) -> usize {
        self.state
            .lock()
            .orders
            .values()
            .filter(|order| order.status == OrderStatus::Open)
            .count()
    }

    /// Sleeps for the simulated round trip, then fails with the configured
    /// probability.
    async fn round_trip(&self, operation: &str) -> SentinelResult<()> {
        let jitter = (self.profile.jitter_ms as f64 * rand::random::<f64>()) as u64;
        tokio::time::sleep(Duration::from_millis(self.profile.base_latency_ms + jitter)).await;

        if !self.state.lock().connected {
            return Err(SentinelError::connection(&self.id, "not connected"));
        }
        if rand::random::<f64>() < self.profile.failure_rate {
            debug!("🎭 Simulated {} failure on {}", operation, self.id);
            return Err(SentinelError::connection(
                &self.id,
                format!("simulated {} failure", operation),
            ));
        }
        Ok(())
    }

    /// Random walk step on the mid price.
    fn step_mid(&self) -> f64 {
        let mut state = self.state.lock();
        let shock = (rand::random::<f64>() - 0.5) * 2.0 * self.profile.price_step;
        state.mid = (state.mid * (1.0 + shock)).max(f64::EPSILON);
        state.mid
    }

    fn quote(&self, mid: f64) -> (Decimal, Decimal) {
        let half_spread = mid * self.profile.spread_bps / 20_000.0;
        let bid = Decimal::from_f64(mid - half_spread).unwrap_or_default().round_dp(2);
        let ask = Decimal::from_f64(mid + half_spread).unwrap_or_default().round_dp(2);
        (bid, ask)
    }

    fn validate(&self, request: &OrderRequest) -> SentinelResult<()> {
        if request.amount <= Decimal::ZERO {
            return Err(SentinelError::InvalidOrder {
                exchange: self.id.clone(),
                reason: format!("amount must be positive, got {}", request.amount),
            });
        }
        if request.order_type == OrderType::Limit
            && !request.price.is_some_and(|price| price > Decimal::ZERO)
        {
            return Err(SentinelError::InvalidOrder {
                exchange: self.id.clone(),
                reason: "limit order requires a positive price".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> SentinelResult<()> {
        tokio::time::sleep(Duration::from_millis(self.profile.base_latency_ms)).await;
        if rand::random::<f64>() < self.profile.failure_rate {
            return Err(SentinelError::connection(&self.id, "simulated handshake failure"));
        }
        self.state.lock().connected = true;
        info!("🎭 Simulated exchange {} connected", self.id);
        Ok(())
    }

    async fn fetch_balance(&self) -> SentinelResult<Balance> {
        self.round_trip("balance").await?;

        let mut balance = Balance {
            timestamp: Some(Utc::now()),
            ..Balance::default()
        };
        balance.free.insert("USDT".to_string(), dec!(10000));
        balance.free.insert("BTC".to_string(), dec!(0.5));
        Ok(balance)
    }

    async fn fetch_ticker(&self, symbol: &str) -> SentinelResult<Ticker> {
        self.round_trip("ticker").await?;

        let mid = self.step_mid();
        let (bid, ask) = self.quote(mid);
        Ok(Ticker {
            symbol: symbol.to_string(),
            bid,
            ask,
            last: ((bid + ask) / Decimal::TWO).round_dp(2),
            timestamp: Utc::now(),
        })
    }

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> SentinelResult<OrderBook> {
        self.round_trip("order book").await?;

        let depth = limit.unwrap_or(DEFAULT_BOOK_DEPTH);
        let mid = self.state.lock().mid;
        let (bid, ask) = self.quote(mid);
        let tick = dec!(0.5);

        let level = |price: Decimal, i: usize| PriceLevel {
            price,
            amount: (dec!(0.1) * Decimal::from(i + 1)).round_dp(4),
        };
        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: (0..depth).map(|i| level(bid - tick * Decimal::from(i), i)).collect(),
            asks: (0..depth).map(|i| level(ask + tick * Decimal::from(i), i)).collect(),
            timestamp: Utc::now(),
        })
    }

    async fn fetch_positions(&self, symbols: Option<&[String]>) -> SentinelResult<Vec<Position>> {
        self.round_trip("positions").await?;

        let mid = Decimal::from_f64(self.state.lock().mid).unwrap_or_default();
        let state = self.state.lock();
        let positions = state
            .orders
            .values()
            .filter(|order| order.status == OrderStatus::Filled)
            .filter(|order| symbols.is_none_or(|wanted| wanted.contains(&order.symbol)))
            .map(|order| {
                let entry = order.price.unwrap_or(mid);
                let direction = match order.side {
                    OrderSide::Buy => Decimal::ONE,
                    OrderSide::Sell => Decimal::NEGATIVE_ONE,
                };
                Position {
                    symbol: order.symbol.clone(),
                    side: order.side,
                    size: order.amount,
                    entry_price: entry,
                    unrealized_pnl: ((mid - entry) * order.amount * direction).round_dp(2),
                }
            })
            .collect();
        Ok(positions)
    }

    async fn create_order(&self, request: &OrderRequest) -> SentinelResult<Order> {
        self.validate(request)?;
        self.round_trip("create order").await?;

        let status = match request.order_type {
            OrderType::Market => OrderStatus::Filled,
            OrderType::Limit => OrderStatus::Open,
        };
        let order = Order {
            id: Uuid::new_v4().to_string(),
            symbol: request.symbol.clone(),
            order_type: request.order_type,
            side: request.side,
            amount: request.amount,
            price: request.price,
            status,
            timestamp: Utc::now(),
        };

        self.state.lock().orders.insert(order.id.clone(), order.clone());
        info!(
            exchange = %self.id,
            order_id = %order.id,
            side = %order.side,
            amount = %order.amount,
            "🎭 Simulated order placed"
        );
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> SentinelResult<Order> {
        self.round_trip("cancel order").await?;

        let mut state = self.state.lock();
        match state.orders.get_mut(order_id) {
            Some(order) if order.symbol == symbol && order.status == OrderStatus::Open => {
                order.status = OrderStatus::Canceled;
                Ok(order.clone())
            }
            Some(order) => Err(SentinelError::InvalidOrder {
                exchange: self.id.clone(),
                reason: format!("order {} is {:?} on {}", order_id, order.status, order.symbol),
            }),
            None => Err(SentinelError::InvalidOrder {
                exchange: self.id.clone(),
                reason: format!("unknown order {}", order_id),
            }),
        }
    }

    async fn close(&self) -> SentinelResult<()> {
        self.state.lock().connected = false;
        info!("🎭 Simulated exchange {} closed", self.id);
        Ok(())
    }
}
