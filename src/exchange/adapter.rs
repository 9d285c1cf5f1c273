//! Boundary to a single exchange's API

use async_trait::async_trait;
use crate::{
    errors::SentinelResult,
    types::{Balance, Order, OrderBook, OrderRequest, Position, Ticker},
};

/// Operations the core needs from an exchange client.
///
/// Calls may hang; callers bound them with `tokio::time::timeout`.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn id(&self) -> &str;

    /// Establishes the session. A refused connection is an
    /// `ExchangeConnection` error.
    async fn connect(&self) -> SentinelResult<()>;

    /// Lightweight authenticated call used as the health probe.
    async fn fetch_balance(&self) -> SentinelResult<Balance>;

    async fn fetch_ticker(&self, symbol: &str) -> SentinelResult<Ticker>;

    async fn fetch_order_book(&self, symbol: &str, limit: Option<usize>) -> SentinelResult<OrderBook>;

    async fn fetch_positions(&self, symbols: Option<&[String]>) -> SentinelResult<Vec<Position>>;

    async fn create_order(&self, request: &OrderRequest) -> SentinelResult<Order>;

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> SentinelResult<Order>;

    async fn close(&self) -> SentinelResult<()> {
        Ok(())
    }
}
