//! External market-data read contract.

pub mod binance;

pub use binance::BinanceFuturesClient;

use crate::error::Result;
use crate::types::{Kline, KlineInterval};
use futures_util::future::BoxFuture;

/// Read-only price and kline source the tracker consumes. Every call
/// carries a bounded timeout inside the implementation; failures map to
/// `AppError::TransientSource` and are retried on the next scheduled
/// tick.
pub trait PriceSource: Send + Sync {
    /// Latest traded price for a symbol.
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<f64>>;

    /// OHLCV bars for a symbol over `[start, end)`, ordered by open time
    /// ascending, at most `limit` bars.
    fn klines<'a>(
        &'a self,
        symbol: &'a str,
        interval: KlineInterval,
        start: i64,
        end: i64,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<Kline>>>;
}
