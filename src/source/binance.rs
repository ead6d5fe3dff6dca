//! Binance USDⓈ-M futures REST adapter.

use crate::error::{AppError, Result};
use crate::source::PriceSource;
use crate::types::{Kline, KlineInterval};
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Binance futures ticker price response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

/// Binance futures REST client.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
}

impl BinanceFuturesClient {
    /// Create a new client with a bounded per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent("vigil/0.1")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let ticker: TickerPrice = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        ticker
            .price
            .parse::<f64>()
            .map_err(|e| AppError::TransientSource(format!("bad price for {symbol}: {e}")))
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start: i64,
        end: i64,
        limit: u32,
    ) -> Result<Vec<Kline>> {
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let rows: Vec<Vec<Value>> = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.as_str().to_string()),
                ("startTime", start.to_string()),
                ("endTime", end.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut klines = Vec::with_capacity(rows.len());
        for row in rows {
            klines.push(parse_kline_row(&row)?);
        }
        debug!(symbol, count = klines.len(), "fetched klines");
        Ok(klines)
    }
}

/// Parse one kline row from Binance's mixed-type array format:
/// [openTime, open, high, low, close, volume, closeTime, ...].
fn parse_kline_row(row: &[Value]) -> Result<Kline> {
    if row.len() < 7 {
        return Err(AppError::TransientSource(format!(
            "kline row too short: {} fields",
            row.len()
        )));
    }
    Ok(Kline {
        open_time: as_i64(&row[0])?,
        open: as_f64(&row[1])?,
        high: as_f64(&row[2])?,
        low: as_f64(&row[3])?,
        close: as_f64(&row[4])?,
        volume: as_f64(&row[5])?,
        close_time: as_i64(&row[6])?,
    })
}

fn as_i64(v: &Value) -> Result<i64> {
    v.as_i64()
        .ok_or_else(|| AppError::TransientSource(format!("expected integer, got {v}")))
}

fn as_f64(v: &Value) -> Result<f64> {
    match v {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| AppError::TransientSource(format!("bad number {s}: {e}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AppError::TransientSource(format!("bad number {n}"))),
        other => Err(AppError::TransientSource(format!(
            "expected number, got {other}"
        ))),
    }
}

impl PriceSource for BinanceFuturesClient {
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<f64>> {
        Box::pin(self.fetch_price(symbol))
    }

    fn klines<'a>(
        &'a self,
        symbol: &'a str,
        interval: KlineInterval,
        start: i64,
        end: i64,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<Kline>>> {
        Box::pin(self.fetch_klines(symbol, interval, start, end, limit))
    }
}
