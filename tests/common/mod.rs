#![allow(dead_code)]

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vigil::error::{AppError, Result};
use vigil::source::PriceSource;
use vigil::store::SignalRepository;
use vigil::store::SqliteStore;
use vigil::types::{Kline, KlineInterval, MarketContext, Signal, SignalDirection, SignalStatus};

pub const HOUR_MS: i64 = 3_600_000;

/// In-memory store for tests.
pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new_in_memory().expect("in-memory store"))
}

/// Build a signal in a given status with its lifecycle timestamps set
/// consistently, and persist it.
pub fn seed_signal(
    store: &Arc<SqliteStore>,
    symbol: &str,
    direction: SignalDirection,
    strategy: &str,
    price: f64,
    status: SignalStatus,
    generated_at: i64,
) -> Signal {
    let mut signal = Signal::new(symbol, direction, strategy, price);
    signal.generated_at = generated_at;
    signal.status = status;
    signal.context = MarketContext {
        funding_rate: Some(0.0001),
        ..Default::default()
    };
    match status {
        SignalStatus::Pending | SignalStatus::Invalidated => {}
        SignalStatus::Confirmed | SignalStatus::Tracking => {
            signal.confirmed_at = Some(generated_at + HOUR_MS);
        }
        SignalStatus::Closed => {
            signal.confirmed_at = Some(generated_at + HOUR_MS);
            signal.closed_at = Some(generated_at + 10 * HOUR_MS);
        }
    }
    store.insert_signal(&signal).expect("insert signal");
    signal
}

/// Programmable price source: fixed prices and kline sets per symbol,
/// with optional per-symbol failure injection.
#[derive(Default)]
pub struct MockPriceSource {
    prices: Mutex<HashMap<String, f64>>,
    klines: Mutex<HashMap<String, Vec<Kline>>>,
    failing: Mutex<HashMap<String, String>>,
}

impl MockPriceSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn set_klines(&self, symbol: &str, klines: Vec<Kline>) {
        self.klines
            .lock()
            .unwrap()
            .insert(symbol.to_string(), klines);
    }

    pub fn fail_symbol(&self, symbol: &str, reason: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(symbol.to_string(), reason.to_string());
    }
}

impl PriceSource for MockPriceSource {
    fn current_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<f64>> {
        Box::pin(async move {
            if let Some(reason) = self.failing.lock().unwrap().get(symbol) {
                return Err(AppError::TransientSource(reason.clone()));
            }
            self.prices
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| AppError::TransientSource(format!("no price for {symbol}")))
        })
    }

    fn klines<'a>(
        &'a self,
        symbol: &'a str,
        _interval: KlineInterval,
        start: i64,
        end: i64,
        limit: u32,
    ) -> BoxFuture<'a, Result<Vec<Kline>>> {
        Box::pin(async move {
            if let Some(reason) = self.failing.lock().unwrap().get(symbol) {
                return Err(AppError::TransientSource(reason.clone()));
            }
            let all = self
                .klines
                .lock()
                .unwrap()
                .get(symbol)
                .cloned()
                .unwrap_or_default();
            Ok(all
                .into_iter()
                .filter(|k| k.open_time >= start && k.open_time < end)
                .take(limit as usize)
                .collect())
        })
    }
}

/// Append one tracking point derived from a spot price, carrying the
/// running extrema forward from whatever is already stored.
pub fn seed_tracking(store: &Arc<SqliteStore>, signal: &Signal, tracked_at: i64, price: f64) {
    let prior = store
        .latest_tracking(&signal.signal_id)
        .expect("latest tracking");
    let (highest, lowest) = match &prior {
        Some(prev) => (prev.highest_price.max(price), prev.lowest_price.min(price)),
        None => (price, price),
    };
    let since = signal.confirmed_at.unwrap_or(signal.generated_at);
    store
        .insert_tracking(&vigil::types::SignalTracking {
            signal_id: signal.signal_id.clone(),
            tracked_at,
            current_price: price,
            price_change_pct: signal.change_pct(price),
            highest_price: highest,
            highest_change_pct: signal.change_pct(highest),
            lowest_price: lowest,
            lowest_change_pct: signal.change_pct(lowest),
            hours_tracked: (tracked_at - since) as f64 / HOUR_MS as f64,
            is_profit_target_hit: signal.target_hit(price),
            is_stop_loss_hit: signal.stop_hit(price),
        })
        .expect("insert tracking");
}

/// One-hour kline helper.
pub fn hour_kline(open_time: i64, open: f64, high: f64, low: f64, close: f64) -> Kline {
    Kline {
        open_time,
        close_time: open_time + HOUR_MS - 1,
        open,
        high,
        low,
        close,
        volume: 100.0,
    }
}
