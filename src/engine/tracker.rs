//! Periodic price-path sampling for active signals.
//!
//! Each pass ticks every non-terminal signal: PENDING signals get a
//! deadline check, CONFIRMED/TRACKING signals get one tracking point, a
//! kline catch-up, and a lifecycle step. Distinct signals tick in
//! parallel under a bounded fan-out; ticks for the same signal never
//! overlap, and a signal is never ticked twice within one interval
//! bucket.

use crate::engine::{LifecycleManager, MarketSnapshot};
use crate::error::Result;
use crate::source::PriceSource;
use crate::store::SignalRepository;
use crate::types::{KlineInterval, Signal, SignalKlineTracking, SignalTracking};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum klines fetched per catch-up request.
const KLINE_FETCH_LIMIT: u32 = 500;

/// Periodic tracker for active signals.
pub struct Tracker {
    store: Arc<dyn SignalRepository>,
    source: Arc<dyn PriceSource>,
    lifecycle: Arc<LifecycleManager>,
    kline_interval: KlineInterval,
    tick_interval_ms: i64,
    concurrency: usize,
    /// Signals with a tick currently in flight.
    in_flight: DashMap<String, ()>,
    /// Last completed interval bucket per signal.
    last_bucket: DashMap<String, i64>,
}

/// Removes the in-flight marker when a tick completes or aborts.
struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(self.key);
    }
}

impl Tracker {
    pub fn new(
        store: Arc<dyn SignalRepository>,
        source: Arc<dyn PriceSource>,
        lifecycle: Arc<LifecycleManager>,
        kline_interval: KlineInterval,
        tick_interval: Duration,
        concurrency: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            source,
            lifecycle,
            kline_interval,
            tick_interval_ms: tick_interval.as_millis().max(1) as i64,
            concurrency: concurrency.max(1),
            in_flight: DashMap::new(),
            last_bucket: DashMap::new(),
        })
    }

    /// Run one tracking pass over all active signals. Per-signal failures
    /// are isolated: a transient source error for one signal never blocks
    /// the others, and the signal is retried on the next pass.
    pub async fn tick_all(&self, now: i64) {
        let signals = match self.store.fetch_active_signals() {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "failed to fetch active signals, skipping pass");
                return;
            }
        };
        if signals.is_empty() {
            return;
        }
        debug!(count = signals.len(), "tracking pass started");

        stream::iter(signals)
            .for_each_concurrent(self.concurrency, |signal| async move {
                let result = if signal.status.is_trackable() {
                    self.tick_signal(&signal, now).await.map(|_| ())
                } else {
                    // PENDING: only the confirmation deadline is checked.
                    self.lifecycle
                        .advance(&signal, &MarketSnapshot::time_only(now))
                        .map(|_| ())
                };
                if let Err(e) = result {
                    if e.is_transient() {
                        warn!(signal_id = %signal.signal_id, error = %e, "tick failed, will retry");
                    } else {
                        warn!(signal_id = %signal.signal_id, error = %e, "tick failed");
                    }
                }
            })
            .await;
    }

    /// Tick one trackable signal: record a tracking point, catch up on
    /// closed klines, then advance the lifecycle. Returns false when the
    /// tick was skipped (same interval bucket, or already in flight).
    pub async fn tick_signal(&self, signal: &Signal, now: i64) -> Result<bool> {
        let bucket = now / self.tick_interval_ms;
        if self
            .last_bucket
            .get(&signal.signal_id)
            .map(|b| *b == bucket)
            .unwrap_or(false)
        {
            return Ok(false);
        }

        match self.in_flight.entry(signal.signal_id.clone()) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }
        let _guard = InFlightGuard {
            map: &self.in_flight,
            key: &signal.signal_id,
        };

        let price = self.source.current_price(&signal.symbol).await?;
        let tracking = self.build_tracking(signal, price, now)?;
        self.store.insert_tracking(&tracking)?;

        // Kline sampling is independent and coarser; a failure here is
        // retried next pass without discarding the tracking point.
        if let Err(e) = self.record_klines(signal, now).await {
            warn!(signal_id = %signal.signal_id, error = %e, "kline catch-up failed");
        }

        self.lifecycle
            .advance(signal, &MarketSnapshot::at_price(now, price))?;

        self.last_bucket.insert(signal.signal_id.clone(), bucket);
        Ok(true)
    }

    /// Build one tracking point, carrying the running extrema forward
    /// from the latest stored point.
    fn build_tracking(&self, signal: &Signal, price: f64, now: i64) -> Result<SignalTracking> {
        let prior = self.store.latest_tracking(&signal.signal_id)?;
        let (highest_price, lowest_price) = match &prior {
            Some(prev) => (prev.highest_price.max(price), prev.lowest_price.min(price)),
            None => (price, price),
        };

        let since = signal.confirmed_at.unwrap_or(signal.generated_at);
        Ok(SignalTracking {
            signal_id: signal.signal_id.clone(),
            tracked_at: now,
            current_price: price,
            price_change_pct: signal.change_pct(price),
            highest_price,
            highest_change_pct: signal.change_pct(highest_price),
            lowest_price,
            lowest_change_pct: signal.change_pct(lowest_price),
            hours_tracked: (now - since) as f64 / 3_600_000.0,
            is_profit_target_hit: signal.target_hit(price),
            is_stop_loss_hit: signal.stop_hit(price),
        })
    }

    /// Record every kline that has closed since the last recorded bar
    /// (or since generation). Insertion is idempotent per bar.
    async fn record_klines(&self, signal: &Signal, now: i64) -> Result<usize> {
        let start = match self.store.latest_kline_open_time(&signal.signal_id)? {
            Some(last_open) => last_open + self.kline_interval.millis(),
            None => self.kline_interval.align_down(signal.generated_at),
        };
        if start >= now {
            return Ok(0);
        }

        let klines = self
            .source
            .klines(
                &signal.symbol,
                self.kline_interval,
                start,
                now,
                KLINE_FETCH_LIMIT,
            )
            .await?;

        let mut recorded = 0;
        for kline in klines.iter().filter(|k| k.is_closed(now)) {
            let entry = signal.price_at_signal;
            // Direction-aware favorable extreme: the high for LONG, the
            // low for SHORT.
            let favorable = match signal.direction {
                crate::types::SignalDirection::Long => kline.high,
                crate::types::SignalDirection::Short => kline.low,
            };
            let row = SignalKlineTracking {
                signal_id: signal.signal_id.clone(),
                open_time: kline.open_time,
                close_time: kline.close_time,
                open: kline.open,
                high: kline.high,
                low: kline.low,
                close: kline.close,
                volume: kline.volume,
                open_change_pct: signal.change_pct(kline.open),
                high_change_pct: signal.change_pct(kline.high),
                low_change_pct: signal.change_pct(kline.low),
                close_change_pct: signal.change_pct(kline.close),
                hourly_return_pct: (kline.close - kline.open) / kline.open * 100.0,
                profitable_at_high: signal.direction.is_profitable(favorable, entry),
                profitable_at_close: signal.direction.is_profitable(kline.close, entry),
            };
            self.store.insert_kline_tracking(&row)?;
            recorded += 1;
        }
        if recorded > 0 {
            debug!(signal_id = %signal.signal_id, recorded, "recorded closed klines");
        }
        Ok(recorded)
    }
}
