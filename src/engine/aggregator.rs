//! Windowed statistics over resolved signals.
//!
//! Aggregation is a pure function of stored immutable history: safe to
//! run on a schedule, on demand, or as a full rebuild, with identical
//! results regardless of input row order.

use crate::error::Result;
use crate::store::{SignalFilter, SignalRepository};
use crate::types::{
    OutcomeClass, Signal, SignalKlineTracking, SignalOutcome, SignalStatus, StatPeriod, StatScope,
    Statistics,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Windowed statistics aggregator.
pub struct Aggregator {
    store: Arc<dyn SignalRepository>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn SignalRepository>) -> Arc<Self> {
        Arc::new(Self { store })
    }

    /// Compute statistics for a scope and period ending at `now`.
    pub fn aggregate(&self, scope: &StatScope, period: StatPeriod, now: i64) -> Result<Statistics> {
        let (start, end) = period.window(now);

        // Lifecycle counts cover signals generated in the window.
        let generated = self.store.fetch_signals(&SignalFilter {
            strategy: scope.strategy.clone(),
            symbol: scope.symbol.clone(),
            generated_from: Some(start),
            generated_to: Some(end),
            page: 1,
            limit: u32::MAX,
            ..Default::default()
        })?;

        // Performance metrics cover signals closed in the window.
        let closed = self.store.fetch_signals(&SignalFilter {
            status: Some(SignalStatus::Closed),
            strategy: scope.strategy.clone(),
            symbol: scope.symbol.clone(),
            closed_from: Some(start),
            closed_to: Some(end),
            page: 1,
            limit: u32::MAX,
            ..Default::default()
        })?;

        let ids: Vec<String> = closed.items.iter().map(|s| s.signal_id.clone()).collect();
        let outcomes = self.store.fetch_outcomes(&ids)?;

        let mut klines = Vec::new();
        for id in &ids {
            klines.extend(self.store.fetch_kline_tracking(id)?);
        }

        Ok(compute_statistics(
            scope,
            period,
            &generated.items,
            &closed.items,
            &outcomes,
            &klines,
            now,
        ))
    }

    /// Compute and persist one snapshot.
    pub fn aggregate_and_store(
        &self,
        scope: &StatScope,
        period: StatPeriod,
        now: i64,
    ) -> Result<Statistics> {
        let stats = self.aggregate(scope, period, now)?;
        self.store.write_statistics(&stats)?;
        Ok(stats)
    }

    /// One scheduled aggregation pass: overall plus every distinct
    /// strategy and symbol, for each requested period. Returns the number
    /// of snapshots written; per-scope failures are logged and skipped.
    pub fn run_pass(&self, periods: &[StatPeriod], now: i64) -> Result<usize> {
        let mut scopes = vec![StatScope::overall()];
        for strategy in self.store.distinct_strategies()? {
            scopes.push(StatScope::strategy(strategy));
        }
        for symbol in self.store.distinct_symbols()? {
            scopes.push(StatScope::symbol(symbol));
        }

        let mut written = 0;
        for scope in &scopes {
            for period in periods {
                match self.aggregate_and_store(scope, *period, now) {
                    Ok(_) => written += 1,
                    Err(e) => {
                        warn!(?scope, period = period.as_str(), error = %e,
                              "aggregation failed for scope");
                    }
                }
            }
        }
        info!(snapshots = written, scopes = scopes.len(), "aggregation pass complete");
        Ok(written)
    }
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}

/// Pure statistics computation. Order-independent across input rows:
/// only sums, counts and extrema are folded.
pub fn compute_statistics(
    scope: &StatScope,
    period: StatPeriod,
    generated: &[Signal],
    closed: &[Signal],
    outcomes: &HashMap<String, SignalOutcome>,
    klines: &[SignalKlineTracking],
    now: i64,
) -> Statistics {
    let confirmed_signals = generated.iter().filter(|s| s.confirmed_at.is_some()).count() as u64;
    let invalidated_signals = generated
        .iter()
        .filter(|s| s.status == SignalStatus::Invalidated)
        .count() as u64;

    let mut profitable = 0u64;
    let mut losing = 0u64;
    let mut neutral = 0u64;
    let mut gains = 0.0f64;
    let mut losses = 0.0f64;
    let mut pnl_sum = 0.0f64;
    let mut mfe_sum = 0.0f64;
    let mut mae_sum = 0.0f64;
    let mut resolved = 0usize;

    for signal in closed {
        let Some(outcome) = outcomes.get(&signal.signal_id) else {
            // Outcomes are supplementary: an unresolved closed signal is
            // skipped, not an error.
            debug!(signal_id = %signal.signal_id, "closed signal without outcome, skipping");
            continue;
        };
        resolved += 1;
        pnl_sum += outcome.final_pnl_pct;
        mfe_sum += outcome.max_profit_pct;
        mae_sum += outcome.max_drawdown_pct;
        match outcome.classification {
            OutcomeClass::Profit => {
                profitable += 1;
                gains += outcome.final_pnl_pct;
            }
            OutcomeClass::Loss => {
                losing += 1;
                losses += outcome.final_pnl_pct.abs();
            }
            OutcomeClass::Breakeven => neutral += 1,
        }
    }

    // Breakeven signals are excluded from the win-rate denominator.
    let decisive = profitable + losing;
    let win_rate = if decisive > 0 {
        Some(profitable as f64 / decisive as f64)
    } else {
        None
    };
    // Absent, not infinity, when no losses exist.
    let profit_factor = if losses > 0.0 { Some(gains / losses) } else { None };

    let kline_total = klines.len();
    let kline_theoretical_win_rate = mean(
        klines.iter().filter(|k| k.profitable_at_high).count() as f64,
        kline_total,
    );
    let kline_close_win_rate = mean(
        klines.iter().filter(|k| k.profitable_at_close).count() as f64,
        kline_total,
    );

    let mut hourly_sum = 0.0f64;
    let mut hourly_max = f64::NEG_INFINITY;
    let mut hourly_min = f64::INFINITY;
    for kline in klines {
        hourly_sum += kline.hourly_return_pct;
        hourly_max = hourly_max.max(kline.hourly_return_pct);
        hourly_min = hourly_min.min(kline.hourly_return_pct);
    }

    Statistics {
        strategy: scope.strategy.clone(),
        symbol: scope.symbol.clone(),
        period,
        total_signals: generated.len() as u64,
        confirmed_signals,
        invalidated_signals,
        closed_signals: closed.len() as u64,
        profitable_signals: profitable,
        losing_signals: losing,
        neutral_signals: neutral,
        win_rate,
        profit_factor,
        kline_theoretical_win_rate,
        kline_close_win_rate,
        avg_hourly_return_pct: mean(hourly_sum, kline_total),
        max_hourly_return_pct: (kline_total > 0).then_some(hourly_max),
        min_hourly_return_pct: (kline_total > 0).then_some(hourly_min),
        avg_max_profit_pct: mean(mfe_sum, resolved),
        avg_max_drawdown_pct: mean(mae_sum, resolved),
        avg_final_pnl_pct: mean(pnl_sum, resolved),
        calculated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalDirection;

    fn closed_signal(id: &str) -> Signal {
        let mut sig = Signal::new("BTCUSDT", SignalDirection::Long, "trend", 100.0);
        sig.signal_id = id.to_string();
        sig.status = SignalStatus::Closed;
        sig.confirmed_at = Some(0);
        sig.closed_at = Some(3_600_000);
        sig
    }

    fn outcome(id: &str, pnl: f64) -> SignalOutcome {
        let classification = if pnl.abs() <= 0.05 {
            OutcomeClass::Breakeven
        } else if pnl > 0.0 {
            OutcomeClass::Profit
        } else {
            OutcomeClass::Loss
        };
        SignalOutcome {
            signal_id: id.to_string(),
            classification,
            final_pnl_pct: pnl,
            max_profit_pct: pnl.max(0.0),
            max_drawdown_pct: pnl.min(0.0),
            risk_reward_ratio: None,
            total_tracking_hours: 1.0,
        }
    }

    #[test]
    fn scenario_three_profits_one_loss() {
        // 3 PROFIT (+5, +3, +2) and 1 LOSS (-4):
        // win_rate = 0.75, profit_factor = 10 / 4 = 2.5.
        let closed: Vec<Signal> = ["a", "b", "c", "d"].iter().map(|id| closed_signal(id)).collect();
        let outcomes: HashMap<String, SignalOutcome> = [
            ("a", 5.0),
            ("b", 3.0),
            ("c", 2.0),
            ("d", -4.0),
        ]
        .iter()
        .map(|(id, pnl)| (id.to_string(), outcome(id, *pnl)))
        .collect();

        let stats = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Month,
            &closed,
            &closed,
            &outcomes,
            &[],
            1,
        );
        assert_eq!(stats.profitable_signals, 3);
        assert_eq!(stats.losing_signals, 1);
        assert!((stats.win_rate.unwrap() - 0.75).abs() < 1e-9);
        assert!((stats.profit_factor.unwrap() - 2.5).abs() < 1e-9);
        assert!((stats.avg_final_pnl_pct.unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn order_independent() {
        let mut closed: Vec<Signal> =
            ["a", "b", "c", "d"].iter().map(|id| closed_signal(id)).collect();
        let outcomes: HashMap<String, SignalOutcome> = [
            ("a", 5.0),
            ("b", 3.0),
            ("c", 2.0),
            ("d", -4.0),
        ]
        .iter()
        .map(|(id, pnl)| (id.to_string(), outcome(id, *pnl)))
        .collect();

        let forward = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Month,
            &closed,
            &closed,
            &outcomes,
            &[],
            1,
        );
        closed.reverse();
        let reversed = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Month,
            &closed,
            &closed,
            &outcomes,
            &[],
            1,
        );
        assert_eq!(forward, reversed);
    }

    #[test]
    fn empty_scope_has_absent_rates() {
        let stats = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Week,
            &[],
            &[],
            &HashMap::new(),
            &[],
            1,
        );
        assert_eq!(stats.win_rate, None);
        assert_eq!(stats.profit_factor, None);
        assert_eq!(stats.kline_theoretical_win_rate, None);
        assert_eq!(stats.avg_hourly_return_pct, None);
        assert_eq!(stats.max_hourly_return_pct, None);
    }

    #[test]
    fn all_breakeven_has_absent_win_rate() {
        let closed = vec![closed_signal("a")];
        let outcomes: HashMap<String, SignalOutcome> =
            [("a".to_string(), outcome("a", 0.0))].into_iter().collect();
        let stats = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Week,
            &closed,
            &closed,
            &outcomes,
            &[],
            1,
        );
        assert_eq!(stats.neutral_signals, 1);
        assert_eq!(stats.win_rate, None);
    }

    #[test]
    fn profit_factor_absent_without_losses() {
        let closed = vec![closed_signal("a")];
        let outcomes: HashMap<String, SignalOutcome> =
            [("a".to_string(), outcome("a", 5.0))].into_iter().collect();
        let stats = compute_statistics(
            &StatScope::overall(),
            StatPeriod::Week,
            &closed,
            &closed,
            &outcomes,
            &[],
            1,
        );
        assert_eq!(stats.win_rate, Some(1.0));
        assert_eq!(stats.profit_factor, None);
    }
}
