mod common;

use common::{seed_signal, test_store, HOUR_MS};
use std::sync::Arc;
use vigil::engine::Aggregator;
use vigil::store::SignalRepository;
use vigil::types::{
    OutcomeClass, Signal, SignalDirection, SignalKlineTracking, SignalOutcome, SignalStatus,
    StatPeriod, StatScope,
};

const NOW: i64 = 1_000_000_000_000;

fn outcome_for(signal: &Signal, pnl: f64) -> SignalOutcome {
    let classification = if pnl.abs() <= 0.05 {
        OutcomeClass::Breakeven
    } else if pnl > 0.0 {
        OutcomeClass::Profit
    } else {
        OutcomeClass::Loss
    };
    SignalOutcome {
        signal_id: signal.signal_id.clone(),
        classification,
        final_pnl_pct: pnl,
        max_profit_pct: pnl.max(0.5),
        max_drawdown_pct: pnl.min(-0.5),
        risk_reward_ratio: Some(pnl.max(0.5) / pnl.min(-0.5).abs()),
        total_tracking_hours: 9.0,
    }
}

/// Closed signal generated (and closed) inside the last 24 hours.
fn closed_recent(store: &Arc<vigil::store::SqliteStore>, strategy: &str, pnl: f64) -> Signal {
    let signal = seed_signal(
        store,
        "BTCUSDT",
        SignalDirection::Long,
        strategy,
        100.0,
        SignalStatus::Closed,
        NOW - 20 * HOUR_MS,
    );
    store
        .write_outcome(&outcome_for(&signal, pnl), false)
        .unwrap();
    signal
}

#[test]
fn end_to_end_counts_and_rates() {
    let store = test_store();
    closed_recent(&store, "trend", 5.0);
    closed_recent(&store, "trend", 3.0);
    closed_recent(&store, "trend", 2.0);
    closed_recent(&store, "trend", -4.0);
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Invalidated,
        NOW - 20 * HOUR_MS,
    );

    let aggregator = Aggregator::new(store);
    let stats = aggregator
        .aggregate(&StatScope::overall(), StatPeriod::Day, NOW)
        .unwrap();

    assert_eq!(stats.total_signals, 5);
    assert_eq!(stats.confirmed_signals, 4);
    assert_eq!(stats.invalidated_signals, 1);
    assert_eq!(stats.closed_signals, 4);
    assert_eq!(stats.profitable_signals, 3);
    assert_eq!(stats.losing_signals, 1);
    assert!((stats.win_rate.unwrap() - 0.75).abs() < 1e-9);
    assert!((stats.profit_factor.unwrap() - 2.5).abs() < 1e-9);
    assert!((stats.avg_final_pnl_pct.unwrap() - 1.5).abs() < 1e-9);
    assert_eq!(stats.calculated_at, NOW);
}

#[test]
fn scopes_slice_by_strategy_and_symbol() {
    let store = test_store();
    closed_recent(&store, "trend", 5.0);
    closed_recent(&store, "trend", -2.0);
    closed_recent(&store, "meanrev", -3.0);
    let eth = seed_signal(
        &store,
        "ETHUSDT",
        SignalDirection::Short,
        "meanrev",
        2000.0,
        SignalStatus::Closed,
        NOW - 20 * HOUR_MS,
    );
    store.write_outcome(&outcome_for(&eth, 1.0), false).unwrap();

    let aggregator = Aggregator::new(store);

    let trend = aggregator
        .aggregate(&StatScope::strategy("trend"), StatPeriod::Day, NOW)
        .unwrap();
    assert_eq!(trend.total_signals, 2);
    assert_eq!(trend.closed_signals, 2);
    assert_eq!(trend.win_rate, Some(0.5));

    let eth_stats = aggregator
        .aggregate(&StatScope::symbol("ETHUSDT"), StatPeriod::Day, NOW)
        .unwrap();
    assert_eq!(eth_stats.total_signals, 1);
    assert_eq!(eth_stats.profitable_signals, 1);
}

#[test]
fn window_excludes_older_signals() {
    let store = test_store();
    closed_recent(&store, "trend", 5.0);
    // Generated and closed well outside the 24h window.
    let old = seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Closed,
        NOW - 10 * 24 * HOUR_MS,
    );
    store.write_outcome(&outcome_for(&old, -9.0), false).unwrap();

    let aggregator = Aggregator::new(store);
    let day = aggregator
        .aggregate(&StatScope::overall(), StatPeriod::Day, NOW)
        .unwrap();
    assert_eq!(day.total_signals, 1);
    assert_eq!(day.closed_signals, 1);
    assert_eq!(day.win_rate, Some(1.0));

    // The wider window sees both.
    let month = aggregator
        .aggregate(&StatScope::overall(), StatPeriod::Month, NOW)
        .unwrap();
    assert_eq!(month.total_signals, 2);
    assert_eq!(month.win_rate, Some(0.5));
}

#[test]
fn kline_rates_come_from_recorded_bars() {
    let store = test_store();
    let signal = closed_recent(&store, "trend", 2.0);
    let bars = [
        // (hourly_return, at_high, at_close)
        (1.0, true, true),
        (-2.0, true, false),
        (0.5, false, false),
    ];
    for (i, (ret, at_high, at_close)) in bars.iter().enumerate() {
        store
            .insert_kline_tracking(&SignalKlineTracking {
                signal_id: signal.signal_id.clone(),
                open_time: i as i64 * HOUR_MS,
                close_time: (i as i64 + 1) * HOUR_MS - 1,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + ret,
                volume: 10.0,
                open_change_pct: 0.0,
                high_change_pct: 1.0,
                low_change_pct: -1.0,
                close_change_pct: *ret,
                hourly_return_pct: *ret,
                profitable_at_high: *at_high,
                profitable_at_close: *at_close,
            })
            .unwrap();
    }

    let aggregator = Aggregator::new(store);
    let stats = aggregator
        .aggregate(&StatScope::overall(), StatPeriod::Day, NOW)
        .unwrap();

    assert!((stats.kline_theoretical_win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    assert!((stats.kline_close_win_rate.unwrap() - 1.0 / 3.0).abs() < 1e-9);
    assert!((stats.avg_hourly_return_pct.unwrap() - (-0.5 / 3.0)).abs() < 1e-9);
    assert_eq!(stats.max_hourly_return_pct, Some(1.0));
    assert_eq!(stats.min_hourly_return_pct, Some(-2.0));
}

#[test]
fn closed_signal_without_outcome_is_skipped_not_fatal() {
    let store = test_store();
    // Closed but never resolved (e.g. flagged for review).
    seed_signal(
        &store,
        "BTCUSDT",
        SignalDirection::Long,
        "trend",
        100.0,
        SignalStatus::Closed,
        NOW - 20 * HOUR_MS,
    );

    let aggregator = Aggregator::new(store);
    let stats = aggregator
        .aggregate(&StatScope::overall(), StatPeriod::Day, NOW)
        .unwrap();
    assert_eq!(stats.closed_signals, 1);
    assert_eq!(stats.win_rate, None);
    assert_eq!(stats.avg_final_pnl_pct, None);
}

#[test]
fn run_pass_writes_snapshots_for_every_scope() {
    let store = test_store();
    closed_recent(&store, "trend", 5.0);
    closed_recent(&store, "meanrev", -1.0);

    let aggregator = Aggregator::new(store.clone());
    // Scopes: overall + 2 strategies + 1 symbol.
    let written = aggregator.run_pass(&[StatPeriod::Day], NOW).unwrap();
    assert_eq!(written, 4);

    let overall = store
        .fetch_statistics_history(&StatScope::overall(), StatPeriod::Day, 10)
        .unwrap();
    assert_eq!(overall.len(), 1);
    assert_eq!(overall[0].total_signals, 2);

    let trend = store
        .fetch_statistics_history(&StatScope::strategy("trend"), StatPeriod::Day, 10)
        .unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].total_signals, 1);

    // A second pass appends, newest first.
    aggregator.run_pass(&[StatPeriod::Day], NOW + 1000).unwrap();
    let overall = store
        .fetch_statistics_history(&StatScope::overall(), StatPeriod::Day, 10)
        .unwrap();
    assert_eq!(overall.len(), 2);
    assert_eq!(overall[0].calculated_at, NOW + 1000);
}
