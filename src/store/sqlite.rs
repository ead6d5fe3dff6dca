//! SQLite-backed signal repository.
//!
//! All engine components share one store; writes for a single signal are
//! serialized by the connection mutex and status transitions use an
//! optimistic expected-status precondition, so concurrent workers never
//! race a terminal decision.

use crate::error::{AppError, Result};
use crate::store::{SignalFilter, SignalPage, SignalRepository};
use crate::types::{
    MarketContext, OutcomeClass, Signal, SignalDirection, SignalKlineTracking, SignalOutcome,
    SignalStatus, SignalTracking, StatPeriod, StatScope, Statistics,
};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// SQLite store for signals, tracking history, outcomes and statistics.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signals (
                signal_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                strategy TEXT NOT NULL,
                status TEXT NOT NULL,
                generated_at INTEGER NOT NULL,
                price_at_signal REAL NOT NULL,
                target_price REAL,
                stop_loss_price REAL,
                context_json TEXT NOT NULL DEFAULT '{}',
                rationale TEXT,
                confirmed_at INTEGER,
                closed_at INTEGER,
                needs_review INTEGER NOT NULL DEFAULT 0,
                review_reason TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_status ON signals(status)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_strategy ON signals(strategy, generated_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_symbol ON signals(symbol, generated_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_closed_at ON signals(closed_at)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_trackings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal_id TEXT NOT NULL,
                tracked_at INTEGER NOT NULL,
                current_price REAL NOT NULL,
                price_change_pct REAL NOT NULL,
                highest_price REAL NOT NULL,
                highest_change_pct REAL NOT NULL,
                lowest_price REAL NOT NULL,
                lowest_change_pct REAL NOT NULL,
                hours_tracked REAL NOT NULL,
                is_profit_target_hit INTEGER NOT NULL,
                is_stop_loss_hit INTEGER NOT NULL,
                UNIQUE(signal_id, tracked_at)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trackings_signal
             ON signal_trackings(signal_id, tracked_at)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_kline_trackings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal_id TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                close_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                open_change_pct REAL NOT NULL,
                high_change_pct REAL NOT NULL,
                low_change_pct REAL NOT NULL,
                close_change_pct REAL NOT NULL,
                hourly_return_pct REAL NOT NULL,
                profitable_at_high INTEGER NOT NULL,
                profitable_at_close INTEGER NOT NULL,
                UNIQUE(signal_id, open_time)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_klines_signal
             ON signal_kline_trackings(signal_id, open_time)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_outcomes (
                signal_id TEXT PRIMARY KEY,
                classification TEXT NOT NULL,
                final_pnl_pct REAL NOT NULL,
                max_profit_pct REAL NOT NULL,
                max_drawdown_pct REAL NOT NULL,
                risk_reward_ratio REAL,
                total_tracking_hours REAL NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS statistics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy TEXT,
                symbol TEXT,
                period TEXT NOT NULL,
                total_signals INTEGER NOT NULL,
                confirmed_signals INTEGER NOT NULL,
                invalidated_signals INTEGER NOT NULL,
                closed_signals INTEGER NOT NULL,
                profitable_signals INTEGER NOT NULL,
                losing_signals INTEGER NOT NULL,
                neutral_signals INTEGER NOT NULL,
                win_rate REAL,
                profit_factor REAL,
                kline_theoretical_win_rate REAL,
                kline_close_win_rate REAL,
                avg_hourly_return_pct REAL,
                max_hourly_return_pct REAL,
                min_hourly_return_pct REAL,
                avg_max_profit_pct REAL,
                avg_max_drawdown_pct REAL,
                avg_final_pnl_pct REAL,
                calculated_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_statistics_scope
             ON statistics(period, strategy, symbol, calculated_at DESC)",
            [],
        )?;

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Build the WHERE clause and parameters for a signal filter.
    fn filter_clause(filter: &SignalFilter) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(ref symbol) = filter.symbol {
            clauses.push("symbol = ?");
            values.push(Value::Text(symbol.clone()));
        }
        if let Some(ref strategy) = filter.strategy {
            clauses.push("strategy = ?");
            values.push(Value::Text(strategy.clone()));
        }
        if let Some(direction) = filter.direction {
            clauses.push("direction = ?");
            values.push(Value::Text(direction.as_str().to_string()));
        }
        if let Some(from) = filter.generated_from {
            clauses.push("generated_at >= ?");
            values.push(Value::Integer(from));
        }
        if let Some(to) = filter.generated_to {
            clauses.push("generated_at < ?");
            values.push(Value::Integer(to));
        }
        if let Some(from) = filter.closed_from {
            clauses.push("closed_at IS NOT NULL AND closed_at >= ?");
            values.push(Value::Integer(from));
        }
        if let Some(to) = filter.closed_to {
            clauses.push("closed_at IS NOT NULL AND closed_at < ?");
            values.push(Value::Integer(to));
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, values)
    }
}

const SIGNAL_COLUMNS: &str = "signal_id, symbol, direction, strategy, status, generated_at, \
     price_at_signal, target_price, stop_loss_price, context_json, rationale, \
     confirmed_at, closed_at, needs_review, review_reason";

fn parse_error(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {what}: {value}").into(),
    )
}

fn row_to_signal(row: &Row<'_>) -> rusqlite::Result<Signal> {
    let direction_s: String = row.get(2)?;
    let status_s: String = row.get(4)?;
    let context_json: String = row.get(9)?;
    Ok(Signal {
        signal_id: row.get(0)?,
        symbol: row.get(1)?,
        direction: SignalDirection::from_str(&direction_s)
            .ok_or_else(|| parse_error(2, "direction", &direction_s))?,
        strategy: row.get(3)?,
        status: SignalStatus::from_str(&status_s)
            .ok_or_else(|| parse_error(4, "status", &status_s))?,
        generated_at: row.get(5)?,
        price_at_signal: row.get(6)?,
        target_price: row.get(7)?,
        stop_loss_price: row.get(8)?,
        context: serde_json::from_str::<MarketContext>(&context_json).unwrap_or_default(),
        rationale: row.get(10)?,
        confirmed_at: row.get(11)?,
        closed_at: row.get(12)?,
        needs_review: row.get::<_, i64>(13)? != 0,
        review_reason: row.get(14)?,
    })
}

fn row_to_tracking(row: &Row<'_>) -> rusqlite::Result<SignalTracking> {
    Ok(SignalTracking {
        signal_id: row.get(0)?,
        tracked_at: row.get(1)?,
        current_price: row.get(2)?,
        price_change_pct: row.get(3)?,
        highest_price: row.get(4)?,
        highest_change_pct: row.get(5)?,
        lowest_price: row.get(6)?,
        lowest_change_pct: row.get(7)?,
        hours_tracked: row.get(8)?,
        is_profit_target_hit: row.get::<_, i64>(9)? != 0,
        is_stop_loss_hit: row.get::<_, i64>(10)? != 0,
    })
}

fn row_to_kline_tracking(row: &Row<'_>) -> rusqlite::Result<SignalKlineTracking> {
    Ok(SignalKlineTracking {
        signal_id: row.get(0)?,
        open_time: row.get(1)?,
        close_time: row.get(2)?,
        open: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        close: row.get(6)?,
        volume: row.get(7)?,
        open_change_pct: row.get(8)?,
        high_change_pct: row.get(9)?,
        low_change_pct: row.get(10)?,
        close_change_pct: row.get(11)?,
        hourly_return_pct: row.get(12)?,
        profitable_at_high: row.get::<_, i64>(13)? != 0,
        profitable_at_close: row.get::<_, i64>(14)? != 0,
    })
}

fn row_to_outcome(row: &Row<'_>) -> rusqlite::Result<SignalOutcome> {
    let class_s: String = row.get(1)?;
    Ok(SignalOutcome {
        signal_id: row.get(0)?,
        classification: OutcomeClass::from_str(&class_s)
            .ok_or_else(|| parse_error(1, "classification", &class_s))?,
        final_pnl_pct: row.get(2)?,
        max_profit_pct: row.get(3)?,
        max_drawdown_pct: row.get(4)?,
        risk_reward_ratio: row.get(5)?,
        total_tracking_hours: row.get(6)?,
    })
}

fn row_to_statistics(row: &Row<'_>) -> rusqlite::Result<Statistics> {
    let period_s: String = row.get(2)?;
    Ok(Statistics {
        strategy: row.get(0)?,
        symbol: row.get(1)?,
        period: StatPeriod::from_str(&period_s)
            .ok_or_else(|| parse_error(2, "period", &period_s))?,
        total_signals: row.get::<_, i64>(3)? as u64,
        confirmed_signals: row.get::<_, i64>(4)? as u64,
        invalidated_signals: row.get::<_, i64>(5)? as u64,
        closed_signals: row.get::<_, i64>(6)? as u64,
        profitable_signals: row.get::<_, i64>(7)? as u64,
        losing_signals: row.get::<_, i64>(8)? as u64,
        neutral_signals: row.get::<_, i64>(9)? as u64,
        win_rate: row.get(10)?,
        profit_factor: row.get(11)?,
        kline_theoretical_win_rate: row.get(12)?,
        kline_close_win_rate: row.get(13)?,
        avg_hourly_return_pct: row.get(14)?,
        max_hourly_return_pct: row.get(15)?,
        min_hourly_return_pct: row.get(16)?,
        avg_max_profit_pct: row.get(17)?,
        avg_max_drawdown_pct: row.get(18)?,
        avg_final_pnl_pct: row.get(19)?,
        calculated_at: row.get(20)?,
    })
}

impl SignalRepository for SqliteStore {
    fn fetch_signal(&self, signal_id: &str) -> Result<Signal> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SIGNAL_COLUMNS} FROM signals WHERE signal_id = ?1");
        conn.query_row(&sql, params![signal_id], row_to_signal)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    AppError::NotFound(format!("signal {signal_id}"))
                }
                other => other.into(),
            })
    }

    fn fetch_signals(&self, filter: &SignalFilter) -> Result<SignalPage> {
        let conn = self.conn.lock().unwrap();
        let (where_sql, values) = Self::filter_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM signals{where_sql}");
        let total: i64 = conn.query_row(
            &count_sql,
            params_from_iter(values.iter().cloned()),
            |row| row.get(0),
        )?;

        let mut page_values = values;
        page_values.push(Value::Integer(filter.limit as i64));
        page_values.push(Value::Integer(filter.offset() as i64));
        let page_sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals{where_sql} \
             ORDER BY generated_at DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&page_sql)?;
        let items = stmt
            .query_map(params_from_iter(page_values), row_to_signal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SignalPage {
            items,
            total: total as u64,
        })
    }

    fn fetch_active_signals(&self) -> Result<Vec<Signal>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals \
             WHERE status IN ('PENDING', 'CONFIRMED', 'TRACKING') \
             ORDER BY generated_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], row_to_signal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn insert_signal(&self, signal: &Signal) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let context_json = serde_json::to_string(&signal.context)
            .map_err(|e| AppError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO signals (signal_id, symbol, direction, strategy, status, generated_at, \
             price_at_signal, target_price, stop_loss_price, context_json, rationale, \
             confirmed_at, closed_at, needs_review, review_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                signal.signal_id,
                signal.symbol,
                signal.direction.as_str(),
                signal.strategy,
                signal.status.as_str(),
                signal.generated_at,
                signal.price_at_signal,
                signal.target_price,
                signal.stop_loss_price,
                context_json,
                signal.rationale,
                signal.confirmed_at,
                signal.closed_at,
                signal.needs_review as i64,
                signal.review_reason,
            ],
        )?;
        Ok(())
    }

    fn insert_tracking(&self, tracking: &SignalTracking) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        // tracked_at must be strictly increasing per signal.
        let last: Option<i64> = conn
            .query_row(
                "SELECT MAX(tracked_at) FROM signal_trackings WHERE signal_id = ?1",
                params![tracking.signal_id],
                |row| row.get(0),
            )
            .unwrap_or(None);
        if let Some(last) = last {
            if tracking.tracked_at <= last {
                return Err(AppError::InvariantViolation(format!(
                    "non-monotonic tracked_at for signal {}: {} <= {}",
                    tracking.signal_id, tracking.tracked_at, last
                )));
            }
        }

        conn.execute(
            "INSERT INTO signal_trackings (signal_id, tracked_at, current_price, \
             price_change_pct, highest_price, highest_change_pct, lowest_price, \
             lowest_change_pct, hours_tracked, is_profit_target_hit, is_stop_loss_hit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                tracking.signal_id,
                tracking.tracked_at,
                tracking.current_price,
                tracking.price_change_pct,
                tracking.highest_price,
                tracking.highest_change_pct,
                tracking.lowest_price,
                tracking.lowest_change_pct,
                tracking.hours_tracked,
                tracking.is_profit_target_hit as i64,
                tracking.is_stop_loss_hit as i64,
            ],
        )?;
        Ok(())
    }

    fn insert_kline_tracking(&self, kline: &SignalKlineTracking) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO signal_kline_trackings (signal_id, open_time, close_time, \
             open, high, low, close, volume, open_change_pct, high_change_pct, low_change_pct, \
             close_change_pct, hourly_return_pct, profitable_at_high, profitable_at_close)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                kline.signal_id,
                kline.open_time,
                kline.close_time,
                kline.open,
                kline.high,
                kline.low,
                kline.close,
                kline.volume,
                kline.open_change_pct,
                kline.high_change_pct,
                kline.low_change_pct,
                kline.close_change_pct,
                kline.hourly_return_pct,
                kline.profitable_at_high as i64,
                kline.profitable_at_close as i64,
            ],
        )?;
        Ok(())
    }

    fn fetch_tracking(&self, signal_id: &str) -> Result<Vec<SignalTracking>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT signal_id, tracked_at, current_price, price_change_pct, highest_price, \
             highest_change_pct, lowest_price, lowest_change_pct, hours_tracked, \
             is_profit_target_hit, is_stop_loss_hit
             FROM signal_trackings WHERE signal_id = ?1 ORDER BY tracked_at ASC",
        )?;
        let items = stmt
            .query_map(params![signal_id], row_to_tracking)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn latest_tracking(&self, signal_id: &str) -> Result<Option<SignalTracking>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT signal_id, tracked_at, current_price, price_change_pct, highest_price, \
             highest_change_pct, lowest_price, lowest_change_pct, hours_tracked, \
             is_profit_target_hit, is_stop_loss_hit
             FROM signal_trackings WHERE signal_id = ?1 ORDER BY tracked_at DESC LIMIT 1",
            params![signal_id],
            row_to_tracking,
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_kline_tracking(&self, signal_id: &str) -> Result<Vec<SignalKlineTracking>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT signal_id, open_time, close_time, open, high, low, close, volume, \
             open_change_pct, high_change_pct, low_change_pct, close_change_pct, \
             hourly_return_pct, profitable_at_high, profitable_at_close
             FROM signal_kline_trackings WHERE signal_id = ?1 ORDER BY open_time ASC",
        )?;
        let items = stmt
            .query_map(params![signal_id], row_to_kline_tracking)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn latest_kline_open_time(&self, signal_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let last: Option<i64> = conn
            .query_row(
                "SELECT MAX(open_time) FROM signal_kline_trackings WHERE signal_id = ?1",
                params![signal_id],
                |row| row.get(0),
            )
            .unwrap_or(None);
        Ok(last)
    }

    fn write_outcome(&self, outcome: &SignalOutcome, replace: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let sql = if replace {
            "INSERT OR REPLACE INTO signal_outcomes (signal_id, classification, final_pnl_pct, \
             max_profit_pct, max_drawdown_pct, risk_reward_ratio, total_tracking_hours)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        } else {
            "INSERT INTO signal_outcomes (signal_id, classification, final_pnl_pct, \
             max_profit_pct, max_drawdown_pct, risk_reward_ratio, total_tracking_hours)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        };
        let result = conn.execute(
            sql,
            params![
                outcome.signal_id,
                outcome.classification.as_str(),
                outcome.final_pnl_pct,
                outcome.max_profit_pct,
                outcome.max_drawdown_pct,
                outcome.risk_reward_ratio,
                outcome.total_tracking_hours,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AppError::Conflict(format!(
                    "outcome already exists for signal {}",
                    outcome.signal_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_outcome(&self, signal_id: &str) -> Result<Option<SignalOutcome>> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT signal_id, classification, final_pnl_pct, max_profit_pct, \
             max_drawdown_pct, risk_reward_ratio, total_tracking_hours
             FROM signal_outcomes WHERE signal_id = ?1",
            params![signal_id],
            row_to_outcome,
        );
        match result {
            Ok(o) => Ok(Some(o)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_outcomes(&self, signal_ids: &[String]) -> Result<HashMap<String, SignalOutcome>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT signal_id, classification, final_pnl_pct, max_profit_pct, \
             max_drawdown_pct, risk_reward_ratio, total_tracking_hours
             FROM signal_outcomes WHERE signal_id = ?1",
        )?;
        let mut map = HashMap::new();
        for id in signal_ids {
            match stmt.query_row(params![id], row_to_outcome) {
                Ok(o) => {
                    map.insert(id.clone(), o);
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(map)
    }

    fn apply_transition(
        &self,
        signal_id: &str,
        expected: SignalStatus,
        new: SignalStatus,
        at: i64,
    ) -> Result<()> {
        if expected.is_terminal() {
            return Err(AppError::InvariantViolation(format!(
                "no transitions out of terminal status {}",
                expected.as_str()
            )));
        }

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE signals SET status = ?1,
                 confirmed_at = CASE WHEN ?1 = 'CONFIRMED' THEN ?2 ELSE confirmed_at END,
                 closed_at = CASE WHEN ?1 = 'CLOSED' THEN ?2 ELSE closed_at END
             WHERE signal_id = ?3 AND status = ?4",
            params![new.as_str(), at, signal_id, expected.as_str()],
        )?;

        if changed == 1 {
            debug!(
                signal_id,
                from = expected.as_str(),
                to = new.as_str(),
                "status transition applied"
            );
            return Ok(());
        }

        // Distinguish a concurrency loss from an unknown id.
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM signals WHERE signal_id = ?1",
                params![signal_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        match current {
            Some(actual) => Err(AppError::Conflict(format!(
                "signal {signal_id} is {actual}, expected {}",
                expected.as_str()
            ))),
            None => Err(AppError::NotFound(format!("signal {signal_id}"))),
        }
    }

    fn write_statistics(&self, stats: &Statistics) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO statistics (strategy, symbol, period, total_signals, \
             confirmed_signals, invalidated_signals, closed_signals, profitable_signals, \
             losing_signals, neutral_signals, win_rate, profit_factor, \
             kline_theoretical_win_rate, kline_close_win_rate, avg_hourly_return_pct, \
             max_hourly_return_pct, min_hourly_return_pct, avg_max_profit_pct, \
             avg_max_drawdown_pct, avg_final_pnl_pct, calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                stats.strategy,
                stats.symbol,
                stats.period.as_str(),
                stats.total_signals as i64,
                stats.confirmed_signals as i64,
                stats.invalidated_signals as i64,
                stats.closed_signals as i64,
                stats.profitable_signals as i64,
                stats.losing_signals as i64,
                stats.neutral_signals as i64,
                stats.win_rate,
                stats.profit_factor,
                stats.kline_theoretical_win_rate,
                stats.kline_close_win_rate,
                stats.avg_hourly_return_pct,
                stats.max_hourly_return_pct,
                stats.min_hourly_return_pct,
                stats.avg_max_profit_pct,
                stats.avg_max_drawdown_pct,
                stats.avg_final_pnl_pct,
                stats.calculated_at,
            ],
        )?;
        Ok(())
    }

    fn fetch_statistics_history(
        &self,
        scope: &StatScope,
        period: StatPeriod,
        limit: u32,
    ) -> Result<Vec<Statistics>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT strategy, symbol, period, total_signals, confirmed_signals, \
             invalidated_signals, closed_signals, profitable_signals, losing_signals, \
             neutral_signals, win_rate, profit_factor, kline_theoretical_win_rate, \
             kline_close_win_rate, avg_hourly_return_pct, max_hourly_return_pct, \
             min_hourly_return_pct, avg_max_profit_pct, avg_max_drawdown_pct, \
             avg_final_pnl_pct, calculated_at
             FROM statistics
             WHERE period = ?1 AND strategy IS ?2 AND symbol IS ?3
             ORDER BY calculated_at DESC LIMIT ?4",
        )?;
        let items = stmt
            .query_map(
                params![period.as_str(), scope.strategy, scope.symbol, limit],
                row_to_statistics,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn distinct_strategies(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT strategy FROM signals ORDER BY strategy")?;
        let items = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn distinct_symbols(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM signals ORDER BY symbol")?;
        let items = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn closed_without_outcome(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.signal_id FROM signals s
             LEFT JOIN signal_outcomes o ON o.signal_id = s.signal_id
             WHERE s.status = 'CLOSED' AND o.signal_id IS NULL",
        )?;
        let items = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn flag_for_review(&self, signal_id: &str, reason: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE signals SET needs_review = 1, review_reason = ?2 WHERE signal_id = ?1",
            params![signal_id, reason],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("signal {signal_id}")));
        }
        Ok(())
    }
}
