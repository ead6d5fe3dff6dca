use serde::{Deserialize, Serialize};

/// A fixed-interval OHLCV price bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    /// Unix timestamp (milliseconds) when the bar opened.
    pub open_time: i64,
    /// Unix timestamp (milliseconds) when the bar closed.
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    /// Whether the bar has completed as of `now`.
    pub fn is_closed(&self, now: i64) -> bool {
        self.close_time <= now
    }
}

/// Kline sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KlineInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    #[default]
    OneHour,
    FourHours,
    OneDay,
}

impl KlineInterval {
    /// Parse from the exchange-style shorthand ("1m", "1h", ...).
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "1h" => Some(Self::OneHour),
            "4h" => Some(Self::FourHours),
            "1d" => Some(Self::OneDay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }

    /// Bar width in milliseconds.
    pub fn millis(&self) -> i64 {
        match self {
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 300_000,
            Self::FifteenMinutes => 900_000,
            Self::OneHour => 3_600_000,
            Self::FourHours => 14_400_000,
            Self::OneDay => 86_400_000,
        }
    }

    /// Align a timestamp down to the open of its bar.
    pub fn align_down(&self, ts: i64) -> i64 {
        ts / self.millis() * self.millis()
    }
}
