use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical bar widths the core understands. Any other timeframe string
/// seen on the wire is ignored by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    FifteenMin,
    OneHour,
    FourHour,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::FifteenMin, Timeframe::OneHour, Timeframe::FourHour];

    /// Width of the bar in seconds.
    pub fn tf_sec(self) -> i64 {
        match self {
            Timeframe::FifteenMin => 900,
            Timeframe::OneHour => 3600,
            Timeframe::FourHour => 14_400,
        }
    }

    /// Internal canonical string, used as the database/column discriminant.
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
        }
    }

    pub fn from_str(s: &str) -> Option<Timeframe> {
        match s {
            "15m" => Some(Timeframe::FifteenMin),
            "1h" => Some(Timeframe::OneHour),
            "4h" => Some(Timeframe::FourHour),
            _ => None,
        }
    }

    /// Floor-align a unix timestamp to this timeframe's bucket start.
    pub fn floor_align(self, unix_time: i64) -> i64 {
        let tf = self.tf_sec();
        (unix_time.div_euclid(tf)) * tf
    }

    /// The start of the bar currently in progress at `now`; any bar whose
    /// own start is `>=` this value is not yet complete.
    pub fn current_candle_start(self, now: i64) -> i64 {
        self.floor_align(now)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
