use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionSource {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    Active,
    Disabled,
}

/// Identity and lifecycle of one tracked trading pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedToken {
    pub token_id: i64,
    pub token_address: String,
    pub symbol: String,
    pub name: String,
    pub pair_address: String,
    pub pair_created_time: i64,
    pub addition_source: AdditionSource,
    pub status: TokenStatus,
    pub enabled_at: Option<i64>,
    pub disabled_at: Option<i64>,
    pub added_by: Option<String>,
}

/// Scheduling state for one (token, timeframe).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeRecord {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub next_fetch_at: i64,
    pub last_fetched_at: i64,
    pub is_active: bool,
}

impl TimeframeRecord {
    /// `nextFetchAt` at creation time, per the lifecycle rule in the data model.
    pub fn initial_next_fetch_at(pair_created_time: i64, timeframe: Timeframe) -> i64 {
        timeframe.floor_align(pair_created_time) + timeframe.tf_sec()
    }

    /// `nextFetchAt` after a successful fetch: the earliest time a bar
    /// strictly newer than `latest_time` is guaranteed complete.
    pub fn next_fetch_at_after(latest_time: i64, timeframe: Timeframe) -> i64 {
        timeframe.floor_align(latest_time) + 2 * timeframe.tf_sec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// One completed OHLCV bar, plus the indicator columns the engines fill in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OHLCVCandle {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub unix_time: i64,
    pub time_bucket: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trades: i64,
    pub is_complete: bool,
    pub data_source: String,

    pub vwap_value: Option<Decimal>,
    pub avwap_value: Option<Decimal>,
    pub ema12: Option<Decimal>,
    pub ema21: Option<Decimal>,
    pub ema34: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub stoch_rsi: Option<Decimal>,
    pub stoch_k: Option<Decimal>,
    pub stoch_d: Option<Decimal>,
    pub trend: Option<Trend>,
    pub status: Option<String>,
    pub trend12: Option<Trend>,
    pub status12: Option<String>,
}

impl OHLCVCandle {
    /// Validate the OHLCV invariants from the data model. Returns
    /// `DataInvalid` on the first violation found; callers drop the bar
    /// rather than propagate the error further up.
    pub fn validate(&self, now: i64) -> IngestResult<()> {
        if self.high < self.low {
            return Err(IngestError::DataInvalid(format!(
                "high {} < low {} at {}",
                self.high, self.low, self.unix_time
            )));
        }
        if self.high < self.open || self.high < self.close {
            return Err(IngestError::DataInvalid(format!(
                "high {} below open/close at {}",
                self.high, self.unix_time
            )));
        }
        if self.low > self.open || self.low > self.close {
            return Err(IngestError::DataInvalid(format!(
                "low {} above open/close at {}",
                self.low, self.unix_time
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(IngestError::DataInvalid(format!(
                "negative volume at {}",
                self.unix_time
            )));
        }
        if self.unix_time % self.timeframe.tf_sec() != 0 {
            return Err(IngestError::DataInvalid(format!(
                "unixTime {} not aligned to {}",
                self.unix_time,
                self.timeframe.as_str()
            )));
        }
        if self.unix_time >= self.timeframe.current_candle_start(now) {
            return Err(IngestError::DataInvalid(format!(
                "incomplete bar at {}",
                self.unix_time
            )));
        }
        Ok(())
    }
}

/// Daily session state for the VWAP engine, per (token, timeframe).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VWAPSession {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub session_start_unix: i64,
    pub session_end_unix: i64,
    pub cumulative_pv: Decimal,
    pub cumulative_volume: Decimal,
    pub current_vwap: Decimal,
    pub last_candle_unix: i64,
    pub next_candle_fetch: i64,
}

/// Open-ended anchored VWAP state, per (token, timeframe). Never resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AVWAPState {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub avwap: Decimal,
    pub cumulative_pv: Decimal,
    pub cumulative_volume: Decimal,
    pub last_updated_unix: i64,
    pub next_fetch_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmaStatus {
    NotAvailable,
    Available,
}

/// One row per (token, timeframe, period in {12, 21, 34}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EMAState {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub period: u32,
    pub ema_value: Option<Decimal>,
    pub status: EmaStatus,
    pub ema_available_time: i64,
    pub last_updated_unix: i64,
    pub next_fetch_time: i64,
}

impl EMAState {
    pub fn available_time(pair_created_time: i64, timeframe: Timeframe, period: u32) -> i64 {
        timeframe.floor_align(pair_created_time) + (period as i64 - 1) * timeframe.tf_sec()
    }

    pub fn multiplier(period: u32) -> f64 {
        2.0 / (period as f64 + 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiStatus {
    Building,
    Available,
}

/// Per-(token, timeframe) Wilder RSI + Stoch-RSI + %K + %D chain state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RSIState {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub rsi_interval: u32,
    pub stoch_rsi_interval: u32,
    pub k_interval: u32,
    pub d_interval: u32,
    pub avg_gain: f64,
    pub avg_loss: f64,
    /// First-window gain/loss samples, buffered only until `avg_gain`/
    /// `avg_loss` get their initial SMA seed; empty once `status` flips to
    /// `Available`.
    pub seed_gains: Vec<f64>,
    pub seed_losses: Vec<f64>,
    pub last_close_price: Option<f64>,
    pub rsi_value: Option<f64>,
    pub rsi_values: Vec<f64>,
    pub stoch_rsi_values: Vec<f64>,
    pub k_values: Vec<f64>,
    pub stoch_rsi_value: Option<f64>,
    pub k_value: Option<f64>,
    pub d_value: Option<f64>,
    pub rsi_available_time: i64,
    pub last_updated_unix: i64,
    pub status: RsiStatus,
}

impl RSIState {
    pub fn new(token_address: String, pair_address: String, timeframe: Timeframe, pair_created_time: i64) -> Self {
        let rsi_interval = 14;
        RSIState {
            token_address,
            pair_address,
            timeframe,
            rsi_interval,
            stoch_rsi_interval: 14,
            k_interval: 3,
            d_interval: 3,
            avg_gain: 0.0,
            avg_loss: 0.0,
            seed_gains: Vec::with_capacity(14),
            seed_losses: Vec::with_capacity(14),
            last_close_price: None,
            rsi_value: None,
            rsi_values: Vec::with_capacity(14),
            stoch_rsi_values: Vec::with_capacity(3),
            k_values: Vec::with_capacity(3),
            stoch_rsi_value: None,
            k_value: None,
            d_value: None,
            rsi_available_time: timeframe.floor_align(pair_created_time) + (rsi_interval as i64 + 1) * timeframe.tf_sec(),
            last_updated_unix: 0,
            status: RsiStatus::Building,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvwapPricePosition {
    Below,
    Above,
}

/// Per-(token, timeframe) alert state: one row, continually updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub token_address: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub vwap: Option<Decimal>,
    pub avwap: Option<Decimal>,
    pub ema12: Option<Decimal>,
    pub ema21: Option<Decimal>,
    pub ema34: Option<Decimal>,
    pub rsi: Option<Decimal>,
    pub stoch_k: Option<Decimal>,
    pub stoch_d: Option<Decimal>,
    pub trend: Option<Trend>,
    pub status: Option<String>,
    pub trend12: Option<Trend>,
    pub status12: Option<String>,
    pub touch_count: i32,
    pub latest_touch_unix: Option<i64>,
    pub touch_count12: i32,
    pub latest_touch_unix12: Option<i64>,
    pub avwap_price_position: Option<AvwapPricePosition>,
    pub last_updated_unix: i64,
}

/// The distinct alert events the engine can emit off a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    BullishCross,
    BearishCross,
    BandTouch,
    BullishCross12,
    BearishCross12,
    BandTouch12,
    AvwapBreakout,
    AvwapBreakdown,
    StochRsiOversold,
    StochRsiOverbought,
}

/// One rotating vendor API key and its remaining credit balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: i64,
    pub service_name: String,
    pub api_key: String,
    pub available_credits: i64,
    pub default_credits: i64,
    pub last_used_at: Option<i64>,
    pub last_reset_at: Option<i64>,
    pub next_reset_at: Option<i64>,
    pub reset_duration_days: Option<i64>,
}

/// A fully formed alert emission, ready to be logged and handed to a
/// notification channel. Market cap hydration is modeled as optional and
/// never required to emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub token_address: String,
    pub symbol: String,
    pub pair_address: String,
    pub timeframe: Timeframe,
    pub unix_time: i64,
    pub close: Decimal,
    pub touched_band: Option<String>,
    pub strategy_label: String,
    pub market_cap: Option<Decimal>,
}
