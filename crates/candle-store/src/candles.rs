use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use trading_core::{OHLCVCandle, Timeframe, Trend};

use crate::db::Db;

fn dec_opt(s: Option<String>) -> Option<Decimal> {
    s.and_then(|v| Decimal::from_str(&v).ok())
}

fn trend_opt(s: Option<String>) -> Option<Trend> {
    s.and_then(|v| match v.as_str() {
        "Bullish" => Some(Trend::Bullish),
        "Bearish" => Some(Trend::Bearish),
        "Neutral" => Some(Trend::Neutral),
        _ => None,
    })
}

fn trend_str(t: Trend) -> &'static str {
    match t {
        Trend::Bullish => "Bullish",
        Trend::Bearish => "Bearish",
        Trend::Neutral => "Neutral",
    }
}

#[derive(sqlx::FromRow)]
struct CandleRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    unixtime: i64,
    timebucket: i64,
    openprice: String,
    highprice: String,
    lowprice: String,
    closeprice: String,
    volume: String,
    trades: i64,
    datasource: String,
    iscomplete: i64,
    vwapvalue: Option<String>,
    avwapvalue: Option<String>,
    ema12: Option<String>,
    ema21: Option<String>,
    ema34: Option<String>,
    rsi: Option<String>,
    stochrsi: Option<String>,
    stochk: Option<String>,
    stochd: Option<String>,
    trend: Option<String>,
    status: Option<String>,
    trend12: Option<String>,
    status12: Option<String>,
}

impl From<CandleRow> for OHLCVCandle {
    fn from(r: CandleRow) -> Self {
        OHLCVCandle {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            unix_time: r.unixtime,
            time_bucket: r.timebucket,
            open: Decimal::from_str(&r.openprice).unwrap_or_default(),
            high: Decimal::from_str(&r.highprice).unwrap_or_default(),
            low: Decimal::from_str(&r.lowprice).unwrap_or_default(),
            close: Decimal::from_str(&r.closeprice).unwrap_or_default(),
            volume: Decimal::from_str(&r.volume).unwrap_or_default(),
            trades: r.trades,
            is_complete: r.iscomplete != 0,
            data_source: r.datasource,
            vwap_value: dec_opt(r.vwapvalue),
            avwap_value: dec_opt(r.avwapvalue),
            ema12: dec_opt(r.ema12),
            ema21: dec_opt(r.ema21),
            ema34: dec_opt(r.ema34),
            rsi: dec_opt(r.rsi),
            stoch_rsi: dec_opt(r.stochrsi),
            stoch_k: dec_opt(r.stochk),
            stoch_d: dec_opt(r.stochd),
            trend: trend_opt(r.trend),
            status: r.status,
            trend12: trend_opt(r.trend12),
            status12: r.status12,
        }
    }
}

const CANDLE_COLUMNS: &str = "tokenaddress, pairaddress, timeframe, unixtime, timebucket,
     openprice, highprice, lowprice, closeprice, volume, trades, datasource, iscomplete,
     vwapvalue, avwapvalue, ema12, ema21, ema34, rsi, stochrsi, stochk, stochd,
     trend, status, trend12, status12";

impl Db {
    /// Idempotent insert of a completed bar. A duplicate `(tokenaddress,
    /// timeframe, unixtime)` is silently ignored rather than rejected,
    /// since vendor pagination windows can overlap across ticks.
    pub async fn upsert_candle(&self, candle: &OHLCVCandle, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ohlcvdetails
                (tokenaddress, pairaddress, timeframe, unixtime, timebucket,
                 openprice, highprice, lowprice, closeprice, volume, trades, datasource, iscomplete,
                 createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe, unixtime) DO NOTHING
            "#,
        )
        .bind(&candle.token_address)
        .bind(&candle.pair_address)
        .bind(candle.timeframe.as_str())
        .bind(candle.unix_time)
        .bind(candle.time_bucket)
        .bind(candle.open.to_string())
        .bind(candle.high.to_string())
        .bind(candle.low.to_string())
        .bind(candle.close.to_string())
        .bind(candle.volume.to_string())
        .bind(candle.trades)
        .bind(&candle.data_source)
        .bind(candle.is_complete as i64)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Write the indicator columns computed for a bar that already exists.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_indicators(&self, candle: &OHLCVCandle, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ohlcvdetails SET
                vwapvalue = ?, avwapvalue = ?, ema12 = ?, ema21 = ?, ema34 = ?,
                rsi = ?, stochrsi = ?, stochk = ?, stochd = ?,
                trend = ?, status = ?, trend12 = ?, status12 = ?, lastupdatedat = ?
            WHERE tokenaddress = ? AND timeframe = ? AND unixtime = ?
            "#,
        )
        .bind(candle.vwap_value.map(|d| d.to_string()))
        .bind(candle.avwap_value.map(|d| d.to_string()))
        .bind(candle.ema12.map(|d| d.to_string()))
        .bind(candle.ema21.map(|d| d.to_string()))
        .bind(candle.ema34.map(|d| d.to_string()))
        .bind(candle.rsi.map(|d| d.to_string()))
        .bind(candle.stoch_rsi.map(|d| d.to_string()))
        .bind(candle.stoch_k.map(|d| d.to_string()))
        .bind(candle.stoch_d.map(|d| d.to_string()))
        .bind(candle.trend.map(trend_str))
        .bind(&candle.status)
        .bind(candle.trend12.map(trend_str))
        .bind(&candle.status12)
        .bind(now)
        .bind(&candle.token_address)
        .bind(candle.timeframe.as_str())
        .bind(candle.unix_time)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn latest_candle(&self, token_address: &str, timeframe: Timeframe) -> Result<Option<OHLCVCandle>> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM ohlcvdetails
             WHERE tokenaddress = ? AND timeframe = ?
             ORDER BY unixtime DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(token_address)
            .bind(timeframe.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(OHLCVCandle::from))
    }

    pub async fn candles_since(
        &self,
        token_address: &str,
        timeframe: Timeframe,
        since_unix: i64,
    ) -> Result<Vec<OHLCVCandle>> {
        let sql = format!(
            "SELECT {CANDLE_COLUMNS} FROM ohlcvdetails
             WHERE tokenaddress = ? AND timeframe = ? AND unixtime > ?
             ORDER BY unixtime ASC"
        );
        let rows = sqlx::query_as::<_, CandleRow>(&sql)
            .bind(token_address)
            .bind(timeframe.as_str())
            .bind(since_unix)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(OHLCVCandle::from).collect())
    }
}
