use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use trading_core::{Alert, AvwapPricePosition, Timeframe, Trend};

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
struct AlertRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    vwap: Option<String>,
    avwap: Option<String>,
    ema12: Option<String>,
    ema21: Option<String>,
    ema34: Option<String>,
    rsi: Option<String>,
    stochk: Option<String>,
    stochd: Option<String>,
    trend: Option<String>,
    status: Option<String>,
    trend12: Option<String>,
    status12: Option<String>,
    touchcount: i64,
    latesttouchunix: Option<i64>,
    touchcount12: i64,
    latesttouchunix12: Option<i64>,
    avwappriceposition: Option<String>,
    lastupdatedunix: i64,
}

impl From<AlertRow> for Alert {
    fn from(r: AlertRow) -> Self {
        Alert {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            vwap: dec_opt(r.vwap),
            avwap: dec_opt(r.avwap),
            ema12: dec_opt(r.ema12),
            ema21: dec_opt(r.ema21),
            ema34: dec_opt(r.ema34),
            rsi: dec_opt(r.rsi),
            stoch_k: dec_opt(r.stochk),
            stoch_d: dec_opt(r.stochd),
            trend: trend_opt(r.trend),
            status: r.status,
            trend12: trend_opt(r.trend12),
            status12: r.status12,
            touch_count: r.touchcount as i32,
            latest_touch_unix: r.latesttouchunix,
            touch_count12: r.touchcount12 as i32,
            latest_touch_unix12: r.latesttouchunix12,
            avwap_price_position: r.avwappriceposition.and_then(|v| match v.as_str() {
                "Below" => Some(AvwapPricePosition::Below),
                "Above" => Some(AvwapPricePosition::Above),
                _ => None,
            }),
            last_updated_unix: r.lastupdatedunix,
        }
    }
}

impl Db {
    pub async fn get_alert_state(&self, token_address: &str, timeframe: Timeframe) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT tokenaddress, pairaddress, timeframe, vwap, avwap, ema12, ema21, ema34, rsi,
                    stochk, stochd, trend, status, trend12, status12, touchcount, latesttouchunix,
                    touchcount12, latesttouchunix12, avwappriceposition, lastupdatedunix
             FROM alerts WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Alert::from))
    }

    pub async fn put_alert_state(&self, a: &Alert, now: i64) -> Result<()> {
        let avwap_pos = a.avwap_price_position.map(|p| match p {
            AvwapPricePosition::Below => "Below",
            AvwapPricePosition::Above => "Above",
        });

        sqlx::query(
            r#"
            INSERT INTO alerts
                (tokenaddress, pairaddress, timeframe, vwap, avwap, ema12, ema21, ema34, rsi,
                 stochk, stochd, trend, status, trend12, status12, touchcount, latesttouchunix,
                 touchcount12, latesttouchunix12, avwappriceposition, lastupdatedunix,
                 createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe) DO UPDATE SET
                vwap = excluded.vwap,
                avwap = excluded.avwap,
                ema12 = excluded.ema12,
                ema21 = excluded.ema21,
                ema34 = excluded.ema34,
                rsi = excluded.rsi,
                stochk = excluded.stochk,
                stochd = excluded.stochd,
                trend = excluded.trend,
                status = excluded.status,
                trend12 = excluded.trend12,
                status12 = excluded.status12,
                touchcount = excluded.touchcount,
                latesttouchunix = excluded.latesttouchunix,
                touchcount12 = excluded.touchcount12,
                latesttouchunix12 = excluded.latesttouchunix12,
                avwappriceposition = excluded.avwappriceposition,
                lastupdatedunix = excluded.lastupdatedunix,
                lastupdatedat = excluded.lastupdatedat
            "#,
        )
        .bind(&a.token_address)
        .bind(&a.pair_address)
        .bind(a.timeframe.as_str())
        .bind(a.vwap.map(|d| d.to_string()))
        .bind(a.avwap.map(|d| d.to_string()))
        .bind(a.ema12.map(|d| d.to_string()))
        .bind(a.ema21.map(|d| d.to_string()))
        .bind(a.ema34.map(|d| d.to_string()))
        .bind(a.rsi.map(|d| d.to_string()))
        .bind(a.stoch_k.map(|d| d.to_string()))
        .bind(a.stoch_d.map(|d| d.to_string()))
        .bind(a.trend.map(trend_str))
        .bind(&a.status)
        .bind(a.trend12.map(trend_str))
        .bind(&a.status12)
        .bind(a.touch_count as i64)
        .bind(a.latest_touch_unix)
        .bind(a.touch_count12 as i64)
        .bind(a.latest_touch_unix12)
        .bind(avwap_pos)
        .bind(a.last_updated_unix)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
