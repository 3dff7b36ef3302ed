use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use trading_core::{Timeframe, VWAPSession};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct VwapRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    sessionstartunix: i64,
    sessionendunix: i64,
    cumulativepv: String,
    cumulativevolume: String,
    currentvwap: String,
    lastcandleunix: i64,
    nextcandlefetch: i64,
}

impl From<VwapRow> for VWAPSession {
    fn from(r: VwapRow) -> Self {
        VWAPSession {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            session_start_unix: r.sessionstartunix,
            session_end_unix: r.sessionendunix,
            cumulative_pv: Decimal::from_str(&r.cumulativepv).unwrap_or_default(),
            cumulative_volume: Decimal::from_str(&r.cumulativevolume).unwrap_or_default(),
            current_vwap: Decimal::from_str(&r.currentvwap).unwrap_or_default(),
            last_candle_unix: r.lastcandleunix,
            next_candle_fetch: r.nextcandlefetch,
        }
    }
}

impl Db {
    pub async fn get_vwap_session(&self, token_address: &str, timeframe: Timeframe) -> Result<Option<VWAPSession>> {
        let row = sqlx::query_as::<_, VwapRow>(
            "SELECT tokenaddress, pairaddress, timeframe, sessionstartunix, sessionendunix,
                    cumulativepv, cumulativevolume, currentvwap, lastcandleunix, nextcandlefetch
             FROM vwapsessions WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(VWAPSession::from))
    }

    pub async fn put_vwap_session(&self, s: &VWAPSession, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vwapsessions
                (tokenaddress, pairaddress, timeframe, sessionstartunix, sessionendunix,
                 cumulativepv, cumulativevolume, currentvwap, lastcandleunix, nextcandlefetch,
                 createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe) DO UPDATE SET
                sessionstartunix = excluded.sessionstartunix,
                sessionendunix = excluded.sessionendunix,
                cumulativepv = excluded.cumulativepv,
                cumulativevolume = excluded.cumulativevolume,
                currentvwap = excluded.currentvwap,
                lastcandleunix = excluded.lastcandleunix,
                nextcandlefetch = excluded.nextcandlefetch,
                lastupdatedat = excluded.lastupdatedat
            "#,
        )
        .bind(&s.token_address)
        .bind(&s.pair_address)
        .bind(s.timeframe.as_str())
        .bind(s.session_start_unix)
        .bind(s.session_end_unix)
        .bind(s.cumulative_pv.to_string())
        .bind(s.cumulative_volume.to_string())
        .bind(s.current_vwap.to_string())
        .bind(s.last_candle_unix)
        .bind(s.next_candle_fetch)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
