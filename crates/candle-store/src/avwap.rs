use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use trading_core::{AVWAPState, Timeframe};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct AvwapRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    avwap: String,
    cumulativepv: String,
    cumulativevolume: String,
    lastupdatedunix: i64,
    nextfetchtime: i64,
}

impl From<AvwapRow> for AVWAPState {
    fn from(r: AvwapRow) -> Self {
        AVWAPState {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            avwap: Decimal::from_str(&r.avwap).unwrap_or_default(),
            cumulative_pv: Decimal::from_str(&r.cumulativepv).unwrap_or_default(),
            cumulative_volume: Decimal::from_str(&r.cumulativevolume).unwrap_or_default(),
            last_updated_unix: r.lastupdatedunix,
            next_fetch_time: r.nextfetchtime,
        }
    }
}

impl Db {
    pub async fn get_avwap_state(&self, token_address: &str, timeframe: Timeframe) -> Result<Option<AVWAPState>> {
        let row = sqlx::query_as::<_, AvwapRow>(
            "SELECT tokenaddress, pairaddress, timeframe, avwap, cumulativepv, cumulativevolume,
                    lastupdatedunix, nextfetchtime
             FROM avwapstates WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(AVWAPState::from))
    }

    pub async fn put_avwap_state(&self, s: &AVWAPState, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO avwapstates
                (tokenaddress, pairaddress, timeframe, avwap, cumulativepv, cumulativevolume,
                 lastupdatedunix, nextfetchtime, createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe) DO UPDATE SET
                avwap = excluded.avwap,
                cumulativepv = excluded.cumulativepv,
                cumulativevolume = excluded.cumulativevolume,
                lastupdatedunix = excluded.lastupdatedunix,
                nextfetchtime = excluded.nextfetchtime,
                lastupdatedat = excluded.lastupdatedat
            "#,
        )
        .bind(&s.token_address)
        .bind(&s.pair_address)
        .bind(s.timeframe.as_str())
        .bind(s.avwap.to_string())
        .bind(s.cumulative_pv.to_string())
        .bind(s.cumulative_volume.to_string())
        .bind(s.last_updated_unix)
        .bind(s.next_fetch_time)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
