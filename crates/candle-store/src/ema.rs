use anyhow::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use trading_core::{EMAState, EmaStatus, Timeframe};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct EmaRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    period: i64,
    emavalue: Option<String>,
    status: String,
    emaavailabletime: i64,
    lastupdatedunix: i64,
    nextfetchtime: i64,
}

impl From<EmaRow> for EMAState {
    fn from(r: EmaRow) -> Self {
        EMAState {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            period: r.period as u32,
            ema_value: r.emavalue.and_then(|v| Decimal::from_str(&v).ok()),
            status: if r.status == "Available" {
                EmaStatus::Available
            } else {
                EmaStatus::NotAvailable
            },
            ema_available_time: r.emaavailabletime,
            last_updated_unix: r.lastupdatedunix,
            next_fetch_time: r.nextfetchtime,
        }
    }
}

impl Db {
    pub async fn get_ema_state(
        &self,
        token_address: &str,
        timeframe: Timeframe,
        period: u32,
    ) -> Result<Option<EMAState>> {
        let row = sqlx::query_as::<_, EmaRow>(
            "SELECT tokenaddress, pairaddress, timeframe, period, emavalue, status,
                    emaavailabletime, lastupdatedunix, nextfetchtime
             FROM emastates WHERE tokenaddress = ? AND timeframe = ? AND period = ?",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .bind(period as i64)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(EMAState::from))
    }

    pub async fn get_ema_states(&self, token_address: &str, timeframe: Timeframe) -> Result<Vec<EMAState>> {
        let rows = sqlx::query_as::<_, EmaRow>(
            "SELECT tokenaddress, pairaddress, timeframe, period, emavalue, status,
                    emaavailabletime, lastupdatedunix, nextfetchtime
             FROM emastates WHERE tokenaddress = ? AND timeframe = ? ORDER BY period ASC",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(EMAState::from).collect())
    }

    pub async fn put_ema_state(&self, s: &EMAState, now: i64) -> Result<()> {
        let status_str = match s.status {
            EmaStatus::Available => "Available",
            EmaStatus::NotAvailable => "NotAvailable",
        };

        sqlx::query(
            r#"
            INSERT INTO emastates
                (tokenaddress, pairaddress, timeframe, period, emavalue, status,
                 emaavailabletime, lastupdatedunix, nextfetchtime, createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe, period) DO UPDATE SET
                emavalue = excluded.emavalue,
                status = excluded.status,
                lastupdatedunix = excluded.lastupdatedunix,
                nextfetchtime = excluded.nextfetchtime,
                lastupdatedat = excluded.lastupdatedat
            "#,
        )
        .bind(&s.token_address)
        .bind(&s.pair_address)
        .bind(s.timeframe.as_str())
        .bind(s.period as i64)
        .bind(s.ema_value.map(|d| d.to_string()))
        .bind(status_str)
        .bind(s.ema_available_time)
        .bind(s.last_updated_unix)
        .bind(s.next_fetch_time)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
