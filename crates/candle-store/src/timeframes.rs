use anyhow::Result;
use trading_core::{Timeframe, TimeframeRecord};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct TimeframeRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    nextfetchat: i64,
    lastfetchedat: i64,
    isactive: i64,
}

impl From<TimeframeRow> for TimeframeRecord {
    fn from(r: TimeframeRow) -> Self {
        TimeframeRecord {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            next_fetch_at: r.nextfetchat,
            last_fetched_at: r.lastfetchedat,
            is_active: r.isactive != 0,
        }
    }
}

impl Db {
    /// Seed scheduling state for a freshly tracked (token, timeframe) pair.
    pub async fn init_timeframe(
        &self,
        token_address: &str,
        pair_address: &str,
        timeframe: Timeframe,
        next_fetch_at: i64,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO timeframemetadata
                (tokenaddress, pairaddress, timeframe, nextfetchat, lastfetchedat, isactive, createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, 0, 1, ?, ?)
            ON CONFLICT(tokenaddress, timeframe) DO NOTHING
            "#,
        )
        .bind(token_address)
        .bind(pair_address)
        .bind(timeframe.as_str())
        .bind(next_fetch_at)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Every (token, timeframe) due this tick: `isActive AND token.status =
    /// 'Active' AND nextFetchAt <= now - bufferSeconds` (§4.3). The buffer
    /// holds back tokens whose `pairCreatedTime` is so recent that even
    /// their first candle would still be incomplete.
    pub async fn due_timeframes(&self, now: i64, fetch_buffer_seconds: i64) -> Result<Vec<TimeframeRecord>> {
        let cutoff = now - fetch_buffer_seconds;

        let rows = sqlx::query_as::<_, TimeframeRow>(
            "SELECT tf.tokenaddress, tf.pairaddress, tf.timeframe, tf.nextfetchat, tf.lastfetchedat, tf.isactive
             FROM timeframemetadata tf
             JOIN trackedtokens t ON t.tokenaddress = tf.tokenaddress
             WHERE tf.isactive = 1 AND t.status = 'Active' AND tf.nextfetchat <= ?
             ORDER BY tf.nextfetchat ASC",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(TimeframeRecord::from).collect())
    }

    pub async fn advance_next_fetch(
        &self,
        token_address: &str,
        timeframe: Timeframe,
        next_fetch_at: i64,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE timeframemetadata SET nextfetchat = ?, lastfetchedat = ?, lastupdatedat = ?
             WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(next_fetch_at)
        .bind(now)
        .bind(now)
        .bind(token_address)
        .bind(timeframe.as_str())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn deactivate_timeframe(&self, token_address: &str, timeframe: Timeframe, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE timeframemetadata SET isactive = 0, lastupdatedat = ? WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(now)
        .bind(token_address)
        .bind(timeframe.as_str())
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
