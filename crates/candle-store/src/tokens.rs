use anyhow::Result;
use trading_core::{AdditionSource, TokenStatus, TrackedToken};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct TrackedTokenRow {
    trackedtokenid: i64,
    tokenaddress: String,
    symbol: String,
    name: String,
    pairaddress: String,
    paircreatedtime: i64,
    additionsource: String,
    addedby: Option<String>,
    status: String,
    enabledat: Option<i64>,
    disabledat: Option<i64>,
}

impl From<TrackedTokenRow> for TrackedToken {
    fn from(r: TrackedTokenRow) -> Self {
        TrackedToken {
            token_id: r.trackedtokenid,
            token_address: r.tokenaddress,
            symbol: r.symbol,
            name: r.name,
            pair_address: r.pairaddress,
            pair_created_time: r.paircreatedtime,
            addition_source: if r.additionsource == "Manual" {
                AdditionSource::Manual
            } else {
                AdditionSource::Automatic
            },
            status: if r.status == "Active" {
                TokenStatus::Active
            } else {
                TokenStatus::Disabled
            },
            enabled_at: r.enabledat,
            disabled_at: r.disabledat,
            added_by: r.addedby,
        }
    }
}

impl Db {
    /// Insert a newly discovered or manually added token. Returns the
    /// generated row id. `UNIQUE(tokenaddress)` rejects duplicates.
    pub async fn insert_token(
        &self,
        token_address: &str,
        symbol: &str,
        name: &str,
        pair_address: &str,
        pair_created_time: i64,
        addition_source: AdditionSource,
        added_by: Option<&str>,
        now: i64,
    ) -> Result<i64> {
        let source_str = match addition_source {
            AdditionSource::Manual => "Manual",
            AdditionSource::Automatic => "Automatic",
        };

        // Re-adding a previously disabled token re-activates it and clears
        // `disabledat` instead of rejecting the duplicate (§3: "at most one
        // ACTIVE row per tokenAddress; re-adding an existing row
        // re-activates and clears disabledAt").
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO trackedtokens
                (tokenaddress, symbol, name, pairaddress, paircreatedtime,
                 additionsource, addedby, status, enabledat, createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'Active', ?, ?, ?)
            ON CONFLICT(tokenaddress) DO UPDATE SET
                status = 'Active',
                disabledat = NULL,
                enabledat = excluded.enabledat,
                lastupdatedat = excluded.lastupdatedat
            RETURNING trackedtokenid
            "#,
        )
        .bind(token_address)
        .bind(symbol)
        .bind(name)
        .bind(pair_address)
        .bind(pair_created_time)
        .bind(source_str)
        .bind(added_by)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    pub async fn get_token_by_address(&self, token_address: &str) -> Result<Option<TrackedToken>> {
        let row = sqlx::query_as::<_, TrackedTokenRow>(
            "SELECT trackedtokenid, tokenaddress, symbol, name, pairaddress, paircreatedtime,
                    additionsource, addedby, status, enabledat, disabledat
             FROM trackedtokens WHERE tokenaddress = ?",
        )
        .bind(token_address)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(TrackedToken::from))
    }

    pub async fn list_active_tokens(&self) -> Result<Vec<TrackedToken>> {
        let rows = sqlx::query_as::<_, TrackedTokenRow>(
            "SELECT trackedtokenid, tokenaddress, symbol, name, pairaddress, paircreatedtime,
                    additionsource, addedby, status, enabledat, disabledat
             FROM trackedtokens WHERE status = 'Active'",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(TrackedToken::from).collect())
    }

    pub async fn disable_token(&self, token_address: &str, disabled_by: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE trackedtokens SET status = 'Disabled', disabledat = ?, disabledby = ?, lastupdatedat = ?
             WHERE tokenaddress = ?",
        )
        .bind(now)
        .bind(disabled_by)
        .bind(now)
        .bind(token_address)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
