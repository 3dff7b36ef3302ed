use anyhow::Result;
use trading_core::{RSIState, RsiStatus, Timeframe};

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct RsiRow {
    tokenaddress: String,
    pairaddress: String,
    timeframe: String,
    rsiinterval: i64,
    stochrsiinterval: i64,
    kinterval: i64,
    dinterval: i64,
    avggain: f64,
    avgloss: f64,
    seedgains: String,
    seedlosses: String,
    lastcloseprice: Option<f64>,
    rsivalue: Option<f64>,
    rsivalues: String,
    stochrsivalues: String,
    kvalues: String,
    stochrsivalue: Option<f64>,
    kvalue: Option<f64>,
    dvalue: Option<f64>,
    rsiavailabletime: i64,
    lastupdatedunix: i64,
    status: String,
}

impl From<RsiRow> for RSIState {
    fn from(r: RsiRow) -> Self {
        RSIState {
            token_address: r.tokenaddress,
            pair_address: r.pairaddress,
            timeframe: Timeframe::from_str(&r.timeframe).expect("known timeframe in storage"),
            rsi_interval: r.rsiinterval as u32,
            stoch_rsi_interval: r.stochrsiinterval as u32,
            k_interval: r.kinterval as u32,
            d_interval: r.dinterval as u32,
            avg_gain: r.avggain,
            avg_loss: r.avgloss,
            seed_gains: serde_json::from_str(&r.seedgains).unwrap_or_default(),
            seed_losses: serde_json::from_str(&r.seedlosses).unwrap_or_default(),
            last_close_price: r.lastcloseprice,
            rsi_value: r.rsivalue,
            rsi_values: serde_json::from_str(&r.rsivalues).unwrap_or_default(),
            stoch_rsi_values: serde_json::from_str(&r.stochrsivalues).unwrap_or_default(),
            k_values: serde_json::from_str(&r.kvalues).unwrap_or_default(),
            stoch_rsi_value: r.stochrsivalue,
            k_value: r.kvalue,
            d_value: r.dvalue,
            rsi_available_time: r.rsiavailabletime,
            last_updated_unix: r.lastupdatedunix,
            status: if r.status == "Available" {
                RsiStatus::Available
            } else {
                RsiStatus::Building
            },
        }
    }
}

impl Db {
    pub async fn get_rsi_state(&self, token_address: &str, timeframe: Timeframe) -> Result<Option<RSIState>> {
        let row = sqlx::query_as::<_, RsiRow>(
            "SELECT tokenaddress, pairaddress, timeframe, rsiinterval, stochrsiinterval, kinterval, dinterval,
                    avggain, avgloss, seedgains, seedlosses, lastcloseprice, rsivalue, rsivalues,
                    stochrsivalues, kvalues, stochrsivalue, kvalue, dvalue, rsiavailabletime,
                    lastupdatedunix, status
             FROM rsistates WHERE tokenaddress = ? AND timeframe = ?",
        )
        .bind(token_address)
        .bind(timeframe.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(RSIState::from))
    }

    pub async fn put_rsi_state(&self, s: &RSIState, now: i64) -> Result<()> {
        let status_str = match s.status {
            RsiStatus::Available => "Available",
            RsiStatus::Building => "Building",
        };

        sqlx::query(
            r#"
            INSERT INTO rsistates
                (tokenaddress, pairaddress, timeframe, rsiinterval, stochrsiinterval, kinterval, dinterval,
                 avggain, avgloss, seedgains, seedlosses, lastcloseprice, rsivalue, rsivalues,
                 stochrsivalues, kvalues, stochrsivalue, kvalue, dvalue, rsiavailabletime,
                 lastupdatedunix, status, createdat, lastupdatedat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tokenaddress, timeframe) DO UPDATE SET
                avggain = excluded.avggain,
                avgloss = excluded.avgloss,
                seedgains = excluded.seedgains,
                seedlosses = excluded.seedlosses,
                lastcloseprice = excluded.lastcloseprice,
                rsivalue = excluded.rsivalue,
                rsivalues = excluded.rsivalues,
                stochrsivalues = excluded.stochrsivalues,
                kvalues = excluded.kvalues,
                stochrsivalue = excluded.stochrsivalue,
                kvalue = excluded.kvalue,
                dvalue = excluded.dvalue,
                lastupdatedunix = excluded.lastupdatedunix,
                status = excluded.status,
                lastupdatedat = excluded.lastupdatedat
            "#,
        )
        .bind(&s.token_address)
        .bind(&s.pair_address)
        .bind(s.timeframe.as_str())
        .bind(s.rsi_interval as i64)
        .bind(s.stoch_rsi_interval as i64)
        .bind(s.k_interval as i64)
        .bind(s.d_interval as i64)
        .bind(s.avg_gain)
        .bind(s.avg_loss)
        .bind(serde_json::to_string(&s.seed_gains)?)
        .bind(serde_json::to_string(&s.seed_losses)?)
        .bind(s.last_close_price)
        .bind(s.rsi_value)
        .bind(serde_json::to_string(&s.rsi_values)?)
        .bind(serde_json::to_string(&s.stoch_rsi_values)?)
        .bind(serde_json::to_string(&s.k_values)?)
        .bind(s.stoch_rsi_value)
        .bind(s.k_value)
        .bind(s.d_value)
        .bind(s.rsi_available_time)
        .bind(s.last_updated_unix)
        .bind(status_str)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
