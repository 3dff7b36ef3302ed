use anyhow::Result;
use trading_core::ApiCredential;

use crate::db::Db;

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    servicename: String,
    apikey: String,
    availablecredits: i64,
    defaultcredits: i64,
    lastusedat: Option<i64>,
    lastresetat: Option<i64>,
    nextresetat: Option<i64>,
    resetdurationdays: Option<i64>,
}

impl From<CredentialRow> for ApiCredential {
    fn from(r: CredentialRow) -> Self {
        ApiCredential {
            id: r.id,
            service_name: r.servicename,
            api_key: r.apikey,
            available_credits: r.availablecredits,
            default_credits: r.defaultcredits,
            last_used_at: r.lastusedat,
            last_reset_at: r.lastresetat,
            next_reset_at: r.nextresetat,
            reset_duration_days: r.resetdurationdays,
        }
    }
}

impl Db {
    /// Register a vendor API key. `reset_duration_days = None` means the
    /// key never auto-resets (BirdEye has no reset cadence in production).
    #[allow(clippy::too_many_arguments)]
    pub async fn register_credential(
        &self,
        service_name: &str,
        api_key: &str,
        default_credits: i64,
        reset_duration_days: Option<i64>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO servicecredentials
                (servicename, apikey, isactive, availablecredits, defaultcredits,
                 resetdurationdays, isresetavailable, createdat, updatedat)
            VALUES (?, ?, 1, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(servicename, apikey) DO NOTHING
            "#,
        )
        .bind(service_name)
        .bind(api_key)
        .bind(default_credits)
        .bind(default_credits)
        .bind(reset_duration_days)
        .bind(reset_duration_days.is_some() as i64)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// The least-recently-used active key for `service_name` that still
    /// carries at least `required_credits`. `NULL` lastusedat (never used)
    /// sorts first, same as the reference credential pool.
    pub async fn next_valid_api_key(
        &self,
        service_name: &str,
        required_credits: i64,
    ) -> Result<Option<ApiCredential>> {
        self.next_valid_api_key_excluding(service_name, required_credits, &[]).await
    }

    /// Same as `next_valid_api_key`, but skips the given ids. A fetch
    /// session deducts credits only in memory and flushes once at the end
    /// (§4.1), so a key this session has already spent below threshold
    /// would otherwise look untouched to a fresh query and get handed
    /// back again; the caller excludes it once its local balance runs
    /// out (§8 S6).
    pub async fn next_valid_api_key_excluding(
        &self,
        service_name: &str,
        required_credits: i64,
        excluded_ids: &[i64],
    ) -> Result<Option<ApiCredential>> {
        let placeholders = excluded_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = if excluded_ids.is_empty() {
            "SELECT id, servicename, apikey, availablecredits, defaultcredits,
                    lastusedat, lastresetat, nextresetat, resetdurationdays
             FROM servicecredentials
             WHERE servicename = ? AND isactive = 1 AND availablecredits >= ?
             ORDER BY lastusedat ASC
             LIMIT 1"
                .to_string()
        } else {
            format!(
                "SELECT id, servicename, apikey, availablecredits, defaultcredits,
                        lastusedat, lastresetat, nextresetat, resetdurationdays
                 FROM servicecredentials
                 WHERE servicename = ? AND isactive = 1 AND availablecredits >= ? AND id NOT IN ({placeholders})
                 ORDER BY lastusedat ASC
                 LIMIT 1"
            )
        };

        let mut query = sqlx::query_as::<_, CredentialRow>(&sql).bind(service_name).bind(required_credits);
        for id in excluded_ids {
            query = query.bind(id);
        }

        let row = query.fetch_optional(self.pool()).await?;
        Ok(row.map(ApiCredential::from))
    }

    pub async fn deduct_api_key_credits(&self, key_id: i64, credits_used: i64, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE servicecredentials SET availablecredits = availablecredits - ?, lastusedat = ?, updatedat = ?
             WHERE id = ?",
        )
        .bind(credits_used)
        .bind(now)
        .bind(now)
        .bind(key_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Refill every active, reset-eligible key whose `nextresetat` has
    /// elapsed, and push its next reset out by its own reset interval.
    pub async fn reset_credentials_due_for_reset(&self, now: i64) -> Result<u64> {
        let due = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, servicename, apikey, availablecredits, defaultcredits,
                    lastusedat, lastresetat, nextresetat, resetdurationdays
             FROM servicecredentials
             WHERE isactive = 1 AND isresetavailable = 1 AND nextresetat IS NOT NULL AND nextresetat <= ?",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        let count = due.len() as u64;
        for cred in due {
            let interval_days = cred.reset_duration_days.unwrap_or(0);
            let next_reset = now + interval_days * 86_400;

            sqlx::query(
                "UPDATE servicecredentials
                 SET availablecredits = ?, lastresetat = ?, nextresetat = ?, updatedat = ?
                 WHERE id = ?",
            )
            .bind(cred.defaultcredits)
            .bind(now)
            .bind(next_reset)
            .bind(now)
            .bind(cred.id)
            .execute(self.pool())
            .await?;
        }

        Ok(count)
    }
}
