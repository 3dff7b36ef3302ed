use candle_store::Db;
use std::collections::HashMap;
use trading_core::{ApiCredential, IngestError, IngestResult};

/// In-memory credit accounting for one fetch session (§4.1). Credits are
/// decremented locally on every call; the net delta per key is flushed to
/// the store exactly once, whether the session finishes cleanly or aborts
/// partway through a page.
pub struct CreditSession<'a> {
    db: &'a Db,
    service_name: String,
    credits_per_call: i64,
    current_key: Option<ApiCredential>,
    used_by_key: HashMap<i64, i64>,
    /// Keys this session has already spent below threshold. A fetch
    /// session only flushes deductions once at the end (§4.1), so the
    /// store still reports an exhausted key's original balance; without
    /// this exclusion list a re-query would hand the same key straight
    /// back (§8 S6).
    exhausted: Vec<i64>,
}

impl<'a> CreditSession<'a> {
    pub fn new(db: &'a Db, service_name: impl Into<String>, credits_per_call: i64) -> Self {
        Self {
            db,
            service_name: service_name.into(),
            credits_per_call,
            current_key: None,
            used_by_key: HashMap::new(),
            exhausted: Vec::new(),
        }
    }

    /// Ensure the active key can afford one more call, rotating to
    /// another key if the current one is running low. If no other key
    /// clears the threshold, a fetch already in flight keeps drawing on
    /// the current key rather than aborting mid-page (§8 S6) — only a
    /// session with no key at all fails with `NoCredits`.
    pub async fn ensure_key(&mut self) -> IngestResult<&ApiCredential> {
        let needs_new = match &self.current_key {
            Some(k) => k.available_credits < self.credits_per_call,
            None => true,
        };

        if needs_new {
            if let Some(k) = &self.current_key {
                if !self.exhausted.contains(&k.id) {
                    self.exhausted.push(k.id);
                }
            }

            let found = self
                .db
                .next_valid_api_key_excluding(&self.service_name, self.credits_per_call, &self.exhausted)
                .await
                .map_err(|e| IngestError::NoCredits(e.to_string()))?;

            match found {
                Some(key) => self.current_key = Some(key),
                None if self.current_key.is_some() => {}
                None => {
                    return Err(IngestError::NoCredits(format!(
                        "no {} key with >= {} credits",
                        self.service_name, self.credits_per_call
                    )))
                }
            }
        }

        Ok(self.current_key.as_ref().expect("just populated"))
    }

    /// Record that a call was just made against the active key.
    pub fn consume(&mut self) {
        if let Some(key) = self.current_key.as_mut() {
            key.available_credits -= self.credits_per_call;
            *self.used_by_key.entry(key.id).or_insert(0) += self.credits_per_call;
        }
    }

    pub fn total_credits_used(&self) -> i64 {
        self.used_by_key.values().sum()
    }

    /// Batch-settle every key's accumulated delta. Called once at the end
    /// of a fetch session regardless of success or failure.
    pub async fn flush(&self, now: i64) -> anyhow::Result<()> {
        for (&key_id, &credits) in &self.used_by_key {
            if credits > 0 {
                self.db.deduct_api_key_credits(key_id, credits, now).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: two keys {250, 500}, creditsPerCall = 150, a 5-page fetch.
    /// Page 1 uses key one (250 -> 100, below threshold); pages 2-5 all
    /// land on key two, which only started with 500 but still absorbs
    /// all four remaining pages (600 total) since nothing else in the
    /// pool clears the threshold once it's running.
    #[tokio::test]
    async fn credit_exhaustion_mid_fetch_overdraws_the_last_key() {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        db.register_credential("birdeye", "key-one", 250, None, 0).await.unwrap();
        db.register_credential("birdeye", "key-two", 500, None, 0).await.unwrap();

        let mut session = CreditSession::new(&db, "birdeye", 150);
        for _ in 0..5 {
            session.ensure_key().await.unwrap();
            session.consume();
        }
        session.flush(0).await.unwrap();

        assert_eq!(session.total_credits_used(), 750);

        let mut deltas: Vec<i64> = session.used_by_key.values().copied().collect();
        deltas.sort_unstable();
        assert_eq!(deltas, vec![150, 600]);
    }
}
