use anyhow::Result;

use crate::db::Db;

/// A row in the outbound notification log, written before dispatch so a
/// crashed delivery attempt is retried rather than lost.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub source: String,
    pub chatgroup: String,
    pub content: String,
    pub status: String,
    pub tokenaddress: Option<String>,
    pub strategytype: Option<String>,
}

impl Db {
    pub async fn log_notification(
        &self,
        source: &str,
        chatgroup: &str,
        content: &str,
        token_address: Option<&str>,
        strategy_type: Option<&str>,
        now: i64,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO notification (source, chatgroup, content, status, tokenaddress, strategytype, createdat)
            VALUES (?, ?, ?, 'pending', ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(source)
        .bind(chatgroup)
        .bind(content)
        .bind(token_address)
        .bind(strategy_type)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    pub async fn mark_notification_sent(&self, id: i64, now: i64) -> Result<()> {
        sqlx::query("UPDATE notification SET status = 'sent', sentat = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn mark_notification_failed(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE notification SET status = 'failed', errordetails = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn pending_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, source, chatgroup, content, status, tokenaddress, strategytype
             FROM notification WHERE status = 'pending' ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
