//! Dispatches `AlertEvent`s to chat notification channels (§6, §9). Mirrors
//! the source deployment's one-handler-per-alert-kind shape: every event
//! formats a message, attaches deep-link buttons, logs a `notification` row
//! before sending, then flips it to `sent`/`failed` after the attempt.

use async_trait::async_trait;
use candle_store::Db;
use chrono::{TimeZone, Utc};
use trading_core::{AlertEvent, AlertKind};

mod deeplinks;
mod discord;
mod template;

pub use discord::DiscordWebhookNotifier;

/// One outbound button: a label plus the URL it opens.
#[derive(Debug, Clone)]
pub struct InlineButton {
    pub label: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// A collaborator that actually delivers a formatted message (§6). The
/// gateway itself only formats content and tracks delivery status; this
/// trait is the hand-off point to whatever chat platform is wired in.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, chat_identifier: &str, message: &str, buttons: &[InlineButton]) -> Result<(), GatewayError>;
    fn name(&self) -> &str;
}

fn chat_group_for(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::BullishCross | AlertKind::BullishCross12 => "bullish-cross",
        AlertKind::BearishCross | AlertKind::BearishCross12 => "bearish-cross",
        AlertKind::BandTouch | AlertKind::BandTouch12 => "band-touch",
        AlertKind::AvwapBreakout => "avwap-breakout",
        AlertKind::AvwapBreakdown => "avwap-breakdown",
        AlertKind::StochRsiOversold => "stoch-rsi-oversold",
        AlertKind::StochRsiOverbought => "stoch-rsi-overbought",
    }
}

fn source_for(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::BullishCross => "bullish_cross",
        AlertKind::BullishCross12 => "bullish_cross_12",
        AlertKind::BearishCross => "bearish_cross",
        AlertKind::BearishCross12 => "bearish_cross_12",
        AlertKind::BandTouch => "band_touch",
        AlertKind::BandTouch12 => "band_touch_12",
        AlertKind::AvwapBreakout => "avwap_breakout",
        AlertKind::AvwapBreakdown => "avwap_breakdown",
        AlertKind::StochRsiOversold => "stoch_rsi_oversold",
        AlertKind::StochRsiOverbought => "stoch_rsi_overbought",
    }
}

/// Formats, logs, and dispatches one alert event through every configured
/// channel. One bad channel does not block the others (§7 — alert
/// emissions that fail transport are persisted as `failed` and do not
/// retry).
pub struct NotificationGateway {
    db: Db,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationGateway {
    pub fn new(db: Db, channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { db, channels }
    }

    pub async fn dispatch(&self, event: &AlertEvent, now: i64) -> anyhow::Result<()> {
        let message = template::format_message(event, now);
        let buttons = deeplinks::buttons_for(event);
        let chat_group = chat_group_for(event.kind);
        let source = source_for(event.kind);
        let buttons_json = serde_json::to_string(
            &buttons
                .iter()
                .map(|b| serde_json::json!({ "label": b.label, "url": b.url }))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();

        let id = self
            .db
            .log_notification(source, chat_group, &message, Some(&event.token_address), Some(&event.strategy_label), now)
            .await?;
        let _ = buttons_json;

        if self.channels.is_empty() {
            tracing::debug!(notification_id = id, "no notification channels configured, logged only");
            return Ok(());
        }

        let mut any_failed = None;
        for channel in &self.channels {
            match channel.send(chat_group, &message, &buttons).await {
                Ok(()) => tracing::debug!(notification_id = id, channel = channel.name(), "alert dispatched"),
                Err(e) => {
                    tracing::warn!(notification_id = id, channel = channel.name(), error = %e, "alert dispatch failed");
                    any_failed = Some(e.to_string());
                }
            }
        }

        match any_failed {
            Some(details) => self.db.mark_notification_failed(id, &details).await?,
            None => self.db.mark_notification_sent(id, now).await?,
        }

        Ok(())
    }
}

pub fn format_unix_time(unix_time: i64) -> String {
    Utc.timestamp_opt(unix_time, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| unix_time.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_groups_are_distinct_per_kind() {
        assert_eq!(chat_group_for(AlertKind::BullishCross), "bullish-cross");
        assert_eq!(chat_group_for(AlertKind::AvwapBreakdown), "avwap-breakdown");
    }
}
