use async_trait::async_trait;

use crate::{GatewayError, InlineButton, NotificationChannel};

/// Posts to a Discord webhook as an embed, with deep links rendered as a
/// plain link list (Discord embeds have no native inline-button support).
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, chat_identifier: &str, message: &str, buttons: &[InlineButton]) -> Result<(), GatewayError> {
        let links: String = buttons
            .iter()
            .map(|b| format!("[{}]({})", b.label, b.url))
            .collect::<Vec<_>>()
            .join(" · ");

        let description = if links.is_empty() {
            message.to_string()
        } else {
            format!("{message}\n\n{links}")
        };

        let payload = serde_json::json!({
            "embeds": [{
                "title": chat_identifier,
                "description": description,
            }]
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
