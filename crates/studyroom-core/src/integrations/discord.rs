//! Discord integration -- post and edit messages via an incoming webhook.
//!
//! A webhook is bound to one channel, so the `channel` argument of
//! [`Messenger`] is only used for logging. Plain webhooks cannot carry
//! interactive components; those are dropped.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{credential, keyring_store, DISCORD_WEBHOOK_ENV, DISCORD_WEBHOOK_KEY};
use crate::error::DeliveryError;
use crate::platform::{ChannelId, MessageId, Messenger, OutgoingMessage};

const WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";

pub struct DiscordWebhook {
    http: Client,
    webhook_url: String,
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

impl DiscordWebhook {
    /// Validate and wrap a webhook URL.
    pub fn new(webhook_url: &str) -> Result<Self, DeliveryError> {
        if !webhook_url.starts_with(WEBHOOK_PREFIX) {
            return Err(DeliveryError::Rejected(format!(
                "Invalid Discord webhook URL: must start with {WEBHOOK_PREFIX}"
            )));
        }
        Ok(Self::unchecked(webhook_url))
    }

    fn unchecked(webhook_url: &str) -> Self {
        Self {
            http: Client::new(),
            webhook_url: webhook_url.trim_end_matches('/').to_string(),
        }
    }

    /// Webhook from the environment or the OS keyring, if one is configured.
    pub fn from_credentials() -> Option<Result<Self, DeliveryError>> {
        credential(DISCORD_WEBHOOK_KEY, DISCORD_WEBHOOK_ENV).map(|url| Self::new(&url))
    }

    /// Persist a webhook URL to the OS keyring after validating it.
    pub fn store_credentials(webhook_url: &str) -> Result<(), DeliveryError> {
        Self::new(webhook_url)?;
        keyring_store::set(DISCORD_WEBHOOK_KEY, webhook_url)
            .map_err(|e| DeliveryError::Rejected(e.to_string()))
    }

    pub fn clear_credentials() -> Result<(), DeliveryError> {
        keyring_store::delete(DISCORD_WEBHOOK_KEY).map_err(|e| DeliveryError::Rejected(e.to_string()))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, DeliveryError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Messenger for DiscordWebhook {
    async fn send(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, DeliveryError> {
        let resp = self
            .http
            .post(format!("{}?wait=true", self.webhook_url))
            .json(&json!({ "content": message.content }))
            .send()
            .await?;
        let created: CreatedMessage = Self::check(resp).await?.json().await?;
        debug!(%channel, message_id = %created.id, "webhook message sent");
        Ok(MessageId(created.id))
    }

    async fn edit(
        &self,
        channel: &ChannelId,
        message_id: &MessageId,
        message: OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .patch(format!("{}/messages/{}", self.webhook_url, message_id))
            .json(&json!({ "content": message.content }))
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(%channel, %message_id, "webhook message edited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_urls() {
        assert!(DiscordWebhook::new("https://example.com/hook").is_err());
        assert!(DiscordWebhook::new("https://discord.com/api/webhooks/1/abc").is_ok());
    }

    #[tokio::test]
    async fn send_returns_created_id_and_edit_patches() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/hook")
            .match_query(mockito::Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(mockito::Matcher::Json(json!({ "content": "hello" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"987","content":"hello"}"#)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/hook/messages/987")
            .match_body(mockito::Matcher::Json(json!({ "content": "edited" })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let hook = DiscordWebhook::unchecked(&format!("{}/hook", server.url()));
        let channel = ChannelId::new("general");
        let id = hook.send(&channel, "hello".into()).await.unwrap();
        assert_eq!(id, MessageId("987".into()));
        hook.edit(&channel, &id, "edited".into()).await.unwrap();

        create.assert_async().await;
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn deleted_webhook_is_a_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Unknown Webhook"}"#)
            .create_async()
            .await;

        let hook = DiscordWebhook::unchecked(&format!("{}/hook", server.url()));
        let err = hook.send(&ChannelId::new("c"), "x".into()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 404, .. }));
    }
}
