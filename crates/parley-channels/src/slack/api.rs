use super::formatting::MAX_BUTTONS;
use super::SLACK_CHANNEL_NAME;
use crate::error::{Error, Result};
use crate::message::{Button, OutputChannel};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default Slack Web API base URL
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// A `chat.postMessage` call
///
/// Messages are always posted as the authenticated bot user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMessageRequest {
    /// Channel or user ID to post to
    pub channel: String,
    /// Post as the authenticated bot user
    pub as_user: bool,
    /// Message text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Legacy attachments array
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
}

impl PostMessageRequest {
    /// Create an empty request for a channel
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            as_user: true,
            text: None,
            attachments: None,
        }
    }

    /// Set the message text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the attachments array
    #[must_use]
    pub fn with_attachments(mut self, attachments: serde_json::Value) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

/// The single Slack API capability the outbound adapter needs
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SlackApi: Send + Sync {
    /// Post a message to a channel
    async fn post_message(&self, request: PostMessageRequest) -> Result<()>;
}

/// Slack Web API client backed by reqwest
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackWebClient {
    /// Create a client for a bot token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base URL
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for SlackWebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(&self, request: PostMessageRequest) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to send message: {}", e)))?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("Failed to parse chat.postMessage response: {}", e)))?;

        if !data["ok"].as_bool().unwrap_or(false) {
            let error_msg = data["error"].as_str().unwrap_or("Unknown error");
            return Err(Error::Slack(format!("Failed to post message: {}", error_msg)));
        }

        debug!(channel = %request.channel, "Posted Slack message");
        Ok(())
    }
}

/// Outbound adapter the engine answers through
///
/// Built fresh for every inbound message. The recipient is resolved on each
/// send: the configured channel override wins, otherwise the message goes
/// back to the given recipient.
pub struct SlackBot {
    client: Arc<dyn SlackApi>,
    slack_channel: Option<String>,
}

impl SlackBot {
    /// Create a new adapter
    #[must_use]
    pub fn new(client: Arc<dyn SlackApi>, slack_channel: Option<String>) -> Self {
        Self {
            client,
            slack_channel,
        }
    }

    fn recipient<'a>(&'a self, recipient_id: &'a str) -> &'a str {
        self.slack_channel.as_deref().unwrap_or(recipient_id)
    }
}

#[async_trait::async_trait]
impl OutputChannel for SlackBot {
    fn name(&self) -> &'static str {
        SLACK_CHANNEL_NAME
    }

    /// Post each paragraph (split on blank lines) as its own message.
    ///
    /// Empty paragraphs are skipped, so an empty `message` posts nothing.
    async fn send_text_message(&self, recipient_id: &str, message: &str) -> Result<()> {
        let recipient = self.recipient(recipient_id);

        for part in message.split("\n\n").filter(|part| !part.is_empty()) {
            self.client
                .post_message(PostMessageRequest::new(recipient).with_text(part))
                .await?;
        }
        Ok(())
    }

    async fn send_image_url(
        &self,
        recipient_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<()> {
        let attachments = serde_json::json!([{
            "image_url": image_url,
            "text": caption,
        }]);

        self.client
            .post_message(
                PostMessageRequest::new(self.recipient(recipient_id)).with_attachments(attachments),
            )
            .await
    }

    async fn send_attachment(
        &self,
        recipient_id: &str,
        attachment: serde_json::Value,
        message: &str,
    ) -> Result<()> {
        self.client
            .post_message(
                PostMessageRequest::new(self.recipient(recipient_id))
                    .with_text(message)
                    .with_attachments(attachment),
            )
            .await
    }

    async fn send_text_with_buttons(
        &self,
        recipient_id: &str,
        message: &str,
        buttons: &[Button],
    ) -> Result<()> {
        if buttons.len() > MAX_BUTTONS {
            warn!(
                count = buttons.len(),
                max = MAX_BUTTONS,
                "Slack allows only up to 5 buttons, sending text without buttons"
            );
            return self.send_text_message(recipient_id, message).await;
        }

        let attachments = serde_json::json!([Self::button_attachment(message, buttons)]);

        self.client
            .post_message(
                PostMessageRequest::new(self.recipient(recipient_id))
                    .with_text(message)
                    .with_attachments(attachments),
            )
            .await
    }
}
