//! Message - Engine-facing message types
//!
//! This module provides the platform-independent envelope handed to the
//! conversational engine, and the output interface the engine replies through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

/// A quick-reply button offered to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Label shown to the user
    pub title: String,
    /// Text sent back to the engine when the button is clicked
    pub payload: String,
}

impl Button {
    /// Create a new button
    #[must_use]
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// A generic bot reply, dispatched by [`OutputChannel::send_response`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotResponse {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Quick-reply buttons attached to the text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    /// Platform-specific rich attachment, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<serde_json::Value>,
}

impl BotResponse {
    /// Create a text reply
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            ..Default::default()
        }
    }

    /// Attach buttons
    #[must_use]
    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons.extend(buttons);
        self
    }

    /// Attach an image URL
    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    /// Attach a rich attachment
    #[must_use]
    pub fn with_attachment(mut self, attachment: serde_json::Value) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Output interface the engine uses to answer a user
#[async_trait::async_trait]
pub trait OutputChannel: Send + Sync {
    /// Name of the channel this output belongs to
    fn name(&self) -> &'static str;

    /// Send a plain text message
    async fn send_text_message(&self, recipient_id: &str, message: &str) -> crate::Result<()>;

    /// Send an image by URL
    ///
    /// Default implementation sends the URL as text.
    async fn send_image_url(
        &self,
        recipient_id: &str,
        image_url: &str,
        caption: &str,
    ) -> crate::Result<()> {
        let text = if caption.is_empty() {
            format!("Image: {}", image_url)
        } else {
            format!("{}\n\nImage: {}", caption, image_url)
        };
        self.send_text_message(recipient_id, &text).await
    }

    /// Send a platform-specific rich attachment
    ///
    /// Default implementation sends the attachment serialized as text.
    async fn send_attachment(
        &self,
        recipient_id: &str,
        attachment: serde_json::Value,
        message: &str,
    ) -> crate::Result<()> {
        if !message.is_empty() {
            self.send_text_message(recipient_id, message).await?;
        }
        self.send_text_message(recipient_id, &format!("Attachment: {}", attachment))
            .await
    }

    /// Send a message with quick-reply buttons
    ///
    /// Default implementation lists the buttons as numbered text lines.
    async fn send_text_with_buttons(
        &self,
        recipient_id: &str,
        message: &str,
        buttons: &[Button],
    ) -> crate::Result<()> {
        self.send_text_message(recipient_id, message).await?;
        for (idx, button) in buttons.iter().enumerate() {
            let line = format!("{}: {} ({})", idx + 1, button.title, button.payload);
            self.send_text_message(recipient_id, &line).await?;
        }
        Ok(())
    }

    /// Dispatch a generic bot reply to the specific send operations
    async fn send_response(&self, recipient_id: &str, response: BotResponse) -> crate::Result<()> {
        match (response.text.as_deref(), response.buttons.is_empty()) {
            (Some(text), true) => self.send_text_message(recipient_id, text).await?,
            (text, false) => {
                self.send_text_with_buttons(recipient_id, text.unwrap_or(""), &response.buttons)
                    .await?
            }
            (None, true) => {}
        }

        if let Some(image) = response.image.as_deref() {
            self.send_image_url(recipient_id, image, "").await?;
        }

        if let Some(attachment) = response.attachment {
            self.send_attachment(recipient_id, attachment, "").await?;
        }

        Ok(())
    }
}

/// An inbound user message, handed to the engine exactly once
pub struct UserMessage {
    /// Internal message ID
    pub message_id: Uuid,
    /// Sanitized message text
    pub text: String,
    /// Where replies to this message go
    pub output_channel: Box<dyn OutputChannel>,
    /// Platform identifier of the sender
    pub sender_id: String,
    /// Name of the channel the message came in on
    pub input_channel: String,
    /// When the connector received the message
    pub received_at: DateTime<Utc>,
}

impl UserMessage {
    /// Create a new user message
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        output_channel: Box<dyn OutputChannel>,
        sender_id: impl Into<String>,
        input_channel: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            text: text.into(),
            output_channel,
            sender_id: sender_id.into(),
            input_channel: input_channel.into(),
            received_at: Utc::now(),
        }
    }

    /// Reply to the sender through the message's output channel
    pub async fn reply(&self, response: BotResponse) -> crate::Result<()> {
        self.output_channel
            .send_response(&self.sender_id, response)
            .await
    }
}

impl std::fmt::Debug for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserMessage")
            .field("message_id", &self.message_id)
            .field("text", &self.text)
            .field("output_channel", &self.output_channel.name())
            .field("sender_id", &self.sender_id)
            .field("input_channel", &self.input_channel)
            .field("received_at", &self.received_at)
            .finish()
    }
}

/// Engine callback invoked once per inbound user message
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a new user message
    async fn handle(&self, message: UserMessage) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(UserMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: UserMessage) -> anyhow::Result<()> {
        (self)(message).await
    }
}
