//! Echo engine
//!
//! Stand-in conversational engine so the connector can be exercised end to
//! end: it repeats the user's text and offers two quick replies.

use async_trait::async_trait;
use parley_channels::{BotResponse, Button, MessageHandler, UserMessage};
use tracing::info;

/// Repeats every message back to its sender
pub struct EchoEngine;

#[async_trait]
impl MessageHandler for EchoEngine {
    async fn handle(&self, message: UserMessage) -> anyhow::Result<()> {
        info!(
            message_id = %message.message_id,
            sender_id = %message.sender_id,
            channel = %message.input_channel,
            "Echo engine handling message"
        );

        let reply = match message.text.as_str() {
            "/affirm" => BotResponse::text("Great!"),
            "/deny" => BotResponse::text("Maybe next time."),
            text => BotResponse::text(format!("You said: {}", text)).with_buttons(vec![
                Button::new("Yes", "/affirm"),
                Button::new("No", "/deny"),
            ]),
        };

        message.reply(reply).await?;
        Ok(())
    }
}
