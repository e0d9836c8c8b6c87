//! Parley Channels - Slack webhook connector
//!
//! This crate connects a conversational engine to Slack:
//! - inbound: Events API and interactive-message webhooks (axum routes)
//! - outbound: replies posted with `chat.postMessage`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod slack;
pub mod util;

pub use error::{Error, Result};

// Re-export message types
pub use message::{BotResponse, Button, MessageHandler, OutputChannel, UserMessage};

// Re-export Slack connector
pub use slack::{
    sanitize_user_message, InboundPayload, PostMessageRequest, SlackApi, SlackBot,
    SlackCredentials, SlackInput, SlackWebClient,
};
