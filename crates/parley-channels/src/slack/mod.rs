//! Slack - webhook connector
//!
//! This module provides the Slack input channel: it receives Events API and
//! interactive-message webhooks, hands user messages to the engine, and gives
//! the engine a [`SlackBot`] to answer through.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info_span;

/// Slack API client and outbound message logic.
pub mod api;
/// Inbound payload classification and sanitization.
pub mod events;
/// Slack-specific message formatting (legacy attachment buttons).
pub mod formatting;
/// HTTP routes.
pub mod webhook;

#[cfg(test)]
mod tests;

pub use api::{PostMessageRequest, SlackApi, SlackBot, SlackWebClient};
pub use events::{sanitize_user_message, InboundPayload};

/// Name the connector tags inbound messages with
pub const SLACK_CHANNEL_NAME: &str = "slack";

/// Retry reason suppressed when none are configured
pub const DEFAULT_RETRY_SUPPRESS_REASON: &str = "http_timeout";

/// Maximum allowed timestamp age in seconds (5 minutes)
pub(crate) const MAX_TIMESTAMP_AGE_SECS: u64 = 300;

/// Constant-time comparison to prevent timing attacks
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Credentials block as it appears in configuration files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackCredentials {
    /// Bot token (xoxb-...)
    #[serde(default, alias = "token")]
    pub slack_token: Option<String>,
    /// Channel every reply is posted to (unset = reply to the sender)
    #[serde(default, alias = "channel")]
    pub slack_channel: Option<String>,
    /// Retry reasons that are acknowledged without reprocessing
    #[serde(default, alias = "errors_to_ignore_on_retry")]
    pub errors_ignore_retry: Option<Vec<String>>,
    /// Signing secret for request verification (unset = not verified)
    #[serde(default)]
    pub signing_secret: Option<String>,
}

/// Slack input channel
///
/// Holds the immutable connector configuration. One instance serves every
/// request for the lifetime of the process.
#[derive(Clone)]
pub struct SlackInput {
    pub(crate) slack_channel: Option<String>,
    pub(crate) errors_ignore_retry: HashSet<String>,
    pub(crate) signing_secret: Option<String>,
    pub(crate) client: Arc<dyn SlackApi>,
    pub(crate) span: tracing::Span,
}

impl SlackInput {
    /// Create a new Slack input channel
    ///
    /// `errors_ignore_retry` defaults to `["http_timeout"]` when `None`.
    pub fn new(
        slack_token: impl Into<String>,
        slack_channel: Option<String>,
        errors_ignore_retry: Option<Vec<String>>,
    ) -> Result<Self> {
        let slack_token = slack_token.into();
        if slack_token.trim().is_empty() {
            return Err(Error::Config("slack_token must not be empty".to_string()));
        }

        let errors_ignore_retry = errors_ignore_retry
            .unwrap_or_else(|| vec![DEFAULT_RETRY_SUPPRESS_REASON.to_string()])
            .into_iter()
            .collect();

        let client: Arc<dyn SlackApi> = Arc::new(SlackWebClient::new(slack_token));

        Ok(Self {
            slack_channel,
            errors_ignore_retry,
            signing_secret: None,
            client,
            span: info_span!("slack_input"),
        })
    }

    /// Create from a credentials block, failing fast when it is missing
    pub fn from_credentials(credentials: Option<SlackCredentials>) -> Result<Self> {
        let credentials = credentials
            .ok_or_else(|| Error::Config("no credentials given for the slack channel".to_string()))?;

        let token = credentials
            .slack_token
            .ok_or_else(|| Error::Config("slack_token not set".to_string()))?;

        let mut input = Self::new(
            token,
            credentials.slack_channel,
            credentials.errors_ignore_retry,
        )?;
        if let Some(secret) = credentials.signing_secret {
            input = input.with_signing_secret(secret);
        }
        Ok(input)
    }

    /// Replace the Slack API client used by outbound adapters
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn SlackApi>) -> Self {
        self.client = client;
        self
    }

    /// Verify request signatures with this secret
    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.signing_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    /// Emit all connector logs inside this span
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Name of this input channel
    #[must_use]
    pub fn name(&self) -> &'static str {
        SLACK_CHANNEL_NAME
    }

    /// Channel override replies are posted to, if any
    #[must_use]
    pub fn slack_channel(&self) -> Option<&str> {
        self.slack_channel.as_deref()
    }

    /// Whether a retry with this reason is acknowledged without processing
    #[must_use]
    pub fn suppresses_retry_reason(&self, reason: &str) -> bool {
        self.errors_ignore_retry.contains(reason)
    }

    /// Build the outbound adapter for one inbound message
    pub(crate) fn output_channel(&self) -> SlackBot {
        SlackBot::new(self.client.clone(), self.slack_channel.clone())
    }
}

impl std::fmt::Debug for SlackInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackInput")
            .field("slack_channel", &self.slack_channel)
            .field("errors_ignore_retry", &self.errors_ignore_retry)
            .field("verifies_signatures", &self.signing_secret.is_some())
            .finish_non_exhaustive()
    }
}
