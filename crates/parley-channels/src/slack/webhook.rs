use super::events::{sanitize_user_message, InboundPayload};
use super::SlackInput;
use crate::message::{MessageHandler, UserMessage};
use crate::util::mask_for_logging;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Header carrying Slack's delivery attempt number
pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
/// Header carrying the reason Slack is retrying
pub const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";
/// Response header telling Slack to stop retrying
pub const NO_RETRY_HEADER: &str = "x-slack-no-retry";

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: &'static str,
}

#[derive(Clone)]
struct WebhookState {
    input: SlackInput,
    handler: Arc<dyn MessageHandler>,
}

impl SlackInput {
    /// Create the connector routes, delivering user messages to `handler`.
    ///
    /// - `GET /`: health probe
    /// - `GET /webhook`: empty acknowledgement
    /// - `POST /webhook`: Events API and interactive-message receiver
    pub fn blueprint(&self, handler: impl MessageHandler + 'static) -> Router {
        let state = WebhookState {
            input: self.clone(),
            handler: Arc::new(handler),
        };

        Router::new()
            .route("/", get(health))
            .route("/webhook", get(webhook_ack).post(webhook))
            .with_state(state)
    }

    /// Retry number and reason, when this delivery is a retry that should not be processed again
    pub fn suppressed_retry(&self, headers: &HeaderMap) -> Option<(String, String)> {
        let count = header_str(headers, RETRY_NUM_HEADER).filter(|c| !c.is_empty())?;
        let reason = header_str(headers, RETRY_REASON_HEADER)?;

        self.suppresses_retry_reason(reason)
            .then(|| (count.to_string(), reason.to_string()))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn webhook_ack() -> StatusCode {
    StatusCode::OK
}

async fn webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = state.input.span.clone();
    state.handle_webhook(headers, body).instrument(span).await
}

impl WebhookState {
    async fn handle_webhook(&self, headers: HeaderMap, body: Bytes) -> Response {
        if let Some((count, reason)) = self.input.suppressed_retry(&headers) {
            warn!(retry = %count, reason = %reason, "Received retry request from Slack, not reprocessing");
            return (StatusCode::CREATED, [(NO_RETRY_HEADER, "1")]).into_response();
        }

        if let Err(e) = self.input.verify_webhook_request(&headers, &body) {
            warn!(error = %e, "Rejected Slack webhook request");
            return StatusCode::UNAUTHORIZED.into_response();
        }

        match classify(&headers, &body) {
            InboundPayload::Challenge(challenge) => {
                info!("Answering Slack URL verification challenge");
                Json(challenge).into_response()
            }
            InboundPayload::ButtonClick { sender_id, text } => {
                self.process_message(text, sender_id).await
            }
            InboundPayload::UserMessage {
                sender_id,
                text,
                ids_to_strip,
            } => {
                let text = sanitize_user_message(&text, &ids_to_strip);
                self.process_message(text, sender_id).await
            }
            InboundPayload::Unrecognized => {
                debug!("Ignoring unrecognized Slack payload");
                StatusCode::OK.into_response()
            }
        }
    }

    /// Hand a message to the engine; failures never reach Slack
    async fn process_message(&self, text: String, sender_id: String) -> Response {
        let output = self.input.output_channel();
        let message = UserMessage::new(text, Box::new(output), sender_id, self.input.name());

        info!(
            message_id = %message.message_id,
            sender_id = %message.sender_id,
            text = %mask_for_logging(&message.text),
            "Received Slack message"
        );

        match AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = ?e, "Exception when trying to handle message");
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %reason, "Message handler panicked");
            }
        }

        StatusCode::OK.into_response()
    }
}

/// Pick the payload variant from the content type and body
fn classify(headers: &HeaderMap, body: &[u8]) -> InboundPayload {
    let is_form = header_str(headers, header::CONTENT_TYPE.as_str())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        if let Ok(fields) = serde_urlencoded::from_bytes::<HashMap<String, String>>(body) {
            if !fields.is_empty() {
                return InboundPayload::from_form(&fields);
            }
        }
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => InboundPayload::from_json(&value),
        Err(_) => InboundPayload::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn input() -> SlackInput {
        SlackInput::new("xoxb-test", None, None).unwrap()
    }

    fn retry_headers(num: &str, reason: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_NUM_HEADER, HeaderValue::from_str(num).unwrap());
        headers.insert(RETRY_REASON_HEADER, HeaderValue::from_str(reason).unwrap());
        headers
    }

    #[test]
    fn test_suppressed_retry_default_reason() {
        let input = input();
        assert_eq!(
            input.suppressed_retry(&retry_headers("1", "http_timeout")),
            Some(("1".to_string(), "http_timeout".to_string()))
        );
        assert_eq!(
            input.suppressed_retry(&retry_headers("1", "some_other_reason")),
            None
        );
        assert_eq!(input.suppressed_retry(&retry_headers("", "http_timeout")), None);
        assert_eq!(input.suppressed_retry(&HeaderMap::new()), None);
    }

    #[test]
    fn test_suppressed_retry_configured_reasons() {
        let input = SlackInput::new(
            "xoxb-test",
            None,
            Some(vec!["http_error".to_string()]),
        )
        .unwrap();
        assert!(input.suppressed_retry(&retry_headers("2", "http_error")).is_some());
        assert!(input.suppressed_retry(&retry_headers("2", "http_timeout")).is_none());
    }

    #[test]
    fn test_classify_form_and_json() {
        let mut form_headers = HeaderMap::new();
        form_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let payload = serde_json::json!({
            "type": "interactive_message",
            "actions": [{"type": "button", "name": "/yes"}],
            "user": {"id": "U1"}
        });
        let body = serde_urlencoded::to_string([("payload", payload.to_string())]).unwrap();
        assert_eq!(
            classify(&form_headers, body.as_bytes()),
            InboundPayload::ButtonClick {
                sender_id: "U1".to_string(),
                text: "/yes".to_string(),
            }
        );

        assert_eq!(
            classify(&HeaderMap::new(), br#"{"challenge":"c"}"#),
            InboundPayload::Challenge(serde_json::json!("c"))
        );
        assert_eq!(classify(&HeaderMap::new(), b""), InboundPayload::Unrecognized);
        assert_eq!(classify(&form_headers, b""), InboundPayload::Unrecognized);
    }
}
