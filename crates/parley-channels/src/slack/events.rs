use super::{constant_time_eq, SlackInput, MAX_TIMESTAMP_AGE_SECS};
use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Classified inbound webhook payload
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// Endpoint verification handshake; the value is echoed back as JSON
    Challenge(serde_json::Value),
    /// Click on a button of a previously sent interactive message
    ButtonClick {
        /// User who clicked
        sender_id: String,
        /// Payload of the clicked button
        text: String,
    },
    /// Message typed by a user
    UserMessage {
        /// Author of the message
        sender_id: String,
        /// Raw message text
        text: String,
        /// Users whose mentions are stripped from the text (the bot itself)
        ids_to_strip: Vec<String>,
    },
    /// Anything else, acknowledged and ignored
    Unrecognized,
}

/// `payload` field of an interactive-message form post
#[derive(Debug, Deserialize)]
struct InteractivePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    actions: Vec<InteractiveAction>,
    user: Option<InteractiveUser>,
}

#[derive(Debug, Deserialize)]
struct InteractiveAction {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractiveUser {
    id: String,
}

/// Events API callback envelope
#[derive(Debug, Deserialize)]
struct EventCallback {
    event: Option<EventBody>,
    #[serde(default)]
    authed_users: Vec<String>,
    #[serde(default)]
    authorizations: Vec<Authorization>,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    user: Option<String>,
    bot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Authorization {
    user_id: Option<String>,
}

impl InboundPayload {
    /// Classify a form-encoded body (interactive components)
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        let Some(raw) = fields.get("payload") else {
            return Self::Unrecognized;
        };

        let payload: InteractivePayload = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Unparseable interactive payload, ignoring");
                return Self::Unrecognized;
            }
        };

        if payload.kind != "interactive_message" {
            return Self::Unrecognized;
        }

        let Some(action) = payload.actions.first() else {
            return Self::Unrecognized;
        };
        if action.kind.as_deref() != Some("button") {
            return Self::Unrecognized;
        }

        match (payload.user, action.name.as_ref()) {
            (Some(user), Some(name)) => Self::ButtonClick {
                sender_id: user.id,
                text: name.clone(),
            },
            _ => Self::Unrecognized,
        }
    }

    /// Classify a JSON body (Events API)
    pub fn from_json(body: &serde_json::Value) -> Self {
        if let Some(challenge) = body.get("challenge") {
            return Self::Challenge(challenge.clone());
        }

        let callback = match EventCallback::deserialize(body) {
            Ok(callback) => callback,
            Err(e) => {
                debug!(error = %e, "Unrecognized event payload, ignoring");
                return Self::Unrecognized;
            }
        };

        let Some(event) = callback.event else {
            return Self::Unrecognized;
        };

        let is_user_message = matches!(event.kind.as_deref(), Some("message" | "app_mention"))
            && event.text.as_deref().is_some_and(|t| !t.is_empty())
            && event.bot_id.as_deref().map_or(true, str::is_empty);
        if !is_user_message {
            return Self::Unrecognized;
        }

        let mut ids_to_strip = callback.authed_users;
        for user_id in callback.authorizations.into_iter().filter_map(|a| a.user_id) {
            if !ids_to_strip.contains(&user_id) {
                ids_to_strip.push(user_id);
            }
        }

        Self::UserMessage {
            sender_id: event.user.unwrap_or_default(),
            text: event.text.unwrap_or_default(),
            ids_to_strip,
        }
    }
}

/// Drop mentions of the given users from a message.
///
/// A heuristic that handles the common cases: for each id, a mention followed
/// by whitespace is removed, then whitespace followed by a mention, then any
/// remaining mention becomes a single space. The result is trimmed.
pub fn sanitize_user_message(text: &str, ids_to_strip: &[String]) -> String {
    let mut text = text.to_string();

    for uid in ids_to_strip {
        let mention = format!("<@{}>", regex::escape(uid));
        let passes = [
            (format!(r"{}\s", mention), ""),
            (format!(r"\s{}", mention), ""),
            (mention, " "),
        ];

        for (pattern, replacement) in passes {
            match Regex::new(&pattern) {
                Ok(re) => text = re.replace_all(&text, replacement).into_owned(),
                Err(e) => warn!(error = %e, "Skipping mention pattern"),
            }
        }
    }

    text.trim().to_string()
}

impl SlackInput {
    /// Verify a Slack request signature (HMAC-SHA256)
    pub fn verify_signature(&self, timestamp: &str, body: &[u8], signature: &str) -> Result<()> {
        let Some(secret) = self.signing_secret.as_deref() else {
            return Ok(());
        };

        // Check timestamp to prevent replay attacks
        let ts: u64 = timestamp
            .parse()
            .map_err(|_| Error::Signature("Invalid timestamp".to_string()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::Signature("System time error".to_string()))?
            .as_secs();

        if now.abs_diff(ts) > MAX_TIMESTAMP_AGE_SECS {
            warn!(
                timestamp = %ts,
                now = %now,
                "Slack request timestamp too old (possible replay attack)"
            );
            return Err(Error::Signature(
                "Request timestamp is too old or in the future".to_string(),
            ));
        }

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| Error::Signature("Invalid signing secret".to_string()))?;
        mac.update(format!("v0:{}:", timestamp).as_bytes());
        mac.update(body);
        let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            warn!("Slack signature verification failed");
            return Err(Error::Signature("Invalid request signature".to_string()));
        }

        debug!("Slack signature verified successfully");
        Ok(())
    }

    /// Verify a webhook request from its headers and raw body
    pub fn verify_webhook_request(&self, headers: &axum::http::HeaderMap, body: &[u8]) -> Result<()> {
        if self.signing_secret.is_none() {
            return Ok(());
        }

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::Signature(format!("Missing {} header", name)))
        };

        let timestamp = header("x-slack-request-timestamp")?;
        let signature = header("x-slack-signature")?;

        self.verify_signature(timestamp, body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sanitize_strips_self_mentions() {
        assert_eq!(
            sanitize_user_message("<@U1> hello <@U1>", &ids(&["U1"])),
            "hello"
        );
    }

    #[test]
    fn test_sanitize_mid_sentence_mention() {
        assert_eq!(
            sanitize_user_message("hey <@U1> how are you", &ids(&["U1"])),
            "hey how are you"
        );
        assert_eq!(
            sanitize_user_message("hey<@U1>there", &ids(&["U1"])),
            "hey there"
        );
    }

    #[test]
    fn test_sanitize_keeps_other_mentions() {
        assert_eq!(
            sanitize_user_message("<@U1> ping <@U2>", &ids(&["U1"])),
            "ping <@U2>"
        );
    }

    #[test]
    fn test_sanitize_is_noop_on_clean_text() {
        let once = sanitize_user_message("<@U1> what's the weather", &ids(&["U1"]));
        let twice = sanitize_user_message(&once, &ids(&["U1"]));
        assert_eq!(once, twice);
        assert_eq!(sanitize_user_message("  plain  ", &[]), "plain");
    }

    #[test]
    fn test_sanitize_adjacent_mentions() {
        assert_eq!(
            sanitize_user_message("<@U1> <@U1> hi", &ids(&["U1"])),
            "hi"
        );
        assert_eq!(sanitize_user_message("<@U1><@U1>", &ids(&["U1"])), "");
    }

    #[test]
    fn test_challenge_payload() {
        let payload = InboundPayload::from_json(&json!({"challenge": "abc123"}));
        assert_eq!(payload, InboundPayload::Challenge(json!("abc123")));
    }

    #[test]
    fn test_user_message_payload() {
        let body = json!({
            "authed_users": ["UBOT"],
            "event": {"type": "app_mention", "text": "<@UBOT> hi", "user": "U42"}
        });
        assert_eq!(
            InboundPayload::from_json(&body),
            InboundPayload::UserMessage {
                sender_id: "U42".to_string(),
                text: "<@UBOT> hi".to_string(),
                ids_to_strip: ids(&["UBOT"]),
            }
        );
    }

    #[test]
    fn test_authorizations_are_collected() {
        let body = json!({
            "authorizations": [{"user_id": "UBOT", "is_bot": true}],
            "event": {"type": "message", "text": "hi", "user": "U42"}
        });
        let InboundPayload::UserMessage { ids_to_strip, .. } = InboundPayload::from_json(&body)
        else {
            panic!("expected a user message");
        };
        assert_eq!(ids_to_strip, ids(&["UBOT"]));
    }

    #[test]
    fn test_bot_messages_are_ignored() {
        let body = json!({
            "authed_users": ["UBOT"],
            "event": {"type": "message", "text": "echo", "user": "U42", "bot_id": "B1"}
        });
        assert_eq!(InboundPayload::from_json(&body), InboundPayload::Unrecognized);
    }

    #[test]
    fn test_other_events_are_ignored() {
        let cases = [
            json!({"event": {"type": "reaction_added", "user": "U42"}}),
            json!({"event": {"type": "message", "text": "", "user": "U42"}}),
            json!({"event": {"type": "message", "user": "U42"}}),
            json!({"type": "url_verification"}),
            json!([1, 2, 3]),
        ];
        for body in cases {
            assert_eq!(InboundPayload::from_json(&body), InboundPayload::Unrecognized);
        }
    }

    fn form(payload: serde_json::Value) -> HashMap<String, String> {
        HashMap::from([("payload".to_string(), payload.to_string())])
    }

    #[test]
    fn test_button_click_payload() {
        let fields = form(json!({
            "type": "interactive_message",
            "actions": [{"type": "button", "name": "/affirm", "value": "/affirm"}],
            "user": {"id": "U42", "name": "alice"}
        }));
        assert_eq!(
            InboundPayload::from_form(&fields),
            InboundPayload::ButtonClick {
                sender_id: "U42".to_string(),
                text: "/affirm".to_string(),
            }
        );
    }

    #[test]
    fn test_non_button_interactions_are_ignored() {
        let select = form(json!({
            "type": "interactive_message",
            "actions": [{"type": "select", "name": "choice"}],
            "user": {"id": "U42"}
        }));
        let block = form(json!({
            "type": "block_actions",
            "actions": [{"type": "button", "action_id": "a"}],
            "user": {"id": "U42"}
        }));
        let no_actions = form(json!({"type": "interactive_message", "user": {"id": "U42"}}));

        for fields in [select, block, no_actions] {
            assert_eq!(InboundPayload::from_form(&fields), InboundPayload::Unrecognized);
        }

        let garbage = HashMap::from([("payload".to_string(), "{not json".to_string())]);
        assert_eq!(InboundPayload::from_form(&garbage), InboundPayload::Unrecognized);
        assert_eq!(InboundPayload::from_form(&HashMap::new()), InboundPayload::Unrecognized);
    }
}
