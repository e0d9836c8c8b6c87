use super::SlackBot;
use crate::message::Button;
use serde_json::{json, Value};

/// Maximum number of buttons in one interactive message
pub const MAX_BUTTONS: usize = 5;

/// Length of the derived interactive-message callback id
pub const CALLBACK_ID_LENGTH: usize = 20;

impl SlackBot {
    /// Convert buttons to legacy attachment actions, preserving order.
    pub fn convert_to_slack_buttons(buttons: &[Button]) -> Vec<Value> {
        buttons
            .iter()
            .map(|b| {
                json!({
                    "text": b.title,
                    "name": b.payload,
                    "value": b.payload,
                    "type": "button",
                })
            })
            .collect()
    }

    /// Correlation tag echoed back by Slack on a button click.
    ///
    /// Taken from the message, or from the button titles when the message is
    /// empty: spaces become underscores, then the first 20 characters are kept.
    pub fn callback_id(message: &str, buttons: &[Button]) -> String {
        let source = if message.is_empty() {
            buttons.iter().map(|b| b.title.as_str()).collect::<String>()
        } else {
            message.to_string()
        };

        source
            .replace(' ', "_")
            .chars()
            .take(CALLBACK_ID_LENGTH)
            .collect()
    }

    /// Build the single attachment carrying the buttons.
    pub fn button_attachment(message: &str, buttons: &[Button]) -> Value {
        json!({
            "fallback": message,
            "callback_id": Self::callback_id(message, buttons),
            "actions": Self::convert_to_slack_buttons(buttons),
        })
    }
}
