//! Common utilities for the connector

/// Maximum length of text to log (to prevent sensitive data exposure)
pub const MAX_LOG_TEXT_LENGTH: usize = 50;

/// Patterns that indicate potentially sensitive content
pub const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "api-key",
    "bearer",
    "authorization",
    "credential",
    "private",
    "-----begin",
];

/// Mask potentially sensitive text for logging
///
/// Inbound user text goes through here before it reaches a log line.
///
/// # Examples
/// ```
/// use parley_channels::util::mask_for_logging;
///
/// assert!(mask_for_logging("my password is secret123").contains("REDACTED"));
/// assert_eq!(mask_for_logging("Hello"), "Hello");
/// ```
#[must_use]
pub fn mask_for_logging(text: &str) -> String {
    let lower = text.to_lowercase();

    for pattern in SENSITIVE_PATTERNS {
        if lower.contains(pattern) {
            return "[REDACTED - potentially sensitive content]".to_string();
        }
    }

    if text.chars().count() > MAX_LOG_TEXT_LENGTH {
        let head: String = text.chars().take(MAX_LOG_TEXT_LENGTH).collect();
        format!("{}...[truncated]", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive() {
        assert!(mask_for_logging("here is my api_key: abc").contains("REDACTED"));
        assert!(mask_for_logging("Bearer xoxb-123").contains("REDACTED"));
    }

    #[test]
    fn test_mask_truncates_on_char_boundary() {
        let long = "é".repeat(80);
        let masked = mask_for_logging(&long);
        assert!(masked.ends_with("...[truncated]"));
        assert_eq!(
            masked.trim_end_matches("...[truncated]").chars().count(),
            MAX_LOG_TEXT_LENGTH
        );
    }

    #[test]
    fn test_mask_passthrough() {
        assert_eq!(mask_for_logging("hello bot"), "hello bot");
    }
}
