//! Turning a webhook outcome into the SMS that leave the bridge.

use crate::config::NotifyConfig;
use hook_core::{Channel, OutboundNotification, WebhookOutcome, MAX_SMS_TEXT_LEN};

/// Decides who hears about a webhook outcome, and what they read.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    admin_number: String,
    max_text_len: usize,
}

impl NotificationDispatcher {
    pub fn new<S: Into<String>>(admin_number: S) -> Self {
        Self {
            admin_number: admin_number.into(),
            max_text_len: MAX_SMS_TEXT_LEN,
        }
    }

    /// The configured length never lifts the limit above one SMS.
    pub fn from_config(config: &NotifyConfig) -> Self {
        Self {
            admin_number: config.admin_number.clone(),
            max_text_len: config.max_text_len.min(MAX_SMS_TEXT_LEN),
        }
    }

    pub fn admin_number(&self) -> &str {
        &self.admin_number
    }

    /// At most one notification: a reply on non-empty success, an admin
    /// alert on failure, nothing on empty success.
    pub fn dispatch(&self, sender: &str, outcome: &WebhookOutcome) -> Vec<OutboundNotification> {
        match outcome {
            WebhookOutcome::Success { body } if body.is_empty() => Vec::new(),
            WebhookOutcome::Success { body } => vec![OutboundNotification::new(
                sender,
                body,
                Channel::Reply,
                self.max_text_len,
            )],
            WebhookOutcome::Failure { kind, .. } => vec![OutboundNotification::new(
                self.admin_number.as_str(),
                &kind.to_string(),
                Channel::Admin,
                self.max_text_len,
            )],
        }
    }
}
