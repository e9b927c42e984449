//! # Hook Core
//!
//! Core traits and types shared by the smshook SMS-to-webhook bridge.
//!
//! This crate provides the fundamental building blocks of the pipeline:
//! - [`Modem`] trait for transmitting SMS through the modem collaborator
//! - [`Webhook`] trait for asking a decision service what to answer
//! - [`WebhookOutcome`] and [`FailureKind`], the closed result of a webhook call
//! - [`OutboundNotification`], the only shape in which text leaves the bridge
//!
//! ## Example
//!
//! ```rust,ignore
//! use hook_core::{InboundMessage, Webhook, WebhookOutcome};
//!
//! let message = InboundMessage::new("+5511900000000", now, "CAFE");
//! match webhook.call(&message).await {
//!     WebhookOutcome::Success { body } => println!("reply with {body}"),
//!     WebhookOutcome::Failure { kind, .. } => println!("alert admin: {kind}"),
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Longest text a single outbound SMS may carry.
pub const MAX_SMS_TEXT_LEN: usize = 100;

/// Errors that can occur while handing an SMS to the modem
#[derive(Debug, thiserror::Error)]
pub enum ModemError {
    /// The underlying transport refused or failed the write
    #[error("transport error: {0}")]
    Transport(String),
    /// The modem is no longer connected
    #[error("modem closed")]
    Closed,
    /// Invalid send parameters (e.g. empty recipient)
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Errors raised while serving the companion decision endpoint
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("route not found: {0}")]
    RouteNotFound(String),
    #[error("parsing failed: {0}")]
    ParseError(String),
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
}

/// Why a webhook call did not produce a reply.
///
/// The `Display` form is the label sent to the administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    /// DNS failure, refused or reset connection
    #[error("CONNECTION ERROR RAISED")]
    Connection,
    /// No complete response within the configured bound
    #[error("TIMEOUT ERROR RAISED")]
    Timeout,
    /// The webhook answered with a non-2xx status
    #[error("HTTP ERROR {code} RAISED")]
    HttpStatus { code: u16 },
    /// Anything that fits none of the above
    #[error("UNKNOWN ERROR RAISED")]
    Unknown,
}

/// Result of exactly one webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Success { body: String },
    Failure { kind: FailureKind, diagnostic: String },
}

impl WebhookOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WebhookOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            WebhookOutcome::Success { .. } => None,
            WebhookOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// HTTP status code for decision endpoint responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    NotImplemented = 501,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub text: &'a str,
}

/// An SMS as delivered by the modem collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Correlation id for logs; never sent anywhere.
    pub id: String,
    pub sender: String,
    pub received_at: OffsetDateTime,
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        sender: impl Into<String>,
        received_at: OffsetDateTime,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: fallback_id(),
            sender: sender.into(),
            received_at,
            text: text.into(),
        }
    }
}

/// JSON body posted to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookRequest<'a> {
    pub number: &'a str,
    /// RFC 3339 timestamp of reception
    pub time: String,
    pub message: &'a str,
}

impl<'a> WebhookRequest<'a> {
    pub fn new(
        number: &'a str,
        received_at: OffsetDateTime,
        message: &'a str,
    ) -> Result<Self, time::error::Format> {
        Ok(Self {
            number,
            time: received_at.format(&Rfc3339)?,
            message,
        })
    }

    pub fn from_message(message: &'a InboundMessage) -> Result<Self, time::error::Format> {
        Self::new(&message.sender, message.received_at, &message.text)
    }
}

/// Which way a notification goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Answer to the sender of the inbound message
    Reply,
    /// Alert to the administrator number
    Admin,
}

/// Text about to leave the bridge. The text is truncated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    pub recipient: String,
    pub text: String,
    pub channel: Channel,
}

impl OutboundNotification {
    pub fn new(recipient: impl Into<String>, text: &str, channel: Channel, max_len: usize) -> Self {
        Self {
            recipient: recipient.into(),
            text: truncate_chars(text, max_len).to_string(),
            channel,
        }
    }

    pub fn as_send_request(&self) -> SendRequest<'_> {
        SendRequest {
            to: &self.recipient,
            text: &self.text,
        }
    }
}

/// Cut `text` to at most `max` characters without splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Utility to create a correlation id when the modem doesn't provide one.
pub fn fallback_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lightweight header representation to avoid tying the core to any HTTP stack.
pub type Headers = Vec<(String, String)>;

/// Framework-agnostic response of the decision endpoint
#[derive(Debug, Clone)]
pub struct DecisionResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl DecisionResponse {
    pub fn text(status: HttpStatus, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    pub fn empty(status: HttpStatus) -> Self {
        Self::text(status, String::new())
    }
}

/// The modem collaborator: everything the pipeline needs to send SMS.
#[async_trait]
pub trait Modem: Send + Sync {
    /// Send a single text SMS.
    async fn send(&self, req: SendRequest<'_>) -> Result<(), ModemError>;

    /// Answer the sender of `message`.
    async fn reply(&self, message: &InboundMessage, text: &str) -> Result<(), ModemError> {
        self.send(SendRequest {
            to: &message.sender,
            text,
        })
        .await
    }
}

/// A decision service consulted once per inbound message.
#[async_trait]
pub trait Webhook: Send + Sync {
    /// Never fails: every fault is folded into [`WebhookOutcome::Failure`].
    async fn call(&self, message: &InboundMessage) -> WebhookOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use time::macros::datetime;

    #[test]
    fn failure_labels() {
        assert_eq!(FailureKind::Connection.to_string(), "CONNECTION ERROR RAISED");
        assert_eq!(FailureKind::Timeout.to_string(), "TIMEOUT ERROR RAISED");
        assert_eq!(
            FailureKind::HttpStatus { code: 501 }.to_string(),
            "HTTP ERROR 501 RAISED"
        );
        assert_eq!(FailureKind::Unknown.to_string(), "UNKNOWN ERROR RAISED");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 3), "");
        // multi-byte characters are never split
        assert_eq!(truncate_chars("çãéõ", 2), "çã");
    }

    #[test]
    fn notification_is_truncated_on_construction() {
        let long = "x".repeat(250);
        let n =
            OutboundNotification::new("+5511900000000", &long, Channel::Reply, MAX_SMS_TEXT_LEN);
        assert_eq!(n.text.chars().count(), MAX_SMS_TEXT_LEN);
        assert_eq!(n.as_send_request().to, "+5511900000000");
    }

    #[test]
    fn webhook_request_serializes_rfc3339_time() {
        let mut msg = InboundMessage::new(
            "+5511900000000",
            datetime!(2024-03-01 12:30:00 -3),
            "CAFE",
        );
        msg.id = "fixed".into();
        let req = WebhookRequest::from_message(&msg).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["number"], "+5511900000000");
        assert_eq!(json["time"], "2024-03-01T12:30:00-03:00");
        assert_eq!(json["message"], "CAFE");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn inbound_message_accepts_mixed_string_types() {
        let sender = String::from("+5511900000000");
        let msg = InboundMessage::new(sender, OffsetDateTime::UNIX_EPOCH, "CAFE");
        assert_eq!(msg.sender, "+5511900000000");
        assert_eq!(msg.text, "CAFE");
        assert!(!msg.id.is_empty());

        let owned_text =
            InboundMessage::new("+5511900000000", OffsetDateTime::UNIX_EPOCH, String::new());
        assert!(owned_text.text.is_empty());
    }

    #[test]
    fn outcome_helpers() {
        let ok = WebhookOutcome::Success { body: "hi".into() };
        assert!(ok.is_success());
        assert_eq!(ok.failure_kind(), None);

        let err = WebhookOutcome::Failure {
            kind: FailureKind::Timeout,
            diagnostic: String::new(),
        };
        assert!(!err.is_success());
        assert_eq!(err.failure_kind(), Some(FailureKind::Timeout));
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Modem for Recorder {
        async fn send(&self, req: SendRequest<'_>) -> Result<(), ModemError> {
            self.sent
                .lock()
                .unwrap()
                .push((req.to.to_string(), req.text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_reply_addresses_sender() {
        let modem = Recorder::default();
        let msg = InboundMessage::new("+5511911111111", OffsetDateTime::UNIX_EPOCH, "oi");
        modem.reply(&msg, "resposta").await.unwrap();
        let sent = modem.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[("+5511911111111".to_string(), "resposta".to_string())]
        );
    }

    #[test]
    fn decision_response_is_plain_text() {
        let r = DecisionResponse::text(HttpStatus::Created, "com leite");
        assert_eq!(r.status.as_u16(), 201);
        assert!(r.content_type.starts_with("text/plain"));
        assert!(DecisionResponse::empty(HttpStatus::BadRequest).body.is_empty());
    }
}
