//! # Hook Webhook
//!
//! HTTP client that forwards one inbound SMS to the decision webhook and
//! folds every possible result into a [`WebhookOutcome`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use hook_webhook::WebhookClient;
//!
//! let client = WebhookClient::new("http://127.0.0.1:5009/sms", Duration::from_millis(2000));
//! let outcome = client.call_webhook("+5511900000000", received_at, "CAFE").await;
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use hook_core::{FailureKind, Headers, InboundMessage, Webhook, WebhookOutcome, WebhookRequest};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use time::OffsetDateTime;
use tracing::{debug, error, info};

const METHOD: &str = "POST";
const JSON: &str = "application/json";

/// Webhook REST client.
#[derive(Clone, Debug)]
pub struct WebhookClient {
    /// Target URL; override for testing/mocking.
    pub url: String,
    /// Hard bound on a whole attempt, connect to last body byte.
    pub timeout: Duration,
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new<S: Into<String>>(url: S, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_timeout_ms<S: Into<String>>(url: S, timeout_ms: u64) -> Self {
        Self::new(url, Duration::from_millis(timeout_ms))
    }

    /// Post `{number, time, message}` once and classify what happened.
    pub async fn call_webhook(
        &self,
        sender: &str,
        received_at: OffsetDateTime,
        text: &str,
    ) -> WebhookOutcome {
        let body = match encode_body(sender, received_at, text) {
            Ok(body) => body,
            Err(e) => return self.failure(e, &Headers::new(), None),
        };
        let request = match self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, JSON)
            .timeout(self.timeout)
            .body(body.clone())
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                return self.failure(CallError::Transport(e), &Headers::new(), Some(body.as_str()))
            }
        };
        let headers = header_pairs(request.headers());
        debug!(url = %self.url, body = %body, "posting to webhook");

        let attempt = AssertUnwindSafe(self.execute(request)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(CallError::Panicked(panic_message(panic))),
            Err(_) => Err(CallError::Deadline(self.timeout)),
        };

        match result {
            Ok(reply) => {
                info!(url = %self.url, bytes = reply.len(), "webhook answered");
                WebhookOutcome::Success { body: reply }
            }
            Err(e) => self.failure(e, &headers, Some(body.as_str())),
        }
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String, CallError> {
        let res = self
            .http
            .execute(request)
            .await
            .map_err(CallError::Transport)?;

        let status = res.status().as_u16();
        let text = res.text().await;
        if !(200..300).contains(&status) {
            return Err(CallError::Status {
                status,
                body: text.unwrap_or_default(),
            });
        }
        text.map_err(|source| CallError::Body { status, source })
    }

    fn failure(&self, err: CallError, headers: &Headers, body: Option<&str>) -> WebhookOutcome {
        let kind = err.kind();
        let diagnostic = self.report(kind, &err, headers, body);
        error!(
            url = %self.url,
            method = METHOD,
            status = ?err.status(),
            "webhook call failed: {}\n{}",
            kind,
            diagnostic
        );
        WebhookOutcome::Failure { kind, diagnostic }
    }

    fn report(
        &self,
        kind: FailureKind,
        err: &CallError,
        headers: &Headers,
        body: Option<&str>,
    ) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{kind}");
        let _ = writeln!(out, "Request:");
        let _ = writeln!(out, "    URL: {}", self.url);
        let _ = writeln!(out, "    Method: {METHOD}");
        if headers.is_empty() {
            let _ = writeln!(out, "    Headers: N/A");
        } else {
            let _ = writeln!(out, "    Headers:");
            for (name, value) in headers {
                let _ = writeln!(out, "        {name}: {value}");
            }
        }
        let _ = writeln!(out, "    Data: {}", body.unwrap_or("N/A"));

        let _ = writeln!(out, "Response:");
        match err.status() {
            Some(status) => {
                let _ = writeln!(out, "    Status: {status}");
            }
            None => {
                let _ = writeln!(out, "    Status: N/A");
            }
        }
        let _ = writeln!(out, "    Data: {}", err.response_body().unwrap_or("N/A"));

        let _ = writeln!(out, "Cause:");
        let mut cause: Option<&(dyn StdError + 'static)> = Some(err);
        let mut depth = 0;
        while let Some(e) = cause {
            let _ = writeln!(out, "    {depth}: {e}");
            cause = e.source();
            depth += 1;
        }
        out
    }
}

#[async_trait]
impl Webhook for WebhookClient {
    async fn call(&self, message: &InboundMessage) -> WebhookOutcome {
        self.call_webhook(&message.sender, message.received_at, &message.text)
            .await
    }
}

fn encode_body(sender: &str, received_at: OffsetDateTime, text: &str) -> Result<String, CallError> {
    let payload = WebhookRequest::new(sender, received_at, text).map_err(CallError::Time)?;
    serde_json::to_string(&payload).map_err(CallError::Encode)
}

fn header_pairs(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), value)
        })
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Everything that can go wrong between encoding the body and reading the reply.
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("request failed")]
    Transport(#[source] reqwest::Error),
    #[error("webhook answered HTTP {status}")]
    Status { status: u16, body: String },
    #[error("reading response body failed (HTTP {status})")]
    Body {
        status: u16,
        #[source]
        source: reqwest::Error,
    },
    #[error("no response within {0:?}")]
    Deadline(Duration),
    #[error("timestamp formatting failed")]
    Time(#[source] time::error::Format),
    #[error("payload encoding failed")]
    Encode(#[source] serde_json::Error),
    #[error("webhook call panicked: {0}")]
    Panicked(String),
}

impl CallError {
    // Timeouts win over connection errors: a connect that times out is a timeout.
    fn kind(&self) -> FailureKind {
        match self {
            CallError::Transport(e) if e.is_timeout() => FailureKind::Timeout,
            CallError::Transport(e) if e.is_connect() || is_connection_io(e) => {
                FailureKind::Connection
            }
            CallError::Body { source, .. } if source.is_timeout() => FailureKind::Timeout,
            CallError::Body { source, .. } if is_connection_io(source) => FailureKind::Connection,
            CallError::Deadline(_) => FailureKind::Timeout,
            CallError::Status { status, .. } => FailureKind::HttpStatus { code: *status },
            _ => FailureKind::Unknown,
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            CallError::Status { status, .. } | CallError::Body { status, .. } => Some(*status),
            CallError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn response_body(&self) -> Option<&str> {
        match self {
            CallError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Reset/aborted/refused sockets surface as plain request errors once the
/// connection is established; find them in the cause chain.
fn is_connection_io(err: &reqwest::Error) -> bool {
    let mut cause = err.source();
    while let Some(e) = cause {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
            );
        }
        cause = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SENDER: &str = "+5511900000000";

    fn received_at() -> OffsetDateTime {
        datetime!(2024-03-01 12:30:00 UTC)
    }

    async fn client_for(server: &MockServer, timeout_ms: u64) -> WebhookClient {
        WebhookClient::with_timeout_ms(format!("{}/sms", server.uri()), timeout_ms)
    }

    #[tokio::test]
    async fn posts_json_and_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "number": SENDER,
                "time": "2024-03-01T12:30:00Z",
                "message": "CAFE"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_string("com leite"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 2000).await;
        let outcome = client.call_webhook(SENDER, received_at(), "CAFE").await;

        assert_eq!(
            outcome,
            WebhookOutcome::Success {
                body: "com leite".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_success_body_is_still_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server, 2000).await;
        let outcome = client.call_webhook(SENDER, received_at(), "oi").await;
        assert_eq!(outcome, WebhookOutcome::Success { body: String::new() });
    }

    #[tokio::test]
    async fn non_2xx_is_http_status_failure_with_diagnostic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms"))
            .respond_with(ResponseTemplate::new(501).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 2000).await;
        let outcome = client.call_webhook(SENDER, received_at(), "ERRO").await;

        let WebhookOutcome::Failure { kind, diagnostic } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, FailureKind::HttpStatus { code: 501 });
        assert!(diagnostic.starts_with("HTTP ERROR 501 RAISED"));
        assert!(diagnostic.contains(&client.url));
        assert!(diagnostic.contains("Method: POST"));
        assert!(diagnostic.contains("content-type: application/json"));
        assert!(diagnostic.contains(r#""message":"ERRO""#));
        assert!(diagnostic.contains("Status: 501"));
        assert!(diagnostic.contains("Data: nope"));
        assert!(diagnostic.contains("webhook answered HTTP 501"));
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too late")
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, 100).await;
        let started = std::time::Instant::now();
        let outcome = client.call_webhook(SENDER, received_at(), "AGORA").await;

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn refused_connection_is_connection_failure() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WebhookClient::with_timeout_ms(format!("http://127.0.0.1:{port}/sms"), 2000);
        let outcome = client.call_webhook(SENDER, received_at(), "CAFE").await;

        let WebhookOutcome::Failure { kind, diagnostic } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, FailureKind::Connection);
        assert!(diagnostic.contains("Status: N/A"));
    }

    #[tokio::test]
    async fn malformed_url_is_unknown_failure() {
        let client = WebhookClient::with_timeout_ms("not a url", 2000);
        let outcome = client.call_webhook(SENDER, received_at(), "CAFE").await;

        let WebhookOutcome::Failure { kind, diagnostic } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, FailureKind::Unknown);
        // the request was never built, so there are no headers to report
        assert!(diagnostic.contains("Headers: N/A"));
        assert!(diagnostic.contains(r#""message":"CAFE""#));
    }

    #[test]
    fn report_lists_the_headers_given() {
        let client = WebhookClient::with_timeout_ms("http://127.0.0.1:5009/sms", 2000);
        let headers: Headers = vec![
            ("content-type".into(), "application/json".into()),
            ("x-request-id".into(), "abc".into()),
        ];
        let err = CallError::Status {
            status: 500,
            body: "boom".into(),
        };
        let report = client.report(err.kind(), &err, &headers, Some("{}"));
        assert!(report.contains("    Headers:\n        content-type: application/json\n"));
        assert!(report.contains("        x-request-id: abc\n"));
    }

    #[test]
    fn header_pairs_reflect_the_built_request() {
        let request = reqwest::Client::new()
            .post("http://127.0.0.1:5009/sms")
            .header(CONTENT_TYPE, JSON)
            .body("{}")
            .build()
            .unwrap();
        assert_eq!(
            header_pairs(request.headers()),
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[tokio::test]
    async fn trait_call_uses_message_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "number": "+5511922222222",
                "time": "2024-03-01T12:30:00Z",
                "message": "bom dia"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 2000).await;
        let message = InboundMessage::new("+5511922222222", received_at(), "bom dia");
        let webhook: &dyn Webhook = &client;
        assert!(webhook.call(&message).await.is_success());
    }

    #[test]
    fn classification_of_synthetic_errors() {
        assert_eq!(
            CallError::Deadline(Duration::from_millis(5)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            CallError::Status {
                status: 404,
                body: String::new()
            }
            .kind(),
            FailureKind::HttpStatus { code: 404 }
        );
        assert_eq!(
            CallError::Panicked("boom".into()).kind(),
            FailureKind::Unknown
        );
    }
}
