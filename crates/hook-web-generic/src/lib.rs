use hook_core::{DecisionError, DecisionResponse, HttpStatus};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// The only route the decision endpoint answers.
pub const SMS_PATH: &str = "/sms";

/// Body posted by the bridge. Extra fields (`number`, `time`) are ignored.
#[derive(Debug, Deserialize)]
pub struct SmsPayload {
    pub message: String,
}

/// Framework-agnostic processor that answers the bridge's webhook calls
#[derive(Clone)]
pub struct DecisionProcessor {
    clock: fn() -> OffsetDateTime,
}

impl Default for DecisionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionProcessor {
    pub fn new() -> Self {
        Self::with_clock(OffsetDateTime::now_utc)
    }

    /// Fix the clock used by the `AGORA` branch.
    pub fn with_clock(clock: fn() -> OffsetDateTime) -> Self {
        Self { clock }
    }

    /// Process an incoming request and return a framework-agnostic response
    pub fn process_request(&self, path: &str, method: &str, body: &[u8]) -> DecisionResponse {
        info!(
            path,
            method,
            body = %String::from_utf8_lossy(body),
            "request received"
        );
        let response = match self.process_request_internal(path, method, body) {
            Ok(response) => response,
            Err(e) => self.error_to_response(e),
        };
        info!(
            status = response.status.as_u16(),
            body = %response.body,
            "sending HTTP response"
        );
        response
    }

    fn process_request_internal(
        &self,
        path: &str,
        method: &str,
        body: &[u8],
    ) -> Result<DecisionResponse, DecisionError> {
        if !method.eq_ignore_ascii_case("POST") {
            return Err(DecisionError::UnsupportedMethod(method.to_string()));
        }
        if path != SMS_PATH {
            return Err(DecisionError::RouteNotFound(path.to_string()));
        }
        debug!("processing received SMS data");
        let payload: SmsPayload = serde_json::from_slice(body)
            .map_err(|e| DecisionError::ParseError(e.to_string()))?;
        Ok(decide(&payload.message, (self.clock)()))
    }

    fn error_to_response(&self, error: DecisionError) -> DecisionResponse {
        match error {
            DecisionError::RouteNotFound(path) => {
                debug!(%path, "no such route");
                DecisionResponse::empty(HttpStatus::BadRequest)
            }
            DecisionError::ParseError(msg) => {
                warn!("rejecting malformed SMS payload: {}", msg);
                DecisionResponse::empty(HttpStatus::BadRequest)
            }
            DecisionError::UnsupportedMethod(method) => {
                debug!(%method, "only POST is handled");
                DecisionResponse::empty(HttpStatus::NotImplemented)
            }
        }
    }
}

/// The sample decision function.
pub fn decide(message: &str, now: OffsetDateTime) -> DecisionResponse {
    match message {
        "ERRO" => DecisionResponse::empty(HttpStatus::NotImplemented),
        "CAFE" => DecisionResponse::text(HttpStatus::Created, "com leite"),
        "AGORA" => {
            DecisionResponse::text(HttpStatus::Ok, now.format(&Rfc3339).unwrap_or_default())
        }
        _ => DecisionResponse::empty(HttpStatus::Ok),
    }
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_decision_response(response: DecisionResponse) -> Self::ResponseType;
}
