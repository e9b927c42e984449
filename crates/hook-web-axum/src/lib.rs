use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use hook_core::DecisionResponse;
use hook_web_generic::{DecisionProcessor, ResponseConverter, SMS_PATH};

#[derive(Clone, Default)]
pub struct AppState {
    pub processor: DecisionProcessor,
}

/// Axum-specific response converter
pub struct AxumResponseConverter;

impl ResponseConverter for AxumResponseConverter {
    type ResponseType = Response;

    fn from_decision_response(response: DecisionResponse) -> Self::ResponseType {
        let status = StatusCode::from_u16(response.status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, response.content_type)],
            response.body,
        )
            .into_response()
    }
}

/// Decision handler: POST /sms
pub async fn sms_webhook(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> impl IntoResponse {
    let response = state
        .processor
        .process_request(SMS_PATH, method.as_str(), &body);
    AxumResponseConverter::from_decision_response(response)
}

/// Any other path or method is answered by the processor as well, which rejects it.
pub async fn fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    let response = state
        .processor
        .process_request(uri.path(), method.as_str(), &body);
    AxumResponseConverter::from_decision_response(response)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(SMS_PATH, post(sms_webhook).fallback(fallback))
        .fallback(fallback)
        .with_state(state)
}
