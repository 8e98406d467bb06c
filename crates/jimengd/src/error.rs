use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jimeng_core::error::BridgeError;
use jimeng_core::types::ApiResponse;
use serde_json::{json, Value};

/// A [`BridgeError`] on its way out of a handler, plus whatever request
/// diagnostics help the caller see what went wrong.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) error: BridgeError,
    pub(crate) debug: Option<Value>,
}

impl ApiError {
    pub(crate) fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self.error {
            BridgeError::EmptyPrompt | BridgeError::MalformedArguments { .. } => {
                StatusCode::BAD_REQUEST
            }
            BridgeError::MissingCredential => StatusCode::UNAUTHORIZED,
            BridgeError::GenerationBackend(_) | BridgeError::Detection(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(error: BridgeError) -> Self {
        let debug = match &error {
            BridgeError::MalformedArguments { raw, .. } => Some(json!({ "argumentsValue": raw })),
            _ => None,
        };
        Self { error, debug }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<Value> {
            ok: false,
            code: Some(self.error.code().to_string()),
            data: self.debug,
            error: Some(self.error.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
