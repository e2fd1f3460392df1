use crate::error::{AdmissionError, GatewayError};
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, warn};

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl AdmissionError {
    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(fields) => Some(json!({ "fields": fields })),
            Self::MissingEnv(missing) => Some(json!({ "missing": missing })),
            Self::Gateway(GatewayError::Status { status, body }) => {
                Some(json!({ "status": status, "body": body }))
            }
            Self::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            _ => None,
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let body = if self.is_internal() {
            error!(code, error = %self, "Request failed");
            ErrorBody {
                code,
                error: GENERIC_MESSAGE.to_string(),
                details: None,
            }
        } else {
            if status.is_server_error() {
                warn!(code, error = %self, "Upstream failure");
            }
            ErrorBody {
                code,
                error: self.to_string(),
                details: self.details(),
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Parses a raw request body, telling an empty body apart from bad JSON.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, AdmissionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AdmissionError::EmptyBody);
    }
    serde_json::from_slice(body).map_err(|e| AdmissionError::InvalidJson(e.to_string()))
}

/// JSON body extractor whose rejections use the service's error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AdmissionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AdmissionError::InvalidJson(e.body_text()))?;
        parse_json(&bytes).map(JsonBody)
    }
}
