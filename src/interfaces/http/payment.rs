use super::AppState;
use super::auth::SIGNATURE_HEADER;
use super::response::parse_json;
use crate::application::callback::PaymentNotification;
use crate::application::payment::{InitiatePayment, PaymentSession};
use crate::error::AdmissionError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{Value, json};

/// Raw body so that an empty body and malformed JSON get their own codes.
pub async fn initiate(State(state): State<AppState>, body: Bytes) -> Result<Json<PaymentSession>, AdmissionError> {
    let value: Value = parse_json(&body)?;
    let request = if value.is_null() {
        InitiatePayment::default()
    } else {
        serde_json::from_value(value).map_err(|e| AdmissionError::InvalidJson(e.to_string()))?
    };
    Ok(Json(state.engine.initiate_payment(request).await?))
}

/// Gateway notification endpoint. Acknowledges everything that names an
/// intent, matched or not.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AdmissionError> {
    if let Some(verifier) = &state.callback_verifier {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verifier.verify(&body, signature)?;
    }

    let notification: PaymentNotification = parse_json(&body)?;
    state.engine.handle_payment_callback(notification).await?;
    Ok(Json(json!({ "message": "Callback processed" })))
}
