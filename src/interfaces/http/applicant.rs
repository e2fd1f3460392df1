use super::AppState;
use super::response::JsonBody;
use crate::application::status::StatusView;
use crate::domain::application::{ApplicationId, ApplicationRecord};
use crate::domain::profile::ApplicantProfile;
use crate::error::{AdmissionError, FieldError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: ApplicationRecord,
}

impl RecordResponse {
    fn ok(record: ApplicationRecord) -> Json<Self> {
        Json(Self {
            success: true,
            record,
        })
    }
}

pub async fn submit(
    State(state): State<AppState>,
    JsonBody(profile): JsonBody<ApplicantProfile>,
) -> Result<(StatusCode, Json<RecordResponse>), AdmissionError> {
    let record = state.engine.submit(profile).await?;
    Ok((StatusCode::CREATED, RecordResponse::ok(record)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SlotRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub test_date: Option<String>,
    #[serde(default)]
    pub test_time: Option<String>,
}

fn require(value: Option<String>, field: &str, errors: &mut Vec<FieldError>) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            errors.push(FieldError::required(field));
            String::new()
        }
    }
}

pub async fn book_test_slot(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SlotRequest>,
) -> Result<Json<RecordResponse>, AdmissionError> {
    let mut errors = Vec::new();
    let email = require(request.email, "email", &mut errors);
    let date = require(request.test_date, "test_date", &mut errors);
    let time = require(request.test_time, "test_time", &mut errors);
    if !errors.is_empty() {
        return Err(AdmissionError::Validation(errors));
    }

    let record = state.engine.book_test_slot(&email, &date, &time).await?;
    Ok(RecordResponse::ok(record))
}

#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<StatusView>, AdmissionError> {
    let email = query.email.unwrap_or_default();
    Ok(Json(state.engine.application_status(&email).await?))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EmailQuery>,
) -> Result<StatusCode, AdmissionError> {
    let id: ApplicationId = id.parse()?;
    state
        .engine
        .withdraw(id, query.email.as_deref().unwrap_or_default())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
