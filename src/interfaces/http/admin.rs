use super::AppState;
use super::auth::IssuedToken;
use super::response::JsonBody;
use crate::application::admin::{AdmissionStats, ApplicationFilter, ApplicationUpdate, Page, PageRequest};
use crate::domain::admin_log::AdminLogEntry;
use crate::domain::application::{ApplicationId, ApplicationRecord};
use crate::domain::ports::Clock;
use crate::domain::status::{ApplicationStatus, PaymentStatus};
use crate::error::{AdmissionError, FieldError};
use crate::interfaces::csv::application_writer::to_csv_bytes;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

/// An authenticated administrator, taken from `Authorization: Bearer`.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub actor: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AdmissionError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| AdmissionError::Unauthorized("bearer token required".into()))?;

        let actor = state
            .admin_auth
            .verify(token, state.engine.clock().now())
            .inspect_err(|_| warn!(route = %parts.uri.path(), "Rejected admin token"))?;
        Ok(Self { actor })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<IssuedToken>, AdmissionError> {
    let issued = state
        .admin_auth
        .login(&request.email, &request.password, state.engine.clock().now())
        .inspect_err(|_| warn!("Failed admin login"))?;
    Ok(Json(issued))
}

/// Listing query. Everything arrives as text and is parsed here so a bad
/// value is reported as a field error.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub academic_year: Option<String>,
    pub grade: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub format: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_field<T: std::str::FromStr>(
    value: Option<String>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = non_empty(value)?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.push(FieldError::new(field, format!("'{raw}' is not a valid {field}")));
            None
        }
    }
}

impl ListQuery {
    fn into_parts(self) -> Result<(ApplicationFilter, PageRequest, Option<String>), AdmissionError> {
        let mut errors = Vec::new();
        let status = parse_field::<ApplicationStatus>(self.status, "status", &mut errors);
        let payment_status = parse_field::<PaymentStatus>(self.payment_status, "payment_status", &mut errors);
        let page = parse_field::<usize>(self.page, "page", &mut errors);
        let limit = parse_field::<usize>(self.limit, "limit", &mut errors);
        if !errors.is_empty() {
            return Err(AdmissionError::Validation(errors));
        }

        let filter = ApplicationFilter {
            status,
            payment_status,
            admission_period: non_empty(self.academic_year),
            grade: non_empty(self.grade),
            search: non_empty(self.search),
        };
        Ok((filter, PageRequest::new(page, limit), non_empty(self.format)))
    }
}

pub async fn list_applications(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<ApplicationRecord>>, AdmissionError> {
    let (filter, page, _) = query.into_parts()?;
    Ok(Json(state.engine.list_applications(&filter, page).await?))
}

pub async fn get_application(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApplicationRecord>, AdmissionError> {
    let id: ApplicationId = id.parse()?;
    Ok(Json(state.engine.get_application(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub test_result: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

pub async fn update_application(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateRequest>,
) -> Result<Json<ApplicationRecord>, AdmissionError> {
    let id: ApplicationId = id.parse()?;
    let mut errors = Vec::new();
    let status = parse_field::<ApplicationStatus>(request.status, "status", &mut errors);
    if !errors.is_empty() {
        return Err(AdmissionError::Validation(errors));
    }

    let update = ApplicationUpdate {
        status,
        test_result: request.test_result,
        admin_notes: request.admin_notes,
    };
    Ok(Json(
        state.engine.update_application(id, update, &admin.actor).await?,
    ))
}

pub async fn stats(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<AdmissionStats>, AdmissionError> {
    Ok(Json(state.engine.admission_stats().await?))
}

pub async fn export(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AdmissionError> {
    let (filter, _, format) = query.into_parts()?;
    let records = state.engine.export_applications(&filter).await?;

    match format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("csv") => {
            let bytes = to_csv_bytes(&records)?;
            Ok((
                [
                    (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
                    (
                        header::CONTENT_DISPOSITION,
                        HeaderValue::from_static("attachment; filename=\"applications.csv\""),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
        Some("json") => Ok(Json(records).into_response()),
        Some(other) => Err(AdmissionError::Validation(vec![FieldError::new(
            "format",
            format!("'{other}' is not a supported export format (csv, json)"),
        )])),
    }
}

pub async fn logs(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AdminLogEntry>>, AdmissionError> {
    let (_, page, _) = query.into_parts()?;
    Ok(Json(state.engine.admin_logs(page).await?))
}
