use crate::domain::application::ApplicationId;
use crate::domain::status::ApplicationStatus;
use axum::http::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdmissionError>;

/// A single failing input field, reported alongside every other failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("{field} is required");
        Self { field, message }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("an application for {email} already exists for period {period}")]
    Conflict { email: String, period: String },
    #[error("application {0} was changed by another request")]
    Stale(ApplicationId),
    #[error("application {0} no longer exists")]
    NotFound(ApplicationId),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl StoreError {
    /// The record moved under a read-modify-write; re-reading may succeed.
    pub fn is_write_race(&self) -> bool {
        matches!(self, Self::Stale(_) | Self::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment gateway error (HTTP {status})")]
    Status {
        status: u16,
        body: serde_json::Value,
    },
    #[error("payment gateway did not respond within {0:?}")]
    Timeout(Duration),
    #[error("payment gateway request failed: {0}")]
    Transport(String),
    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the admission workflow.
///
/// Each variant carries a stable machine-readable [`code`](Self::code) so
/// callers can tell failures apart without parsing messages.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("an application for {email} already exists for {period}")]
    Duplicate { email: String, period: String },
    #[error("admission form not found for {0}")]
    FormNotFound(String),
    #[error("application {0} not found")]
    ApplicationNotFound(String),
    #[error("invalid test time: {0}")]
    InvalidHour(String),
    #[error("invalid test date: {0}")]
    InvalidDate(String),
    #[error("application cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("{0}")]
    InvalidState(String),
    #[error("email parameter is required")]
    MissingEmail,
    #[error("valid email string is required")]
    InvalidEmail,
    #[error("amount must be a positive number (got {0})")]
    InvalidAmount(String),
    #[error("server configuration error, missing: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),
    #[error("student name is required before payment")]
    MissingStudentName,
    #[error("application fee has already been paid")]
    AlreadyPaid,
    #[error("application {0} is being changed by another request, try again")]
    ConcurrentUpdate(ApplicationId),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("database error: {0}")]
    Store(#[from] StoreError),
    #[error("request body is required")]
    EmptyBody,
    #[error("request body must be valid JSON: {0}")]
    InvalidJson(String),
    #[error("no paymentIntentId in callback payload")]
    MissingPaymentIntentId,
    #[error("invalid callback signature")]
    InvalidSignature,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Duplicate { .. } => "DUPLICATE_APPLICATION",
            Self::FormNotFound(_) => "FORM_NOT_FOUND",
            Self::ApplicationNotFound(_) => "APPLICATION_NOT_FOUND",
            Self::InvalidHour(_) => "INVALID_HOUR",
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::InvalidTransition { .. } | Self::InvalidState(_) => "INVALID_STATE",
            Self::MissingEmail => "MISSING_EMAIL",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::MissingEnv(_) => "MISSING_ENV",
            Self::MissingStudentName => "MISSING_STUDENT_NAME",
            Self::AlreadyPaid => "ALREADY_PAID",
            Self::ConcurrentUpdate(_) => "CONCURRENT_UPDATE",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Store(_) => "DB_ERROR",
            Self::EmptyBody => "EMPTY_BODY",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::MissingPaymentIntentId => "MISSING_PAYMENT_INTENT_ID",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Csv(_) | Self::Internal(_) => "UNEXPECTED_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidHour(_)
            | Self::InvalidDate(_)
            | Self::MissingEmail
            | Self::InvalidEmail
            | Self::InvalidAmount(_)
            | Self::EmptyBody
            | Self::InvalidJson(_)
            | Self::MissingPaymentIntentId => StatusCode::BAD_REQUEST,
            Self::FormNotFound(_) | Self::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
            Self::Duplicate { .. }
            | Self::InvalidTransition { .. }
            | Self::InvalidState(_)
            | Self::AlreadyPaid
            | Self::ConcurrentUpdate(_) => StatusCode::CONFLICT,
            Self::MissingEnv(_) | Self::MissingStudentName => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidSignature | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Csv(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal failures whose detail is logged but never returned to callers.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Csv(_) | Self::Internal(_))
    }
}
