//! JSON-over-HTTP surface of the admission workflow.
//!
//! Every handler is a thin adapter: decode the request, call one
//! `AdmissionEngine` method, encode the result. Errors leave as
//! `{ "code", "error", "details"? }` with the status from
//! `AdmissionError::status_code`.

pub mod admin;
pub mod applicant;
pub mod auth;
pub mod payment;
pub mod request_id;
pub mod response;

use crate::application::AdmissionEngine;
use auth::{AdminAuth, CallbackVerifier};
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AdmissionEngine>,
    pub admin_auth: Arc<AdminAuth>,
    /// Absent when no callback signing secret is configured.
    pub callback_verifier: Option<Arc<CallbackVerifier>>,
}

impl AppState {
    pub fn new(engine: AdmissionEngine, admin_auth: AdminAuth, callback_verifier: Option<CallbackVerifier>) -> Self {
        Self {
            engine: Arc::new(engine),
            admin_auth: Arc::new(admin_auth),
            callback_verifier: callback_verifier.map(Arc::new),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/admissions", post(applicant::submit))
        .route("/api/admissions/status", get(applicant::status))
        .route("/api/admissions/test-slot", post(applicant::book_test_slot))
        .route("/api/admissions/{id}", delete(applicant::withdraw))
        .route("/api/payments/intent", post(payment::initiate))
        .route("/api/payments/callback", post(payment::callback))
        .route("/payment-callback", post(payment::callback))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/applications", get(admin::list_applications))
        .route(
            "/api/admin/applications/{id}",
            get(admin::get_application).put(admin::update_application),
        )
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/export", get(admin::export))
        .route("/api/admin/logs", get(admin::logs))
        .layer(middleware::from_fn(request_id::request_tracing_middleware))
        .with_state(state)
}

/// Serves `state` on `listener` until Ctrl+C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let address = listener.local_addr()?;
    info!(%address, "Server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
