//! HTTP API for SOAP generation
//!
//! `POST /api/consultations/:id/generate-soap` runs the pipeline for a stored
//! consultation. Error bodies carry generic messages only; internal error text
//! is added when debug mode is on.

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::consultation::ConsultationSource;
use crate::context::{ConsultationContext, HISTORY_WINDOW};
use crate::error::SoapError;
use crate::generator::SoapGenerator;
use crate::parser::SoapResult;

const MSG_NOT_CONFIGURED: &str = "AI service is not configured. Please contact administrator.";
const MSG_NOT_FOUND: &str = "Consultation not found";
const MSG_CHIEF_COMPLAINT_REQUIRED: &str = "Chief complaint is required to generate SOAP notes.";
const MSG_GENERATION_FAILED: &str = "Failed to generate SOAP notes. Please try again.";

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub generator: SoapGenerator,
    pub source: Arc<dyn ConsultationSource>,
    pub debug: bool,
}

/// Response body of the generate endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soap: Option<SoapResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_used: Option<ConsultationContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            soap: None,
            context_used: None,
            error: None,
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_endpoint))
        .route("/api/consultations/:id/generate-soap", post(generate_soap))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

    info!("clinic-soap listening on {}", addr);
    if !state.generator.is_configured() {
        warn!("No LLM configured; generate requests will return 503");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

async fn health_endpoint(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "healthy": true,
        "service": "clinic-soap",
        "llm_configured": state.generator.is_configured(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn generate_soap(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult {
    // Checked before any lookup so an unconfigured deployment never reaches a provider
    if !state.generator.is_configured() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::failure(MSG_NOT_CONFIGURED)),
        );
    }

    let record = match state.source.consultation(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return (StatusCode::NOT_FOUND, Json(ApiResponse::failure(MSG_NOT_FOUND))),
        Err(e) => {
            error!("Failed to load consultation {}: {:#}", id, e);
            return internal_failure(&state, e.to_string());
        }
    };

    if record.consultation.chief_complaint.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failure(MSG_CHIEF_COMPLAINT_REQUIRED)),
        );
    }

    let prior_visits = match state
        .source
        .prior_visits(record.patient.id, id, HISTORY_WINDOW)
        .await
    {
        Ok(visits) => visits,
        Err(e) => {
            error!("Failed to load history for consultation {}: {:#}", id, e);
            return internal_failure(&state, e.to_string());
        }
    };

    match state.generator.generate(&record, &prior_visits).await {
        Ok(generation) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                message: None,
                soap: Some(generation.soap),
                context_used: Some(generation.context_used),
                error: None,
            }),
        ),
        Err(e) => {
            error!("Error generating SOAP notes for consultation {}: {}", id, e);
            let status = status_for(&e);
            let mut body = ApiResponse::failure(e.user_message());
            if state.debug {
                body.error = Some(e.to_string());
            }
            (status, Json(body))
        }
    }
}

fn status_for(err: &SoapError) -> StatusCode {
    match err {
        SoapError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        SoapError::Parse { .. } => StatusCode::BAD_GATEWAY,
        SoapError::Provider { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn internal_failure(state: &AppState, detail: String) -> ApiResult {
    let mut body = ApiResponse::failure(MSG_GENERATION_FAILED);
    if state.debug {
        body.error = Some(detail);
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}
