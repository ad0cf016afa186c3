//! Shared HTTP plumbing: application state, the response envelope, and
//! the router.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use siem_core::EngineError;
use siem_engine::{EventSource, RiskEngine, SiemStore, ThreatAnalysisJob};

use crate::{analysis_api, health, risk_api, threat_api};

pub struct AppState {
    pub store: Arc<dyn SiemStore>,
    pub risk: Arc<RiskEngine>,
    pub job: Arc<ThreatAnalysisJob>,
    pub source: Arc<dyn EventSource>,
}

pub type SharedState = Arc<AppState>;

/// Uniform response envelope; every endpoint returns one.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub fn err(msg: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        })
    }
}

/// Engine failures mapped to HTTP statuses: absent records are 404,
/// rejected input is 400, a dead collector is 502, store trouble is 500.
pub(crate) fn engine_error<T: Serialize>(e: EngineError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &e {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Upstream(_) => StatusCode::BAD_GATEWAY,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    }
    (status, ApiResponse::err(&e.to_string()))
}

/// Builds the full API router over shared state.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        // Threat API
        .route(
            "/api/threats",
            get(threat_api::list_threats).post(threat_api::create_threat),
        )
        .route("/api/threats/search", get(threat_api::search_threats))
        .route(
            "/api/threats/unresolved",
            get(threat_api::list_unresolved_threats),
        )
        .route("/api/threats/:id", get(threat_api::get_threat))
        .route("/api/threats/:id/resolve", put(threat_api::resolve_threat))
        .route(
            "/api/threats/:id/events",
            get(threat_api::get_threat_events),
        )
        .route(
            "/api/threats/user/:user_id",
            get(threat_api::list_threats_by_user),
        )
        .route(
            "/api/threats/type/:threat_type",
            get(threat_api::list_threats_by_type),
        )
        .route(
            "/api/threats/risk-level/:risk_level",
            get(threat_api::list_threats_by_risk_level),
        )
        .route("/api/users/:user_id/events", get(threat_api::get_user_events))
        // Risk API
        .route("/api/risk/profiles", get(risk_api::list_profiles))
        .route(
            "/api/risk/profiles/high-risk",
            get(risk_api::list_high_risk_profiles),
        )
        .route("/api/risk/profiles/:user_id", get(risk_api::get_profile))
        .route("/api/risk/analysis/:user_id", get(risk_api::get_risk_analysis))
        .route(
            "/api/risk/recalculate/:user_id",
            post(risk_api::recalculate_risk),
        )
        .route("/api/risk/login", post(risk_api::record_login))
        // Ops API
        .route("/api/health", get(health::get_health))
        .route(
            "/api/analysis/status",
            get(analysis_api::get_analysis_status),
        )
        .route("/api/analysis/run", post(analysis_api::trigger_analysis_run))
        .with_state(state)
}
