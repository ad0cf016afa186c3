//! Risk profile endpoints: listings, per-user analysis, rescoring, and
//! the login hook for the auth layer.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::{engine_error, ApiResponse, SharedState};

#[derive(Debug, Deserialize)]
pub struct LoginInfoRequest {
    pub user_id: String,
    pub success: bool,
}

/// GET /api/risk/profiles
pub async fn list_profiles(State(state): State<SharedState>) -> impl IntoResponse {
    match state.risk.all_profiles() {
        Ok(profiles) => (StatusCode::OK, ApiResponse::ok(profiles)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/risk/profiles/high-risk
pub async fn list_high_risk_profiles(State(state): State<SharedState>) -> impl IntoResponse {
    match state.risk.high_risk_users() {
        Ok(profiles) => (StatusCode::OK, ApiResponse::ok(profiles)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/risk/profiles/:user_id
pub async fn get_profile(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.risk.profile(&user_id) {
        Ok(Some(profile)) => (StatusCode::OK, ApiResponse::ok(profile)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ApiResponse::err("Risk profile not found"),
        ),
        Err(e) => engine_error(e),
    }
}

/// GET /api/risk/analysis/:user_id
pub async fn get_risk_analysis(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.risk.user_risk_analysis(&user_id) {
        Ok(analysis) => (StatusCode::OK, ApiResponse::ok(analysis)),
        Err(e) => engine_error(e),
    }
}

/// POST /api/risk/recalculate/:user_id
pub async fn recalculate_risk(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.risk.recalculate_user_risk(&user_id).await {
        Ok(profile) => (StatusCode::OK, ApiResponse::ok(profile)),
        Err(e) => engine_error(e),
    }
}

/// POST /api/risk/login
///
/// Feeds login outcomes into the per-user failure streak. Successes
/// reset the streak, failures extend it; the profile is rescored either
/// way.
pub async fn record_login(
    State(state): State<SharedState>,
    Json(req): Json<LoginInfoRequest>,
) -> impl IntoResponse {
    if req.user_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err("user_id must not be blank"),
        );
    }
    match state
        .risk
        .update_user_login_info(&req.user_id, req.success)
        .await
    {
        Ok(profile) => (StatusCode::OK, ApiResponse::ok(profile)),
        Err(e) => engine_error(e),
    }
}
