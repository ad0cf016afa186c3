//! Threat endpoints: reporting, lookup, filtered search, resolution, and
//! correlated-event retrieval.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use siem_core::{InsiderThreat, PagedThreats, Pagination, RiskLevel, ThreatQuery, ThreatType};
use siem_engine::{EventSource, ThreatStore};

use crate::api::{engine_error, ApiResponse, SharedState};

#[derive(Debug, Deserialize)]
pub struct CreateThreatRequest {
    pub user_id: String,
    pub threat_type: ThreatType,
    pub risk_level: RiskLevel,
    pub description: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub correlated_event_ids: Vec<i64>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveThreatRequest {
    pub resolved_by: String,
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

/// POST /api/threats
pub async fn create_threat(
    State(state): State<SharedState>,
    Json(req): Json<CreateThreatRequest>,
) -> impl IntoResponse {
    if req.user_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err("user_id must not be blank"),
        );
    }
    if req.description.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err("description must not be blank"),
        );
    }

    let threat = InsiderThreat {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: req.user_id,
        threat_type: req.threat_type,
        risk_level: req.risk_level,
        description: req.description,
        metadata: req.metadata.unwrap_or(serde_json::Value::Null),
        correlated_event_ids: req.correlated_event_ids,
        ip_address: req.ip_address,
        source: req.source.unwrap_or_else(|| "api".to_string()),
        detected_at: Utc::now(),
        is_resolved: false,
        resolved_at: None,
        resolved_by: None,
        resolution_notes: None,
    };

    if let Err(e) = state.store.create_threat(&threat) {
        return engine_error(e);
    }
    // manual reports count toward the user's risk the same as detections
    match state
        .risk
        .update_user_risk_after_threat(&threat.user_id, &threat.id)
        .await
    {
        Ok(_) => (StatusCode::CREATED, ApiResponse::ok(threat)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats
pub async fn list_threats(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.find_all_threats() {
        Ok(threats) => (StatusCode::OK, ApiResponse::ok(threats)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/search
pub async fn search_threats(
    State(state): State<SharedState>,
    Query(query): Query<ThreatQuery>,
) -> impl IntoResponse {
    match state.store.find_threats_with_filters(&query) {
        Ok(found) => {
            let pagination = Pagination::new(query.page_number(), query.page_size(), found.total);
            (
                StatusCode::OK,
                ApiResponse::ok(PagedThreats {
                    data: found.threats,
                    pagination,
                }),
            )
        }
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/unresolved
pub async fn list_unresolved_threats(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.find_unresolved_threats() {
        Ok(threats) => (StatusCode::OK, ApiResponse::ok(threats)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/:id
pub async fn get_threat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.find_threat(&id) {
        Ok(Some(threat)) => (StatusCode::OK, ApiResponse::ok(threat)),
        Ok(None) => (StatusCode::NOT_FOUND, ApiResponse::err("Threat not found")),
        Err(e) => engine_error(e),
    }
}

/// PUT /api/threats/:id/resolve
pub async fn resolve_threat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<ResolveThreatRequest>,
) -> impl IntoResponse {
    if req.resolved_by.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            ApiResponse::err("resolved_by must not be blank"),
        );
    }

    match state.store.find_threat(&id) {
        Ok(Some(mut threat)) => {
            if let Err(msg) = threat.resolve(&req.resolved_by, req.resolution_notes, Utc::now()) {
                return (StatusCode::BAD_REQUEST, ApiResponse::err(&msg));
            }
            match state.store.save_threat(&threat) {
                Ok(()) => (StatusCode::OK, ApiResponse::ok(threat)),
                Err(e) => engine_error(e),
            }
        }
        Ok(None) => (StatusCode::NOT_FOUND, ApiResponse::err("Threat not found")),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/user/:user_id
pub async fn list_threats_by_user(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.store.find_threats_by_user(&user_id) {
        Ok(threats) => (StatusCode::OK, ApiResponse::ok(threats)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/type/:threat_type
pub async fn list_threats_by_type(
    State(state): State<SharedState>,
    Path(threat_type): Path<String>,
) -> impl IntoResponse {
    let threat_type: ThreatType = match threat_type.parse() {
        Ok(t) => t,
        Err(e) => return (StatusCode::BAD_REQUEST, ApiResponse::err(&e)),
    };
    match state.store.find_threats_by_type(threat_type) {
        Ok(threats) => (StatusCode::OK, ApiResponse::ok(threats)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/risk-level/:risk_level
pub async fn list_threats_by_risk_level(
    State(state): State<SharedState>,
    Path(risk_level): Path<String>,
) -> impl IntoResponse {
    let risk_level: RiskLevel = match risk_level.parse() {
        Ok(level) => level,
        Err(e) => return (StatusCode::BAD_REQUEST, ApiResponse::err(&e)),
    };
    match state.store.find_threats_by_risk_level(risk_level) {
        Ok(threats) => (StatusCode::OK, ApiResponse::ok(threats)),
        Err(e) => engine_error(e),
    }
}

/// GET /api/threats/:id/events
///
/// Correlated events are fetched live from the collector. When the
/// collector is down the list comes back empty; the stored threat
/// remains the durable evidence.
pub async fn get_threat_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.find_threat(&id) {
        Ok(Some(threat)) => {
            let events = state
                .source
                .events_by_ids(&threat.correlated_event_ids)
                .await;
            (StatusCode::OK, ApiResponse::ok(events))
        }
        Ok(None) => (StatusCode::NOT_FOUND, ApiResponse::err("Threat not found")),
        Err(e) => engine_error(e),
    }
}

/// GET /api/users/:user_id/events
pub async fn get_user_events(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let events = state.source.events_by_user(&user_id).await;
    ApiResponse::ok(events)
}
