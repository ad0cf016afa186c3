//! Unified /api/health endpoint.
//!
//! One contract: build version, store reachability, analysis job state,
//! overall verdict. The check needs no session state and makes no
//! network calls, so load balancers can poll it freely.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siem_engine::{AnalysisStats, CursorStore, SiemStore, ThreatAnalysisJob};

use crate::api::{ApiResponse, AppState, SharedState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub verdict: HealthVerdict,
    pub version: String,
    pub store: StoreHealth,
    pub analysis: AnalysisHealth,
    pub checked_at: DateTime<Utc>,
}

/// Result of the store probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Analysis cursor as persisted; doubles as the probe's payload.
    pub cursor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisHealth {
    pub running: bool,
    pub interval_secs: u64,
    pub stats: AnalysisStats,
}

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Healthy,
    Degraded,
}

impl HealthVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
        }
    }
}

/// Probes the store with a cursor read, the cheapest query that still
/// touches the database.
pub fn probe_store(store: &dyn SiemStore) -> StoreHealth {
    match store.load_cursor() {
        Ok(cursor) => StoreHealth {
            reachable: true,
            error: None,
            cursor,
        },
        Err(e) => StoreHealth {
            reachable: false,
            error: Some(e.to_string()),
            cursor: 0,
        },
    }
}

pub fn analysis_health(job: &ThreatAnalysisJob) -> AnalysisHealth {
    AnalysisHealth {
        running: job.is_running(),
        interval_secs: job.interval().as_secs(),
        stats: job.stats(),
    }
}

/// The verdict tracks the store alone: a server that cannot persist is
/// degraded; a quiet scheduler or an idle collector is not.
pub fn verdict_for(store: &StoreHealth) -> HealthVerdict {
    if store.reachable {
        HealthVerdict::Healthy
    } else {
        HealthVerdict::Degraded
    }
}

pub fn check_health(state: &AppState) -> HealthResponse {
    let store = probe_store(state.store.as_ref());
    HealthResponse {
        verdict: verdict_for(&store),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
        analysis: analysis_health(&state.job),
        checked_at: Utc::now(),
    }
}

/// GET /api/health
pub async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    let health = check_health(&state);
    let status = match health.verdict {
        HealthVerdict::Healthy => StatusCode::OK,
        HealthVerdict::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, ApiResponse::ok(health))
}
