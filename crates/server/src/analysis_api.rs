//! Analysis job observability and the manual trigger.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use siem_engine::{AnalysisStats, CursorStore, TickOutcome};

use crate::api::{engine_error, ApiResponse, SharedState};

/// Wire shape of `GET /api/analysis/status`.
#[derive(Debug, Serialize)]
pub struct AnalysisStatus {
    pub running: bool,
    pub interval_secs: u64,
    /// Last event id the job has fully analyzed.
    pub cursor: i64,
    pub stats: AnalysisStats,
}

/// Wire shape of `POST /api/analysis/run`.
#[derive(Debug, Serialize)]
pub struct ManualRunOutcome {
    /// False when the tick was skipped because one was already running.
    pub ran: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats_created: Option<usize>,
}

/// GET /api/analysis/status
pub async fn get_analysis_status(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.load_cursor() {
        Ok(cursor) => (
            StatusCode::OK,
            ApiResponse::ok(AnalysisStatus {
                running: state.job.is_running(),
                interval_secs: state.job.interval().as_secs(),
                cursor,
                stats: state.job.stats(),
            }),
        ),
        Err(e) => engine_error(e),
    }
}

/// POST /api/analysis/run
pub async fn trigger_analysis_run(State(state): State<SharedState>) -> impl IntoResponse {
    let response = match state.job.run_once().await {
        TickOutcome::Skipped => ManualRunOutcome {
            ran: false,
            outcome: "skipped",
            events: None,
            users: None,
            threats_created: None,
        },
        TickOutcome::Idle => ManualRunOutcome {
            ran: true,
            outcome: "idle",
            events: None,
            users: None,
            threats_created: None,
        },
        TickOutcome::Aborted => ManualRunOutcome {
            ran: true,
            outcome: "aborted",
            events: None,
            users: None,
            threats_created: None,
        },
        TickOutcome::Completed {
            events,
            users,
            threats_created,
        } => ManualRunOutcome {
            ran: true,
            outcome: "completed",
            events: Some(events),
            users: Some(users),
            threats_created: Some(threats_created),
        },
    };
    (StatusCode::OK, ApiResponse::ok(response))
}
