//! Insider Threat Analysis Engine
//!
//! The engine crate provides the background analysis pipeline: it polls
//! the external event collector through a cursor, filters privileged-user
//! activity, runs the detection heuristics, persists threats, and keeps
//! per-user risk profiles scored.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │                     ThreatAnalysisJob                        │
//!  │                                                              │
//!  │   ┌───────────┐    ┌──────────┐    ┌───────────────────┐    │
//!  │   │ Collector │───▶│ Grouping │───▶│    Detectors      │    │
//!  │   │ (cursor)  │    │ (ADMIN/  │    │ mass-read, off-   │    │
//!  │   └───────────┘    │ SYSADMIN)│    │ hours, permission,│    │
//!  │                    └──────────┘    │ auth correlation  │    │
//!  │                                    └─────────┬─────────┘    │
//!  │                                              ▼              │
//!  │                    ┌──────────┐    ┌───────────────────┐    │
//!  │                    │  Store   │◀───│    RiskEngine     │    │
//!  │                    │ (threats,│    │ (scoring, profile │    │
//!  │                    │ profiles,│    │  updates)         │    │
//!  │                    │ cursor)  │    └───────────────────┘    │
//!  │                    └──────────┘                             │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use siem_engine::{CollectorClient, MemoryStore, RiskEngine, ThreatAnalysisJob};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let source = Arc::new(CollectorClient::new("http://localhost:8082", timeout)?);
//! let risk = Arc::new(RiskEngine::new(store.clone()));
//! let job = Arc::new(ThreatAnalysisJob::new(source, store, risk, policy, interval));
//! let handle = job.start();
//! ```

pub mod collector;
pub mod detectors;
pub mod grouping;
pub mod risk_engine;
pub mod scheduler;
pub mod scoring;
pub mod store;
pub mod working_hours;

pub use collector::{CollectorClient, EventSource};
pub use detectors::{
    detect_auth_patterns, detect_mass_data_read, detect_off_hours_access,
    detect_permission_change,
};
pub use grouping::{group_privileged_events, is_privileged_role};
pub use risk_engine::{
    recommendation_for, BehaviorPatterns, RiskAnalysis, RiskEngine, ThreatBrief, ThreatSummary,
};
pub use scheduler::{detection_threat_id, AnalysisStats, ThreatAnalysisJob, TickOutcome};
pub use scoring::{compute_risk_score, determine_risk_level, rescore_profile};
pub use store::{CursorStore, MemoryStore, ProfileStore, SiemStore, ThreatStore};
pub use working_hours::WorkingHoursPolicy;
