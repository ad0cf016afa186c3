//! Insider threat server library.
//!
//! SQLite persistence and the axum HTTP surface over the analysis
//! engine. The binary in `main.rs` wires the pieces together;
//! integration tests build the same router in process via `api_router`.

pub mod analysis_api;
pub mod api;
pub mod config;
pub mod db;
pub mod health;
pub mod risk_api;
pub mod threat_api;

// Re-export the wiring surface for the binary and for tests
pub use api::{api_router, ApiResponse, AppState, SharedState};
pub use config::{ConfigError, SiemConfig};
pub use db::Database;

pub use health::{check_health, HealthResponse, HealthVerdict, StoreHealth};
