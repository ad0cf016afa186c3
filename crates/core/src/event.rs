use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collector-assigned classification of a raw event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Info,
    Warning,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// One security event from the external collector. Read-only to this
/// engine; detectors pattern-match on `description`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Monotonic id assigned by the collector; drives the analysis cursor.
    pub id: i64,
    pub source: String,
    pub event_type: EventType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,

    /// Acting user, when the event is attributable to one.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_role: Option<String>,
}
