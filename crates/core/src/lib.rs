pub mod detection;
pub mod error;
pub mod event;
pub mod profile;
pub mod query;
pub mod risk_level;
pub mod threat;

pub use detection::{DetectionResult, LoginPattern, ThreatMetadata};
pub use error::EngineError;
pub use event::{EventType, SecurityEvent};
pub use profile::{RecentActivity, UserRiskProfile, RECENT_ACTIVITY_CAP};
pub use query::{FilteredThreats, PagedThreats, Pagination, SortBy, SortOrder, ThreatQuery};
pub use risk_level::RiskLevel;
pub use threat::{InsiderThreat, ThreatType, ANALYSIS_JOB_SOURCE};
