use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InsiderThreat, RiskLevel, ThreatType};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

/// Sort key for filtered threat searches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    DetectedAt,
    RiskLevel,
    ThreatType,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter/sort/pagination parameters for threat searches. Every field is
/// optional on the wire; absent fields fall back to the documented
/// defaults (page 1, limit 10, detectedAt DESC).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<String>,
    pub threat_type: Option<ThreatType>,
    pub risk_level: Option<RiskLevel>,
    /// Inclusive lower bound on `detected_at`.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `detected_at`.
    pub end_date: Option<DateTime<Utc>>,
    pub is_resolved: Option<bool>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ThreatQuery {
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).max(1)
    }

    /// Offset-based pagination: skip = (page - 1) * limit.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number() - 1) * u64::from(self.page_size())
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by.unwrap_or_default()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }
}

/// Store-level result of a filtered search: one page plus the total
/// match count before pagination.
#[derive(Debug, Clone)]
pub struct FilteredThreats {
    pub threats: Vec<InsiderThreat>,
    pub total: u64,
}

/// Pagination block returned alongside search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        }
    }
}

/// Wire shape of a paginated search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedThreats {
    pub data: Vec<InsiderThreat>,
    pub pagination: Pagination,
}
