//! Event source client.
//!
//! The engine never owns raw events; it reads them from the external
//! collector service. `EventSource` is the seam: the scheduler and the
//! HTTP layer hold an `Arc<dyn EventSource>`, production wires in the
//! reqwest-backed `CollectorClient`, tests wire in a scripted fake.
//!
//! The `try_*` methods surface upstream failures to callers that must
//! not mistake "collector down" for "no events" (the scheduler leaves
//! its cursor alone on failure). The non-try wrappers implement the
//! degraded contract: log and return empty.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use siem_core::{EngineError, SecurityEvent};

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Highest event id the source currently holds, 0 when it is empty.
    async fn try_max_event_id(&self) -> Result<i64, EngineError>;

    /// Events with ids in `from_id..=to_id`.
    async fn try_events_in_range(
        &self,
        from_id: i64,
        to_id: i64,
    ) -> Result<Vec<SecurityEvent>, EngineError>;

    /// Every event attributed to one user.
    async fn try_events_by_user(&self, user_id: &str)
        -> Result<Vec<SecurityEvent>, EngineError>;

    async fn max_event_id(&self) -> i64 {
        match self.try_max_event_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Event source max-id fetch failed, treating as empty: {}", e);
                0
            }
        }
    }

    async fn events_in_range(&self, from_id: i64, to_id: i64) -> Vec<SecurityEvent> {
        match self.try_events_in_range(from_id, to_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    "Event fetch for range {}..={} failed, returning no data: {}",
                    from_id,
                    to_id,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Resolves an id set with a single range fetch over `min..=max`,
    /// then filters to the exact ids. Over-fetches rather than issuing
    /// one call per id.
    async fn events_by_ids(&self, ids: &[i64]) -> Vec<SecurityEvent> {
        let (min, max) = match (ids.iter().min(), ids.iter().max()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => return Vec::new(),
        };
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        self.events_in_range(min, max)
            .await
            .into_iter()
            .filter(|event| wanted.contains(&event.id))
            .collect()
    }

    async fn events_by_user(&self, user_id: &str) -> Vec<SecurityEvent> {
        match self.try_events_by_user(user_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    "Event fetch for user {} failed, returning no data: {}",
                    user_id,
                    e
                );
                Vec::new()
            }
        }
    }
}

/// HTTP client for the collector microservice.
pub struct CollectorClient {
    base_url: String,
    http: reqwest::Client,
}

impl CollectorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Upstream(format!("http client init failed: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_events(&self, path: &str) -> Result<Vec<SecurityEvent>, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Upstream(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Upstream(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Vec<SecurityEvent>>()
            .await
            .map_err(|e| EngineError::Upstream(format!("GET {} bad payload: {}", url, e)))
    }
}

#[async_trait]
impl EventSource for CollectorClient {
    /// The collector has no dedicated max-id endpoint; the full listing
    /// is fetched and reduced.
    async fn try_max_event_id(&self) -> Result<i64, EngineError> {
        let events = self.get_events("/events").await?;
        Ok(events.iter().map(|event| event.id).max().unwrap_or(0))
    }

    async fn try_events_in_range(
        &self,
        from_id: i64,
        to_id: i64,
    ) -> Result<Vec<SecurityEvent>, EngineError> {
        self.get_events(&format!("/events/from/{}/to/{}", from_id, to_id))
            .await
    }

    async fn try_events_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<SecurityEvent>, EngineError> {
        self.get_events(&format!("/events/user/{}", user_id)).await
    }
}
