//! Recurring threat analysis job.
//!
//! One repeating timer drives the pipeline: read the cursor, ask the
//! collector for anything newer, group by privileged user, run the
//! detectors, persist findings, update risk profiles, then advance the
//! cursor. Ticks never overlap; an `is_running` guard turns a tick that
//! arrives mid-run into a no-op.
//!
//! Cursor rules:
//! - the cursor only moves forward after a batch finishes (per-user
//!   failures included),
//! - a failed range fetch aborts the tick with the cursor untouched, so
//!   the same window is retried next time,
//! - threat ids are derived from the detection itself, so a retried
//!   window cannot double-record or double-count a threat it already
//!   produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use siem_core::{
    DetectionResult, EngineError, InsiderThreat, SecurityEvent, ThreatType, ANALYSIS_JOB_SOURCE,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collector::EventSource;
use crate::detectors::{
    detect_auth_patterns, detect_mass_data_read, detect_off_hours_access, detect_permission_change,
};
use crate::grouping::group_privileged_events;
use crate::risk_engine::RiskEngine;
use crate::store::{CursorStore, SiemStore, ThreatStore};
use crate::working_hours::WorkingHoursPolicy;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous tick is still running; nothing was done.
    Skipped,

    /// The source had nothing newer than the cursor.
    Idle,

    /// The tick could not complete; the cursor was left untouched and
    /// the same window is retried next tick.
    Aborted,

    /// A batch was analyzed and the cursor advanced.
    Completed {
        events: usize,
        users: usize,
        threats_created: usize,
    },
}

/// Run counters kept by the job, reported by the status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub last_run_at: Option<DateTime<Utc>>,
    pub ticks_started: u64,
    pub ticks_skipped: u64,
    pub runs_completed: u64,
    pub events_analyzed: u64,
    pub users_analyzed: u64,
    pub threats_created: u64,
    pub last_error: Option<String>,
}

/// Stable id for a machine detection.
///
/// Hashes the user, the threat type, and the bounding correlated event
/// ids. Re-analyzing the same window reproduces the same id, which the
/// store's insert-if-absent turns into a no-op.
pub fn detection_threat_id(user_id: &str, threat_type: ThreatType, correlated: &[i64]) -> String {
    let first = correlated.first().copied().unwrap_or(0);
    let last = correlated.last().copied().unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        user_id,
        threat_type.as_str(),
        first,
        last
    ));
    format!("{:x}", hasher.finalize())
}

/// Resets the re-entrancy flag when the tick ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ThreatAnalysisJob {
    source: Arc<dyn EventSource>,
    store: Arc<dyn SiemStore>,
    risk: Arc<RiskEngine>,
    policy: WorkingHoursPolicy,
    interval: Duration,
    is_running: AtomicBool,
    stats: Mutex<AnalysisStats>,
    shutdown: watch::Sender<bool>,
}

impl ThreatAnalysisJob {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn SiemStore>,
        risk: Arc<RiskEngine>,
        policy: WorkingHoursPolicy,
        interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            source,
            store,
            risk,
            policy,
            interval,
            is_running: AtomicBool::new(false),
            stats: Mutex::new(AnalysisStats::default()),
            shutdown,
        }
    }

    /// Spawns the repeating timer. The first analysis runs one full
    /// interval after start; `run_once` covers on-demand passes.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let job = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(job.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick fires immediately; swallow it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        job.run_once().await;
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Analysis job stopped");
                        break;
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats.lock().unwrap().clone()
    }

    /// One guarded analysis pass. Overlapping calls are skipped, not
    /// queued.
    pub async fn run_once(&self) -> TickOutcome {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.stats.lock().unwrap().ticks_skipped += 1;
            tracing::warn!("Analysis tick skipped: previous run still in progress");
            return TickOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.is_running);
        self.tick().await
    }

    fn note_failure(&self, message: String) {
        self.stats.lock().unwrap().last_error = Some(message);
    }

    async fn tick(&self) -> TickOutcome {
        let analysis_time = Utc::now();
        {
            let mut stats = self.stats.lock().unwrap();
            stats.ticks_started += 1;
            stats.last_run_at = Some(analysis_time);
        }

        let cursor = match self.store.load_cursor() {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::error!("Analysis aborted, cursor read failed: {}", e);
                self.note_failure(format!("cursor read failed: {}", e));
                return TickOutcome::Aborted;
            }
        };

        let max_id = self.source.max_event_id().await;
        if max_id <= cursor {
            tracing::debug!("No new events (cursor {}, source max {})", cursor, max_id);
            return TickOutcome::Idle;
        }

        // Fallible on purpose: advancing the cursor past events that
        // were never fetched would silently drop them.
        let events = match self.source.try_events_in_range(cursor + 1, max_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    "Analysis aborted, event fetch failed (cursor stays at {}): {}",
                    cursor,
                    e
                );
                self.note_failure(format!("event fetch failed: {}", e));
                return TickOutcome::Aborted;
            }
        };

        let event_count = events.len();
        let groups = group_privileged_events(events);
        let user_count = groups.len();
        let mut threats_created = 0;

        for (user_id, user_events) in groups {
            match self.analyze_user(&user_id, &user_events, analysis_time).await {
                Ok(created) => threats_created += created,
                Err(e) => {
                    tracing::error!(
                        "Analysis of user {} failed, continuing with remaining users: {}",
                        user_id,
                        e
                    );
                    self.note_failure(format!("analysis of user {} failed: {}", user_id, e));
                }
            }
        }

        if let Err(e) = self.store.store_cursor(max_id) {
            tracing::error!(
                "Cursor advance to {} failed, window will be re-analyzed: {}",
                max_id,
                e
            );
            self.note_failure(format!("cursor advance failed: {}", e));
            return TickOutcome::Aborted;
        }

        {
            let mut stats = self.stats.lock().unwrap();
            stats.runs_completed += 1;
            stats.events_analyzed += event_count as u64;
            stats.users_analyzed += user_count as u64;
            stats.threats_created += threats_created as u64;
        }
        tracing::info!(
            "Analysis pass complete: {} events, {} privileged users, {} new threats (cursor -> {})",
            event_count,
            user_count,
            threats_created,
            max_id
        );
        TickOutcome::Completed {
            events: event_count,
            users: user_count,
            threats_created,
        }
    }

    /// Runs all four detectors over one user's events and persists every
    /// positive result. Returns the number of threats newly recorded.
    async fn analyze_user(
        &self,
        user_id: &str,
        events: &[SecurityEvent],
        analysis_time: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let mut detections: Vec<DetectionResult> = Vec::new();

        if let Some(result) = detect_mass_data_read(user_id, events, analysis_time) {
            detections.push(result);
        }

        // the off-hours detector only counts; membership is decided here
        let off_hours = self.policy.filter_off_hours(events);
        if let Some(result) = detect_off_hours_access(user_id, &off_hours, analysis_time) {
            detections.push(result);
        }

        if let Some(result) = detect_permission_change(user_id, events, analysis_time) {
            detections.push(result);
        }

        detections.extend(detect_auth_patterns(user_id, events, analysis_time));

        let mut created = 0;
        for detection in detections {
            let threat = self.build_threat(user_id, detection, analysis_time, events);
            if self.store.create_threat(&threat)? {
                self.risk
                    .update_user_risk_after_threat(user_id, &threat.id)
                    .await?;
                tracing::info!(
                    "Threat detected for user {}: {} {}",
                    user_id,
                    threat.risk_level,
                    threat.threat_type
                );
                created += 1;
            } else {
                tracing::debug!("Threat {} already recorded, skipping", threat.id);
            }
        }
        Ok(created)
    }

    fn build_threat(
        &self,
        user_id: &str,
        detection: DetectionResult,
        detected_at: DateTime<Utc>,
        events: &[SecurityEvent],
    ) -> InsiderThreat {
        let id = detection_threat_id(user_id, detection.threat_type, &detection.correlated_event_ids);
        let ip_address = detection
            .correlated_event_ids
            .first()
            .and_then(|first| events.iter().find(|e| e.id == *first))
            .map(|e| e.ip_address.clone());

        InsiderThreat {
            id,
            user_id: user_id.to_string(),
            threat_type: detection.threat_type,
            risk_level: detection.risk_level,
            description: detection.description,
            metadata: detection.metadata.to_value(),
            correlated_event_ids: detection.correlated_event_ids,
            ip_address,
            source: ANALYSIS_JOB_SOURCE.to_string(),
            detected_at,
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }
}
