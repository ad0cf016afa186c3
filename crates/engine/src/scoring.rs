//! Weighted risk scoring.
//!
//! The score is a pure function of a profile's threat counters, its
//! failed-login count, and how long ago the last threat fired. Keeping it
//! side-effect free means a recalculation after resolving or deleting
//! threats is just "recount, rescore".

use chrono::{DateTime, Duration, Utc};
use siem_core::{RiskLevel, UserRiskProfile};

const CRITICAL_WEIGHT: f64 = 40.0;
const HIGH_WEIGHT: f64 = 25.0;
const MEDIUM_WEIGHT: f64 = 10.0;
const LOW_WEIGHT: f64 = 3.0;
const FAILED_LOGIN_WEIGHT: f64 = 2.0;

const RECENT_MULTIPLIER: f64 = 1.5;
const STALE_MULTIPLIER: f64 = 1.2;
const RECENT_WINDOW_DAYS: i64 = 3;
const STALE_WINDOW_DAYS: i64 = 7;

const DIVERSITY_MULTIPLIER: f64 = 1.3;
const DIVERSITY_MIN_BUCKETS: usize = 3;

const CRITICAL_SCORE: i64 = 100;
const HIGH_SCORE: i64 = 60;
const MEDIUM_SCORE: i64 = 30;

/// Recomputes the score for a profile as of `now`.
///
/// Base is the weighted sum of threat counters plus failed logins. The
/// base is then scaled by recency of the last detection and by severity
/// diversity, and rounded half-up to an integer.
pub fn compute_risk_score(profile: &UserRiskProfile, now: DateTime<Utc>) -> i64 {
    let base = f64::from(profile.critical_threats_count) * CRITICAL_WEIGHT
        + f64::from(profile.high_threats_count) * HIGH_WEIGHT
        + f64::from(profile.medium_threats_count) * MEDIUM_WEIGHT
        + f64::from(profile.low_threats_count) * LOW_WEIGHT
        + f64::from(profile.failed_login_attempts) * FAILED_LOGIN_WEIGHT;

    let mut score = base;

    if let Some(last) = profile.last_threat_detected_at {
        let age = now.signed_duration_since(last);
        if age <= Duration::days(RECENT_WINDOW_DAYS) {
            score *= RECENT_MULTIPLIER;
        } else if age <= Duration::days(STALE_WINDOW_DAYS) {
            score *= STALE_MULTIPLIER;
        }
    }

    let buckets = [
        profile.critical_threats_count,
        profile.high_threats_count,
        profile.medium_threats_count,
        profile.low_threats_count,
    ];
    if buckets.iter().filter(|c| **c > 0).count() >= DIVERSITY_MIN_BUCKETS {
        score *= DIVERSITY_MULTIPLIER;
    }

    score.round() as i64
}

/// Maps a score onto the four risk levels.
pub fn determine_risk_level(score: i64) -> RiskLevel {
    if score >= CRITICAL_SCORE {
        RiskLevel::Critical
    } else if score >= HIGH_SCORE {
        RiskLevel::High
    } else if score >= MEDIUM_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Applies a fresh score and derived level to the profile in place.
pub fn rescore_profile(profile: &mut UserRiskProfile, now: DateTime<Utc>) {
    profile.risk_score = compute_risk_score(profile, now);
    profile.current_risk_level = determine_risk_level(profile.risk_score);
}
