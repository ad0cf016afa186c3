//! Detection heuristics.
//!
//! Four stateless pattern detectors over one privileged user's event
//! batch. Each is a pure function of its inputs: no store lookups, no
//! wall-clock reads (the caller supplies `analysis_time` for the metadata
//! stamp), so identical batches always produce identical output.

mod auth_correlation;
mod mass_data_read;
mod off_hours;
mod permission_change;

pub use auth_correlation::detect_auth_patterns;
pub use mass_data_read::detect_mass_data_read;
pub use off_hours::detect_off_hours_access;
pub use permission_change::detect_permission_change;

/// Case-insensitive keyword match over free-text descriptions.
pub(crate) fn description_matches(description: &str, keywords: &[&str]) -> bool {
    let lowered = description.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}
