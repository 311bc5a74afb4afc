//! Semantic-version comparison for the update-check protocol.
//!
//! Versions are dot-separated numeric segments ("1.2.0"). Missing trailing
//! segments count as zero, so "1.2" == "1.2.0". Non-numeric segments are
//! rejected by the parser; the comparator treats a malformed side as "no
//! update" and logs the anomaly instead of failing the request.

use crate::error::{HubError, Result};

/// Parses a dotted numeric version string into its segments.
pub fn parse_version(version: &str) -> Result<Vec<u64>> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(HubError::invalid_input("Version string cannot be empty"));
    }
    trimmed
        .split('.')
        .map(|segment| {
            segment.parse::<u64>().map_err(|_| {
                HubError::invalid_input(format!(
                    "Invalid version segment '{}' in '{}'",
                    segment, trimmed
                ))
            })
        })
        .collect()
}

/// Returns true iff `latest` is strictly newer than `current`.
///
/// Equal versions yield false (no update). Malformed input on either side
/// yields false as a defensive default.
pub fn is_newer(current: &str, latest: &str) -> bool {
    let current_segments = match parse_version(current) {
        Ok(segments) => segments,
        Err(err) => {
            tracing::warn!("Malformed current version '{}': {}", current, err);
            return false;
        }
    };
    let latest_segments = match parse_version(latest) {
        Ok(segments) => segments,
        Err(err) => {
            tracing::warn!("Malformed latest version '{}': {}", latest, err);
            return false;
        }
    };

    let len = current_segments.len().max(latest_segments.len());
    for i in 0..len {
        let c = current_segments.get(i).copied().unwrap_or(0);
        let l = latest_segments.get(i).copied().unwrap_or(0);
        if l > c {
            return true;
        }
        if l < c {
            return false;
        }
    }
    false
}
