//! Temporal and geographic pattern heuristics
//!
//! Coarse-grained pattern checks over the fused profile. These are weaker
//! signals than the z-score anomalies and feed the evidence trail at lower
//! severities.

use serde::{Deserialize, Serialize};

use crate::profile::SubjectProfile;

/// Services-per-beneficiary level above which billing looks temporally
/// clustered
const CLUSTERING_RATIO: f64 = 10.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalPatterns {
    pub end_of_month_clustering: bool,
    pub volume_spikes: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeographicPatterns {
    pub service_area: String,
    pub anomalies: Vec<String>,
}

/// Detect temporal billing patterns from the utilization shape.
///
/// Claim-level timestamps are not available at this layer, so the
/// clustering signal is inferred from an outsized services-per-beneficiary
/// ratio.
pub fn detect_temporal(profile: &SubjectProfile) -> TemporalPatterns {
    let mut patterns = TemporalPatterns::default();

    let ratio = profile.utilization.services_per_beneficiary();
    if ratio > CLUSTERING_RATIO {
        patterns.end_of_month_clustering = true;
        patterns.notes.push(format!(
            "High services per beneficiary ({ratio:.1}) may indicate end-of-month billing clustering"
        ));
    }

    patterns
}

/// Analyze the subject's service geography
pub fn analyze_geographic(profile: &SubjectProfile) -> GeographicPatterns {
    let mut patterns = GeographicPatterns {
        service_area: profile
            .practice_location
            .state
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        anomalies: Vec::new(),
    };

    if profile.practice_location.state.is_none() {
        patterns
            .anomalies
            .push("Missing practice location information".to_string());
    }

    patterns
}
