//! Deterministic risk scoring
//!
//! Produces an integer score in [0, 100] from the fused profile, the
//! anomaly map, the compiled evidence, and the data-quality score. An
//! active exclusion both seeds the score at its severity tier and
//! re-asserts that tier as a floor after every other addition — no
//! combination of weak signals can dilute a mandated minimum.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::AnomalyFlag;
use crate::config::ScoringPolicy;
use crate::evidence::{EvidenceItem, EvidenceKind, EvidenceSeverity};
use crate::profile::{CaseStatus, CaseType, SubjectProfile};

// ─── Priority ──────────────────────────────────────────────────────

/// Investigation priority, derived solely from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Priority thresholds: <30 low, <70 medium, ≥70 high
pub fn priority_from_score(score: u32) -> Priority {
    match score {
        0..=29 => Priority::Low,
        30..=69 => Priority::Medium,
        _ => Priority::High,
    }
}

// ─── Scoring ───────────────────────────────────────────────────────

/// The tier floor for an exclusion-type code
fn exclusion_floor(exclusion_type: Option<&str>, policy: &ScoringPolicy) -> u32 {
    match exclusion_type {
        Some("1128a3") => policy.felony_floor,
        Some("1128a1") | Some("1128a2") => policy.mandatory_floor,
        Some("1128b1") | Some("1128b2") | Some("1128b4") => policy.permissive_floor,
        _ => policy.unknown_exclusion_floor,
    }
}

/// Score contribution of one anomaly: grows with |z| past the threshold,
/// capped per metric
fn anomaly_score(flag: &AnomalyFlag, policy: &ScoringPolicy) -> f64 {
    let z = flag.z_score.abs();
    if z > policy.anomaly_threshold {
        policy.anomaly_cap.min((z - policy.anomaly_threshold) * 10.0)
    } else {
        0.0
    }
}

/// Calculate the composite risk score.
///
/// Order of operations: exclusion tier (or anomaly + pattern-evidence
/// accumulation), legal addend, low-quality multiplier, exclusion floor
/// re-assertion, cap at 100.
pub fn calculate_risk_score(
    profile: &SubjectProfile,
    anomalies: &BTreeMap<String, AnomalyFlag>,
    evidence: &[EvidenceItem],
    data_quality: f64,
    policy: &ScoringPolicy,
) -> u32 {
    let npi = &profile.npi;
    let mut base: f64;

    if profile.exclusion.excluded {
        let floor = exclusion_floor(profile.exclusion.exclusion_type.as_deref(), policy);
        tracing::warn!(
            "Active exclusion ({}) for {npi}: base score set to {floor}",
            profile.exclusion.exclusion_type.as_deref().unwrap_or("unknown")
        );
        base = floor as f64;
    } else {
        base = 0.0;

        // Highest single anomaly contribution
        let best_anomaly = anomalies
            .values()
            .map(|flag| anomaly_score(flag, policy))
            .fold(0.0, f64::max);
        base += best_anomaly;

        // Pattern evidence by severity. Anomaly and legal evidence are
        // excluded here: they already enter through the anomaly term above
        // and the legal addend below.
        for item in evidence {
            let counted = matches!(
                item.kind,
                EvidenceKind::TemporalClustering | EvidenceKind::GeographicAnomaly
            );
            if !counted {
                continue;
            }
            base += match item.severity {
                EvidenceSeverity::High => policy.high_evidence_points as f64,
                EvidenceSeverity::Medium => policy.medium_evidence_points as f64,
                EvidenceSeverity::Low => 0.0,
            };
        }
    }

    // Legal addend applies to every subject, excluded or not.
    let legal_scores: Vec<u32> = profile
        .legal_findings
        .iter()
        .map(|finding| match finding.case_type {
            CaseType::Conviction => policy.conviction_points,
            CaseType::Lawsuit => match finding.status {
                CaseStatus::Pending => policy.pending_lawsuit_points,
                CaseStatus::Settled => policy.settled_lawsuit_points,
                _ => policy.other_lawsuit_points,
            },
            CaseType::Allegation => policy.allegation_points,
            CaseType::Pending => policy.pending_case_points,
        })
        .collect();
    if let Some(&top) = legal_scores.iter().max() {
        base += top as f64;
        if legal_scores.len() > 1 {
            let extra = (legal_scores.len() as u32 - 1) * policy.extra_finding_points;
            base += extra.min(policy.extra_finding_cap) as f64;
        }
    }

    // Sparse corroborating data inflates the score rather than deflating
    // it — a thin profile must not read as a clean one.
    if data_quality < policy.low_quality_threshold {
        tracing::warn!(
            "Low data quality ({data_quality:.2}) for {npi}: applying {}x multiplier",
            policy.low_quality_multiplier
        );
        base = (base * policy.low_quality_multiplier).trunc();
    }

    // Re-assert the exclusion floor after all additions.
    if profile.exclusion.excluded {
        let floor = exclusion_floor(profile.exclusion.exclusion_type.as_deref(), policy);
        if base < floor as f64 {
            base = floor as f64;
        }
    }

    (base.trunc() as u32).min(100)
}
