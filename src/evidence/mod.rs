//! Evidence compilation
//!
//! Assembles the ordered evidence trail for one investigation. Section
//! order is fixed — exclusion first, then statistical anomalies, then
//! temporal and geographic patterns, then legal findings — and is never
//! re-sorted downstream: the sequence itself is part of the audit record,
//! anchored by a SHA-256 digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::analysis::{AnomalyFlag, GeographicPatterns, TemporalPatterns};
use crate::profile::{CaseType, SubjectProfile};

/// |z| above which an anomaly is high-severity evidence
const HIGH_SEVERITY_Z: f64 = 3.0;

// ─── Evidence Types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for EvidenceSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Exclusion,
    BillingAnomaly { metric: String },
    TemporalClustering,
    GeographicAnomaly,
    Legal { case_type: CaseType },
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclusion => write!(f, "exclusion"),
            Self::BillingAnomaly { metric } => write!(f, "billing_anomaly_{metric}"),
            Self::TemporalClustering => write!(f, "temporal_clustering"),
            Self::GeographicAnomaly => write!(f, "geographic_anomaly"),
            Self::Legal { case_type } => write!(f, "legal_{case_type}"),
        }
    }
}

/// One typed evidence item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    pub description: String,
    /// Statistical significance in [0, 1]
    pub statistical_significance: f64,
    pub source: String,
    pub regulatory_citation: Option<String>,
    pub severity: EvidenceSeverity,
    /// Source URL, for legal evidence
    pub url: Option<String>,
}

// ─── Compiler ──────────────────────────────────────────────────────

const EXCLUSION_CITATION: &str = "42 CFR §1001.101";
const BILLING_CITATION: &str = "42 CFR §424.516";

/// Compile the evidence trail in its fixed section order
pub fn compile_evidence(
    profile: &SubjectProfile,
    anomalies: &BTreeMap<String, AnomalyFlag>,
    temporal: &TemporalPatterns,
    geographic: &GeographicPatterns,
) -> Vec<EvidenceItem> {
    let mut evidence = Vec::new();

    // Section 1: exclusion status
    if profile.exclusion.excluded {
        let description_body = profile
            .exclusion
            .description
            .as_deref()
            .unwrap_or("Unknown exclusion type");
        let (severity, description) = match profile.exclusion.exclusion_type.as_deref() {
            Some("1128a3") => (
                EvidenceSeverity::High,
                format!("CRITICAL: Subject excluded due to felony conviction - {description_body}"),
            ),
            Some("1128a1") | Some("1128a2") => (
                EvidenceSeverity::High,
                format!("MANDATORY EXCLUSION: {description_body}"),
            ),
            Some("1128b1") | Some("1128b2") | Some("1128b4") => (
                EvidenceSeverity::Medium,
                format!("Permissive exclusion: {description_body}"),
            ),
            _ => (
                EvidenceSeverity::High,
                format!("Subject excluded from program participation: {description_body}"),
            ),
        };
        evidence.push(EvidenceItem {
            kind: EvidenceKind::Exclusion,
            description,
            statistical_significance: 1.0,
            source: "Exclusion Registry".into(),
            regulatory_citation: Some(EXCLUSION_CITATION.into()),
            severity,
            url: None,
        });
    }

    // Section 2: statistical anomalies
    for (metric, flag) in anomalies {
        let severity = if flag.z_score.abs() > HIGH_SEVERITY_Z {
            EvidenceSeverity::High
        } else {
            EvidenceSeverity::Medium
        };
        evidence.push(EvidenceItem {
            kind: EvidenceKind::BillingAnomaly {
                metric: metric.clone(),
            },
            description: format!(
                "{} is {} (Z-score: {:.2}, Value: {})",
                title_case(metric),
                flag.direction,
                flag.z_score,
                flag.value
            ),
            statistical_significance: (flag.z_score.abs() / 5.0).min(1.0),
            source: "Utilization Data".into(),
            regulatory_citation: Some(BILLING_CITATION.into()),
            severity,
            url: None,
        });
    }

    // Section 3: temporal clustering
    if temporal.end_of_month_clustering {
        evidence.push(EvidenceItem {
            kind: EvidenceKind::TemporalClustering,
            description: "Potential end-of-month billing clustering detected".into(),
            statistical_significance: 0.7,
            source: "Utilization Data".into(),
            regulatory_citation: Some(BILLING_CITATION.into()),
            severity: EvidenceSeverity::Medium,
            url: None,
        });
    }

    // Section 4: geographic anomalies
    for anomaly in &geographic.anomalies {
        evidence.push(EvidenceItem {
            kind: EvidenceKind::GeographicAnomaly,
            description: anomaly.clone(),
            statistical_significance: 0.5,
            source: "Identity Registry".into(),
            regulatory_citation: None,
            severity: EvidenceSeverity::Low,
            url: None,
        });
    }

    // Section 5: legal findings
    for finding in &profile.legal_findings {
        let severity = if finding.case_type == CaseType::Conviction {
            EvidenceSeverity::High
        } else {
            EvidenceSeverity::Medium
        };
        evidence.push(EvidenceItem {
            kind: EvidenceKind::Legal {
                case_type: finding.case_type,
            },
            description: finding.description.clone(),
            statistical_significance: finding.relevance,
            source: "Legal Search".into(),
            regulatory_citation: Some(
                if finding.verified {
                    "Public court records"
                } else {
                    "Public records"
                }
                .into(),
            ),
            severity,
            url: Some(finding.source_url.clone()),
        });
    }

    evidence
}

/// SHA-256 digest over the ordered trail, anchoring it for audit
pub fn evidence_digest(evidence: &[EvidenceItem]) -> String {
    let mut hasher = Sha256::new();
    for item in evidence {
        hasher.update(item.kind.to_string().as_bytes());
        hasher.update(item.description.as_bytes());
        hasher.update(item.source.as_bytes());
        hasher.update(item.severity.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
