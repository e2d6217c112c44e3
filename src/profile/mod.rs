//! Canonical subject data model
//!
//! One typed profile per investigation, assembled by the aggregator and
//! handed read-only to the downstream analysis stages. Raw per-source
//! payloads never leave the connector boundary; everything here is already
//! normalized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ProvguardError, ProvguardResult};

// ─── Identifier ────────────────────────────────────────────────────

/// Validated 10-digit provider identifier.
///
/// Construction is the only validation point: any string that is not
/// exactly ten ASCII digits is rejected before any fetch is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Npi(String);

impl Npi {
    pub fn new(raw: &str) -> ProvguardResult<Self> {
        if raw.len() == 10 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProvguardError::InvalidIdentifier(format!(
                "{raw:?} (must be exactly 10 digits)"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Npi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Name & Location ───────────────────────────────────────────────

/// Subject name — individual or organization, mutually exclusive semantics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectName {
    pub first: Option<String>,
    pub last: Option<String>,
    pub organization: Option<String>,
}

impl SubjectName {
    /// Display name: the organization wins, otherwise "First Last"
    pub fn full_name(&self) -> Option<String> {
        if let Some(org) = self.organization.as_deref().filter(|s| !s.is_empty()) {
            return Some(org.to_string());
        }
        let parts: Vec<&str> = [self.first.as_deref(), self.last.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeLocation {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxonomy {
    pub code: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub state: Option<String>,
}

// ─── Utilization ───────────────────────────────────────────────────

/// Billing/utilization metrics for one subject.
///
/// Derived ratios are computed, never stored, and are 0.0 when the
/// denominator is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtilizationMetrics {
    pub total_services: u64,
    pub unique_beneficiaries: u64,
    pub total_charges: f64,
    pub total_payments: f64,
    pub provider_type: Option<String>,
    pub medicare_participation: Option<String>,
}

impl UtilizationMetrics {
    pub fn services_per_beneficiary(&self) -> f64 {
        if self.unique_beneficiaries == 0 {
            0.0
        } else {
            self.total_services as f64 / self.unique_beneficiaries as f64
        }
    }

    pub fn charge_to_payment_ratio(&self) -> f64 {
        if self.total_payments == 0.0 {
            0.0
        } else {
            self.total_charges / self.total_payments
        }
    }
}

// ─── Exclusion ─────────────────────────────────────────────────────

/// Regulatory exclusion status.
///
/// When `excluded` is false every other field is semantically unused and
/// ignored by scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub excluded: bool,
    pub exclusion_type: Option<String>,
    pub exclusion_date: Option<String>,
    pub reinstatement_date: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
}

impl ExclusionRecord {
    pub fn not_excluded() -> Self {
        Self::default()
    }
}

// ─── Legal Findings ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Conviction,
    Lawsuit,
    Allegation,
    Pending,
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conviction => write!(f, "conviction"),
            Self::Lawsuit => write!(f, "lawsuit"),
            Self::Allegation => write!(f, "allegation"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Convicted,
    Pending,
    Settled,
    Dismissed,
    Unknown,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Convicted => write!(f, "convicted"),
            Self::Pending => write!(f, "pending"),
            Self::Settled => write!(f, "settled"),
            Self::Dismissed => write!(f, "dismissed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Dollar amounts extracted from a legal finding's text, attributed by
/// surrounding context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonetaryAmounts {
    pub estimated_fraud: Option<f64>,
    pub settlement: Option<f64>,
    pub restitution: Option<f64>,
}

impl MonetaryAmounts {
    pub fn is_empty(&self) -> bool {
        self.estimated_fraud.is_none() && self.settlement.is_none() && self.restitution.is_none()
    }
}

/// One structured legal finding classified from a raw search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalFinding {
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub date: Option<String>,
    /// Description, truncated to 500 characters with an ellipsis
    pub description: String,
    pub source_url: String,
    /// Relevance in [0, 1]; clamped at construction
    pub relevance: f64,
    /// True only when the source URL matches the official-domain heuristic
    pub verified: bool,
    #[serde(default, skip_serializing_if = "MonetaryAmounts::is_empty")]
    pub amounts: MonetaryAmounts,
}

impl LegalFinding {
    /// Identity signature for deduplication: case type + status + first 50
    /// characters of the description
    pub fn signature(&self) -> String {
        let head: String = self.description.chars().take(50).collect();
        format!("{}_{}_{}", self.case_type, self.status, head)
    }
}

// ─── Source Availability ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Registry,
    Utilization,
    Exclusion,
    LegalSearch,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Utilization => write!(f, "utilization"),
            Self::Exclusion => write!(f, "exclusion"),
            Self::LegalSearch => write!(f, "legal_search"),
        }
    }
}

/// How a source answered during fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceHealth {
    /// Normalized data returned
    Available,
    /// The source answered, but had no record for this subject
    EmptyAnswer,
    /// Timeout, transport failure, or unparseable response
    Failed,
}

// ─── Subject Profile ───────────────────────────────────────────────

/// The canonical fused profile for one subject.
///
/// Owned by the aggregator until handed (read-only) downstream. Created
/// fresh per investigation; nothing here outlives the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub npi: Npi,
    pub name: SubjectName,
    pub credentials: Option<String>,
    pub specialty: Option<String>,
    pub practice_location: PracticeLocation,
    pub taxonomies: Vec<Taxonomy>,
    pub enumeration_date: Option<String>,
    pub certification_date: Option<String>,
    pub utilization: UtilizationMetrics,
    pub exclusion: ExclusionRecord,
    pub legal_findings: Vec<LegalFinding>,
    pub sources: BTreeMap<SourceKind, SourceHealth>,
    pub risk_factors: Vec<String>,
}

impl SubjectProfile {
    pub fn new(npi: Npi) -> Self {
        Self {
            npi,
            name: SubjectName::default(),
            credentials: None,
            specialty: None,
            practice_location: PracticeLocation::default(),
            taxonomies: Vec::new(),
            enumeration_date: None,
            certification_date: None,
            utilization: UtilizationMetrics::default(),
            exclusion: ExclusionRecord::not_excluded(),
            legal_findings: Vec::new(),
            sources: BTreeMap::new(),
            risk_factors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npi_accepts_exactly_ten_digits() {
        assert!(Npi::new("1234567890").is_ok());
    }

    #[test]
    fn npi_rejects_bad_shapes() {
        for bad in ["123456789", "12345678901", "12345abcde", "", "12345 7890"] {
            assert!(Npi::new(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn ratios_are_zero_on_zero_denominator() {
        let m = UtilizationMetrics::default();
        assert_eq!(m.services_per_beneficiary(), 0.0);
        assert_eq!(m.charge_to_payment_ratio(), 0.0);
    }

    #[test]
    fn ratios_compute() {
        let m = UtilizationMetrics {
            total_services: 900,
            unique_beneficiaries: 300,
            total_charges: 600_000.0,
            total_payments: 500_000.0,
            ..Default::default()
        };
        assert!((m.services_per_beneficiary() - 3.0).abs() < 1e-9);
        assert!((m.charge_to_payment_ratio() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn organization_wins_display_name() {
        let name = SubjectName {
            first: Some("Jane".into()),
            last: Some("Doe".into()),
            organization: Some("Acme Cardiology LLC".into()),
        };
        assert_eq!(name.full_name().as_deref(), Some("Acme Cardiology LLC"));
    }

    #[test]
    fn individual_name_joins_parts() {
        let name = SubjectName {
            first: Some("Jane".into()),
            last: Some("Doe".into()),
            organization: None,
        };
        assert_eq!(name.full_name().as_deref(), Some("Jane Doe"));
        assert_eq!(SubjectName::default().full_name(), None);
    }

    #[test]
    fn finding_signature_uses_first_fifty_chars() {
        let long = "x".repeat(80);
        let finding = LegalFinding {
            case_type: CaseType::Lawsuit,
            status: CaseStatus::Settled,
            date: None,
            description: long,
            source_url: String::new(),
            relevance: 0.5,
            verified: false,
            amounts: MonetaryAmounts::default(),
        };
        assert_eq!(finding.signature(), format!("lawsuit_settled_{}", "x".repeat(50)));
    }
}
