//! # provguard — Provider Fraud-Risk Investigation Engine
//!
//! Multi-source fusion and deterministic risk-scoring engine for healthcare
//! provider fraud investigation. Takes a single 10-digit provider identifier
//! (NPI), gathers records from independent, unreliable registries and a
//! free-text legal-record search, reconciles them into one canonical profile,
//! and computes an auditable 0–100 fraud-risk score with a typed evidence
//! trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                     InvestigationEngine                        │
//! │  ┌───────────┐ ┌─────────────┐ ┌───────────┐ ┌─────────────┐  │
//! │  │ Registry  │ │ Utilization │ │ Exclusion │ │ LegalSearch │  │
//! │  │ (identity)│ │  (billing)  │ │ (snapshot)│ │ (free text) │  │
//! │  └─────┬─────┘ └──────┬──────┘ └─────┬─────┘ └──────┬──────┘  │
//! │        │   identity first, then error-isolated fan-out        │
//! │  ┌─────▼────────────────▼─────────────▼──────────────▼──────┐ │
//! │  │       Aggregator → SubjectProfile + data quality         │ │
//! │  └──────────────────────────┬───────────────────────────────┘ │
//! │                             │                                 │
//! │  ┌──────────────────────────▼───────────────────────────────┐ │
//! │  │ Anomaly Detector │ Legal Classifier │ Pattern Analysis   │ │
//! │  │     Evidence Compiler → Risk Scoring → Result            │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Partial-failure tolerance**: one registry outage never aborts the
//!   investigation; it degrades the data-quality score instead.
//! - **Deterministic scoring**: the same profile always produces the same
//!   integer score in [0, 100].
//! - **Exclusion dominance**: an active regulatory exclusion floors the
//!   score at its severity tier regardless of every other signal.
//! - **Auditable evidence**: an ordered, typed evidence sequence anchored
//!   by a SHA-256 digest.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod evidence;
pub mod fusion;
pub mod legal;
pub mod profile;
pub mod report;
pub mod scoring;
pub mod sources;

// Re-exports for convenience
pub use config::{EngineConfig, QualityWeights, ScoringPolicy};
pub use engine::{InvestigationEngine, RiskAnalysisResult};
pub use evidence::{EvidenceItem, EvidenceKind, EvidenceSeverity};
pub use profile::{ExclusionRecord, LegalFinding, Npi, SubjectProfile, UtilizationMetrics};
pub use scoring::Priority;
pub use sources::{Clock, SourceOutcome, SystemClock, UnavailableReason};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvguardError {
    #[error("Invalid provider identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Fusion failed: {0}")]
    FusionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type ProvguardResult<T> = Result<T, ProvguardError>;
