//! Investigation engine — lean orchestrator
//!
//! Wires the pipeline together: validate the identifier, fuse the sources,
//! classify legal hits, detect anomalies and patterns, compile evidence,
//! and score. Every component instance is constructed explicitly — cache
//! directory and clock are injected, so a test engine with a fixed clock
//! and a temp cache behaves identically run to run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analysis::{
    analyze_geographic, detect_anomalies, detect_temporal, AnomalyFlag, GeographicPatterns,
    PeerBaseline, TemporalPatterns,
};
use crate::config::EngineConfig;
use crate::evidence::{compile_evidence, evidence_digest, EvidenceItem};
use crate::fusion::Aggregator;
use crate::legal::{LegalClassifier, SubjectContext};
use crate::profile::{Npi, SubjectProfile};
use crate::scoring::{calculate_risk_score, priority_from_score, Priority};
use crate::sources::{Clock, SystemClock};
use crate::ProvguardResult;

// ─── Result ────────────────────────────────────────────────────────

/// The engine's terminal output, consumed by the narrative-generation and
/// document-rendering collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysisResult {
    pub npi: String,
    /// Integer risk score in [0, 100]
    pub risk_score: u32,
    /// Priority tag derived solely from the score
    pub priority: Priority,
    /// Flagged metrics, keyed by metric name
    pub anomalies: BTreeMap<String, AnomalyFlag>,
    /// Ordered evidence trail; insertion order is part of the record
    pub evidence: Vec<EvidenceItem>,
    pub temporal_patterns: TemporalPatterns,
    pub geographic_patterns: GeographicPatterns,
    /// Fused data-quality score in [0, 1]
    pub data_quality: f64,
    /// SHA-256 digest anchoring the evidence trail
    pub evidence_digest: String,
    pub engine_version: String,
    pub duration_ms: u64,
}

// ─── Engine ────────────────────────────────────────────────────────

pub struct InvestigationEngine {
    config: EngineConfig,
    aggregator: Aggregator,
    classifier: LegalClassifier,
    baseline: PeerBaseline,
}

impl InvestigationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Construct with an injected clock, for deterministic tests
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let aggregator = Aggregator::from_config(&config, clock.clone());
        let classifier = LegalClassifier::new(clock, &config.scoring);
        Self {
            config,
            aggregator,
            classifier,
            baseline: PeerBaseline::default(),
        }
    }

    /// Replace the default peer baseline with a cohort-specific one
    pub fn with_baseline(mut self, baseline: PeerBaseline) -> Self {
        self.baseline = baseline;
        self
    }

    /// Run a full investigation for one subject.
    ///
    /// Fails fast on a malformed identifier; degrades gracefully on any
    /// source outage.
    pub async fn investigate(&self, raw_npi: &str) -> ProvguardResult<RiskAnalysisResult> {
        let start = std::time::Instant::now();

        // ── Step 1: Validate the identifier before any fetch ──
        let npi = Npi::new(raw_npi)?;
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("Investigation started: {npi}");
        tracing::info!("═══════════════════════════════════════════════════");

        // ── Step 2: Fuse all sources into one profile ──
        let fused = self.aggregator.collect(&npi).await?;
        let mut profile: SubjectProfile = fused.profile;

        // ── Step 3: Classify legal search hits into findings ──
        let subject_name = profile.name.full_name().unwrap_or_default();
        let subject = SubjectContext {
            name: &subject_name,
            npi: &npi,
            specialty: profile.specialty.as_deref(),
            location: profile.practice_location.state.as_deref(),
        };
        profile.legal_findings = self.classifier.classify(&fused.search_hits, &subject);

        // ── Step 4: Statistical anomaly detection ──
        let anomalies = detect_anomalies(
            &profile.utilization,
            &self.baseline,
            self.config.scoring.anomaly_threshold,
        );

        // ── Step 5: Temporal and geographic patterns ──
        let temporal = detect_temporal(&profile);
        let geographic = analyze_geographic(&profile);

        // ── Step 6: Compile the evidence trail ──
        let evidence = compile_evidence(&profile, &anomalies, &temporal, &geographic);

        // ── Step 7: Score ──
        let risk_score = calculate_risk_score(
            &profile,
            &anomalies,
            &evidence,
            fused.data_quality,
            &self.config.scoring,
        );
        let priority = priority_from_score(risk_score);

        let digest = evidence_digest(&evidence);
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!(
            "Investigation complete: {npi} risk={risk_score}/100 ({priority}), \
             {} evidence items, quality={:.2}, {duration_ms}ms",
            evidence.len(),
            fused.data_quality
        );
        tracing::info!("═══════════════════════════════════════════════════");

        Ok(RiskAnalysisResult {
            npi: npi.to_string(),
            risk_score,
            priority,
            anomalies,
            evidence,
            temporal_patterns: temporal,
            geographic_patterns: geographic,
            data_quality: fused.data_quality,
            evidence_digest: digest,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProvguardError;

    #[tokio::test]
    async fn malformed_identifier_fails_before_any_fetch() {
        // Endpoints are unroutable; an invalid NPI must fail without ever
        // touching them.
        let config = EngineConfig {
            registry_url: "http://127.0.0.1:1/api".into(),
            utilization_url: "http://127.0.0.1:1/api".into(),
            exclusion_url: "http://127.0.0.1:1/list.csv".into(),
            search_url: "http://127.0.0.1:1/html".into(),
            cache_dir: std::env::temp_dir().join("provguard-test-nofetch"),
            ..Default::default()
        };
        let engine = InvestigationEngine::new(config);
        for bad in ["12345", "abcdefghij", "123456789012"] {
            let err = engine.investigate(bad).await.unwrap_err();
            assert!(matches!(err, ProvguardError::InvalidIdentifier(_)));
        }
    }
}
