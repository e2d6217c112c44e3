//! Engine configuration
//!
//! Endpoints, cache TTLs, request timeouts, and the scoring policy constants.
//! The policy constants mirror regulatory practice and are deliberately
//! configurable; the defaults are the calibrated production values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ─── Engine Configuration ──────────────────────────────────────────

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity registry API endpoint
    pub registry_url: String,
    /// Utilization data API endpoint
    pub utilization_url: String,
    /// Exclusion-list snapshot download URL
    pub exclusion_url: String,
    /// Legal search endpoint (HTML results)
    pub search_url: String,
    /// Whether the legal search connector is enabled
    #[serde(default = "default_true")]
    pub search_enabled: bool,
    /// Root directory for per-connector caches
    pub cache_dir: PathBuf,
    /// Registry cache TTL in seconds (default: 7 days)
    #[serde(default = "default_registry_ttl")]
    pub registry_ttl_secs: u64,
    /// Utilization cache TTL in seconds (default: 24 hours)
    #[serde(default = "default_utilization_ttl")]
    pub utilization_ttl_secs: u64,
    /// Exclusion snapshot TTL in seconds (default: 30 days)
    #[serde(default = "default_exclusion_ttl")]
    pub exclusion_ttl_secs: u64,
    /// Legal search cache TTL in seconds (default: 30 days)
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    /// Registry/utilization request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Exclusion snapshot download timeout in seconds (large file)
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_secs: u64,
    /// Per-query legal search timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    /// Data-quality weights per source
    #[serde(default)]
    pub quality_weights: QualityWeights,
    /// Scoring policy constants
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

fn default_true() -> bool {
    true
}
fn default_registry_ttl() -> u64 {
    7 * 24 * 3600
}
fn default_utilization_ttl() -> u64 {
    24 * 3600
}
fn default_exclusion_ttl() -> u64 {
    30 * 24 * 3600
}
fn default_search_ttl() -> u64 {
    30 * 24 * 3600
}
fn default_request_timeout() -> u64 {
    30
}
fn default_snapshot_timeout() -> u64 {
    180
}
fn default_search_timeout() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://npiregistry.cms.hhs.gov/api/".into(),
            utilization_url: "https://data.cms.gov/api/1/datastore/rest/filter".into(),
            exclusion_url: "https://oig.hhs.gov/exclusions/downloadables/UPDATED.csv".into(),
            search_url: "https://html.duckduckgo.com/html/".into(),
            search_enabled: true,
            cache_dir: PathBuf::from("data/cache"),
            registry_ttl_secs: default_registry_ttl(),
            utilization_ttl_secs: default_utilization_ttl(),
            exclusion_ttl_secs: default_exclusion_ttl(),
            search_ttl_secs: default_search_ttl(),
            request_timeout_secs: default_request_timeout(),
            snapshot_timeout_secs: default_snapshot_timeout(),
            search_timeout_secs: default_search_timeout(),
            quality_weights: QualityWeights::default(),
            scoring: ScoringPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

// ─── Data-Quality Weights ──────────────────────────────────────────

/// Per-source contribution to the fused data-quality score.
///
/// Weights sum to 1.0. A source that answered "no data found" earns half
/// its weight; a hard failure earns nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityWeights {
    pub utilization: f64,
    pub exclusion: f64,
    pub identity: f64,
    pub legal: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            utilization: 0.3,
            exclusion: 0.3,
            identity: 0.3,
            legal: 0.1,
        }
    }
}

impl QualityWeights {
    /// Total weight available when every source succeeds
    pub fn total(&self) -> f64 {
        self.utilization + self.exclusion + self.identity + self.legal
    }
}

// ─── Scoring Policy ────────────────────────────────────────────────

/// Calibrated scoring constants.
///
/// Exclusion tiers track the statutory exclusion classes: felony-conviction
/// exclusions floor at 90, other mandatory exclusions at 80, permissive
/// exclusions at 70, unrecognized codes at 75.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Z-score magnitude above which a metric is anomalous
    pub anomaly_threshold: f64,
    /// Per-metric cap on the anomaly-derived score
    pub anomaly_cap: f64,
    /// Floor for felony-conviction exclusion codes
    pub felony_floor: u32,
    /// Floor for other mandatory exclusion codes
    pub mandatory_floor: u32,
    /// Floor for permissive exclusion codes
    pub permissive_floor: u32,
    /// Floor for unrecognized exclusion codes
    pub unknown_exclusion_floor: u32,
    /// Points per high-severity pattern evidence item
    pub high_evidence_points: u32,
    /// Points per medium-severity pattern evidence item
    pub medium_evidence_points: u32,
    /// Legal addend: conviction
    pub conviction_points: u32,
    /// Legal addend: pending lawsuit
    pub pending_lawsuit_points: u32,
    /// Legal addend: settled lawsuit
    pub settled_lawsuit_points: u32,
    /// Legal addend: lawsuit in any other status
    pub other_lawsuit_points: u32,
    /// Legal addend: allegation
    pub allegation_points: u32,
    /// Legal addend: pending case
    pub pending_case_points: u32,
    /// Extra points per legal finding beyond the first
    pub extra_finding_points: u32,
    /// Cap on the extra-finding points
    pub extra_finding_cap: u32,
    /// Data-quality score below which the multiplier applies
    pub low_quality_threshold: f64,
    /// Multiplier applied to the base score under low data quality
    pub low_quality_multiplier: f64,
    /// Minimum relevance for a non-conviction finding to be retained
    pub relevance_threshold: f64,
    /// Relevance floor for retained conviction findings
    pub conviction_relevance_floor: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            anomaly_threshold: 2.5,
            anomaly_cap: 30.0,
            felony_floor: 90,
            mandatory_floor: 80,
            permissive_floor: 70,
            unknown_exclusion_floor: 75,
            high_evidence_points: 10,
            medium_evidence_points: 5,
            conviction_points: 20,
            pending_lawsuit_points: 15,
            settled_lawsuit_points: 10,
            other_lawsuit_points: 12,
            allegation_points: 10,
            pending_case_points: 15,
            extra_finding_points: 5,
            extra_finding_cap: 10,
            low_quality_threshold: 0.70,
            low_quality_multiplier: 1.2,
            relevance_threshold: 0.3,
            conviction_relevance_floor: 0.25,
        }
    }
}
