//! Statistical analysis over the fused profile
//!
//! - `anomaly` — z-score comparison of utilization metrics against a peer
//!   baseline
//! - `patterns` — temporal and geographic pattern heuristics

pub mod anomaly;
pub mod patterns;

pub use anomaly::{detect_anomalies, AnomalyFlag, BaselineStat, Direction, PeerBaseline};
pub use patterns::{analyze_geographic, detect_temporal, GeographicPatterns, TemporalPatterns};
