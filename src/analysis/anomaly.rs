//! Peer-baseline anomaly detection
//!
//! Compares each utilization metric against a peer mean/standard-deviation
//! pair and flags those whose z-score magnitude exceeds the threshold.
//! Zero-valued metrics are skipped — a zero cannot be distinguished from
//! "no data", and flagging it would manufacture evidence out of absence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profile::UtilizationMetrics;

pub const METRIC_TOTAL_SERVICES: &str = "total_services";
pub const METRIC_UNIQUE_BENEFICIARIES: &str = "unique_beneficiaries";
pub const METRIC_SERVICES_PER_BENEFICIARY: &str = "services_per_beneficiary";
pub const METRIC_TOTAL_CHARGES: &str = "total_charges";
pub const METRIC_CHARGE_TO_PAYMENT_RATIO: &str = "charge_to_payment_ratio";

/// Mean and standard deviation for one metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaselineStat {
    pub mean: f64,
    pub std: f64,
}

/// Peer reference statistics per metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerBaseline {
    stats: BTreeMap<String, BaselineStat>,
}

impl PeerBaseline {
    pub fn new(stats: BTreeMap<String, BaselineStat>) -> Self {
        Self { stats }
    }

    pub fn get(&self, metric: &str) -> Option<BaselineStat> {
        self.stats.get(metric).copied()
    }
}

impl Default for PeerBaseline {
    /// National all-specialty reference table, used when no peer cohort is
    /// supplied
    fn default() -> Self {
        let mut stats = BTreeMap::new();
        stats.insert(
            METRIC_TOTAL_SERVICES.into(),
            BaselineStat { mean: 1000.0, std: 200.0 },
        );
        stats.insert(
            METRIC_UNIQUE_BENEFICIARIES.into(),
            BaselineStat { mean: 300.0, std: 50.0 },
        );
        stats.insert(
            METRIC_SERVICES_PER_BENEFICIARY.into(),
            BaselineStat { mean: 3.3, std: 1.0 },
        );
        stats.insert(
            METRIC_TOTAL_CHARGES.into(),
            BaselineStat { mean: 500_000.0, std: 100_000.0 },
        );
        stats.insert(
            METRIC_CHARGE_TO_PAYMENT_RATIO.into(),
            BaselineStat { mean: 1.2, std: 0.3 },
        );
        Self { stats }
    }
}

/// Which side of the peer mean the subject sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    High,
    Low,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// One flagged metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub value: f64,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub direction: Direction,
}

/// Flag every non-zero metric whose |z| exceeds the threshold.
///
/// A baseline entry with non-positive standard deviation is skipped; the
/// z-score would be meaningless.
pub fn detect_anomalies(
    metrics: &UtilizationMetrics,
    baseline: &PeerBaseline,
    threshold: f64,
) -> BTreeMap<String, AnomalyFlag> {
    let values: [(&str, f64); 5] = [
        (METRIC_TOTAL_SERVICES, metrics.total_services as f64),
        (METRIC_UNIQUE_BENEFICIARIES, metrics.unique_beneficiaries as f64),
        (METRIC_SERVICES_PER_BENEFICIARY, metrics.services_per_beneficiary()),
        (METRIC_TOTAL_CHARGES, metrics.total_charges),
        (METRIC_CHARGE_TO_PAYMENT_RATIO, metrics.charge_to_payment_ratio()),
    ];

    let mut anomalies = BTreeMap::new();
    for (name, value) in values {
        if value == 0.0 {
            continue;
        }
        let Some(stat) = baseline.get(name) else {
            continue;
        };
        if stat.std <= 0.0 {
            continue;
        }
        let z = (value - stat.mean) / stat.std;
        if z.abs() > threshold {
            anomalies.insert(
                name.to_string(),
                AnomalyFlag {
                    value,
                    mean: stat.mean,
                    std: stat.std,
                    z_score: z,
                    direction: if z > 0.0 { Direction::High } else { Direction::Low },
                },
            );
        }
    }

    if !anomalies.is_empty() {
        tracing::info!("Flagged {} anomalous metrics", anomalies.len());
    }
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 2.5;

    fn metrics(services: u64, beneficiaries: u64, charges: f64, payments: f64) -> UtilizationMetrics {
        UtilizationMetrics {
            total_services: services,
            unique_beneficiaries: beneficiaries,
            total_charges: charges,
            total_payments: payments,
            ..Default::default()
        }
    }

    #[test]
    fn flags_iff_z_exceeds_threshold() {
        // total_services baseline 1000/200: z = 2.5 exactly at 1500 (not
        // flagged, strict inequality), flagged above it.
        let at_threshold = metrics(1500, 0, 0.0, 0.0);
        assert!(detect_anomalies(&at_threshold, &PeerBaseline::default(), THRESHOLD).is_empty());

        let above = metrics(1501, 0, 0.0, 0.0);
        let flags = detect_anomalies(&above, &PeerBaseline::default(), THRESHOLD);
        assert!(flags.contains_key(METRIC_TOTAL_SERVICES));
    }

    #[test]
    fn direction_matches_z_sign() {
        let high = metrics(2000, 0, 0.0, 0.0);
        let flags = detect_anomalies(&high, &PeerBaseline::default(), THRESHOLD);
        let flag = &flags[METRIC_TOTAL_SERVICES];
        assert!(flag.z_score > 0.0);
        assert_eq!(flag.direction, Direction::High);

        let low = metrics(100, 0, 0.0, 0.0);
        let flags = detect_anomalies(&low, &PeerBaseline::default(), THRESHOLD);
        let flag = &flags[METRIC_TOTAL_SERVICES];
        assert!(flag.z_score < 0.0);
        assert_eq!(flag.direction, Direction::Low);
    }

    #[test]
    fn zero_metrics_are_skipped() {
        // All zeros: even though zero is 5 standard deviations below the
        // services mean, no flag is raised.
        let flags = detect_anomalies(
            &UtilizationMetrics::default(),
            &PeerBaseline::default(),
            THRESHOLD,
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn derived_ratios_participate() {
        // 4000 services over 100 beneficiaries = 40 services/beneficiary,
        // z = (40 - 3.3) / 1.0 = 36.7
        let m = metrics(4000, 100, 0.0, 0.0);
        let flags = detect_anomalies(&m, &PeerBaseline::default(), THRESHOLD);
        assert!(flags.contains_key(METRIC_SERVICES_PER_BENEFICIARY));
        assert!(flags[METRIC_SERVICES_PER_BENEFICIARY].z_score > 30.0);
    }

    #[test]
    fn degenerate_std_is_skipped() {
        let mut stats = BTreeMap::new();
        stats.insert(
            METRIC_TOTAL_SERVICES.to_string(),
            BaselineStat { mean: 100.0, std: 0.0 },
        );
        let baseline = PeerBaseline::new(stats);
        let flags = detect_anomalies(&metrics(5000, 0, 0.0, 0.0), &baseline, THRESHOLD);
        assert!(flags.is_empty());
    }
}
