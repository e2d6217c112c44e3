//! Multi-source fusion
//!
//! Drives the connectors and merges their outputs into one canonical
//! `SubjectProfile` plus a scalar data-quality score. The identity
//! registry is fetched first — it alone supplies the name, specialty, and
//! location that seed the legal search — then the remaining sources fan
//! out concurrently. Each fan-out task is error-isolated: a panic or
//! failure in one source degrades that source to its soft sentinel and
//! never cancels a sibling.

use std::sync::Arc;

use crate::config::{EngineConfig, QualityWeights};
use crate::profile::{Npi, SourceHealth, SourceKind, SubjectProfile};
use crate::sources::{
    Clock, ExclusionConnector, IdentityRecord, LegalSearchConnector, LegalSearchResult,
    RegistryConnector, SearchHit, SourceOutcome, UnavailableReason, UtilizationConnector,
};
use crate::{ProvguardError, ProvguardResult};

/// Fusion output: the canonical profile, the quality of the data behind
/// it, and the raw legal search hits awaiting classification
#[derive(Debug)]
pub struct FusedProfile {
    pub profile: SubjectProfile,
    pub data_quality: f64,
    pub search_hits: Vec<SearchHit>,
    pub searches_performed: usize,
}

pub struct Aggregator {
    registry: Arc<RegistryConnector>,
    utilization: Arc<UtilizationConnector>,
    exclusion: Arc<ExclusionConnector>,
    legal: Arc<LegalSearchConnector>,
    weights: QualityWeights,
}

impl Aggregator {
    pub fn from_config(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let cache_root = config.cache_dir.as_path();
        Self {
            registry: Arc::new(RegistryConnector::new(
                &config.registry_url,
                cache_root,
                std::time::Duration::from_secs(config.registry_ttl_secs),
                config.request_timeout(),
                clock.clone(),
            )),
            utilization: Arc::new(UtilizationConnector::new(
                &config.utilization_url,
                cache_root,
                std::time::Duration::from_secs(config.utilization_ttl_secs),
                config.request_timeout(),
                clock.clone(),
            )),
            exclusion: Arc::new(ExclusionConnector::new(
                &config.exclusion_url,
                cache_root,
                std::time::Duration::from_secs(config.exclusion_ttl_secs),
                config.snapshot_timeout(),
                clock.clone(),
            )),
            legal: Arc::new(LegalSearchConnector::new(
                &config.search_url,
                cache_root,
                std::time::Duration::from_secs(config.search_ttl_secs),
                config.search_timeout(),
                clock,
                config.search_enabled,
            )),
            weights: config.quality_weights,
        }
    }

    /// Collect from every source and fuse into one profile.
    ///
    /// Transport failures degrade quality and never abort. The only fatal
    /// case is a subject that the answering sources authoritatively do not
    /// know: identity and utilization both reporting "no data" means there
    /// is no such subject to investigate.
    pub async fn collect(&self, npi: &Npi) -> ProvguardResult<FusedProfile> {
        tracing::info!("Collecting data for {npi} from all sources...");

        // The identity fetch is a hard sequential predecessor: its output
        // seeds the legal search queries.
        let identity = self.registry.fetch(npi).await;

        let search_seed = identity
            .as_ref()
            .and_then(|record| record.name.full_name());
        let specialty = identity.as_ref().and_then(|r| r.specialty.clone());
        let location = identity
            .as_ref()
            .and_then(|r| r.practice_location.state.clone());

        // Fan the remaining sources out concurrently, isolating each.
        let utilization_task = {
            let connector = self.utilization.clone();
            let npi = npi.clone();
            tokio::spawn(async move { connector.fetch(&npi).await })
        };
        let exclusion_task = {
            let connector = self.exclusion.clone();
            let npi = npi.clone();
            tokio::spawn(async move { connector.fetch(&npi).await })
        };
        let legal_task = {
            let connector = self.legal.clone();
            let npi = npi.clone();
            let seed = search_seed.clone();
            tokio::spawn(async move {
                match seed {
                    Some(name) => {
                        connector
                            .search(&name, &npi, specialty.as_deref(), location.as_deref())
                            .await
                    }
                    // Without a display name there is nothing to search
                    // for; an empty answer is authoritative.
                    None => SourceOutcome::Ok(LegalSearchResult::default()),
                }
            })
        };

        let utilization = isolate(utilization_task.await);
        let exclusion = isolate(exclusion_task.await);
        let legal = isolate(legal_task.await);

        if matches!(identity, SourceOutcome::NoData { .. })
            && matches!(utilization, SourceOutcome::NoData { .. })
        {
            return Err(ProvguardError::FusionFailed(format!(
                "subject {npi} not found in any source"
            )));
        }

        let data_quality = self.data_quality(&identity, &utilization, &exclusion, &legal);
        tracing::info!("Data collection complete. Quality score: {data_quality:.2}");

        let profile = fuse(npi, identity, utilization, exclusion, &legal);
        let (search_hits, searches_performed) = match legal {
            SourceOutcome::Ok(result) => (result.hits, result.searches_performed),
            _ => (Vec::new(), 0),
        };

        Ok(FusedProfile {
            profile,
            data_quality,
            search_hits,
            searches_performed,
        })
    }

    fn data_quality(
        &self,
        identity: &SourceOutcome<IdentityRecord>,
        utilization: &SourceOutcome<crate::profile::UtilizationMetrics>,
        exclusion: &SourceOutcome<crate::profile::ExclusionRecord>,
        legal: &SourceOutcome<LegalSearchResult>,
    ) -> f64 {
        weighted_quality(
            &self.weights,
            identity.health(),
            utilization.health(),
            exclusion.health(),
            legal.health(),
        )
    }
}

/// Weighted availability sum in [0, 1]: full weight for data, half weight
/// for an authoritative empty answer, nothing for a failure
pub fn weighted_quality(
    weights: &QualityWeights,
    identity: SourceHealth,
    utilization: SourceHealth,
    exclusion: SourceHealth,
    legal: SourceHealth,
) -> f64 {
    credit(identity) * weights.identity
        + credit(utilization) * weights.utilization
        + credit(exclusion) * weights.exclusion
        + credit(legal) * weights.legal
}

fn credit(health: SourceHealth) -> f64 {
    match health {
        SourceHealth::Available => 1.0,
        SourceHealth::EmptyAnswer => 0.5,
        SourceHealth::Failed => 0.0,
    }
}

/// Convert a join failure (task panic or cancellation) into the soft
/// sentinel, so one source's crash reads as that source being down
fn isolate<T>(joined: Result<SourceOutcome<T>, tokio::task::JoinError>) -> SourceOutcome<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Source task failed: {e}");
            SourceOutcome::unavailable(UnavailableReason::Internal(e.to_string()))
        }
    }
}

/// Field-by-field merge with documented defaults for missing sources
fn fuse(
    npi: &Npi,
    identity: SourceOutcome<IdentityRecord>,
    utilization: SourceOutcome<crate::profile::UtilizationMetrics>,
    exclusion: SourceOutcome<crate::profile::ExclusionRecord>,
    legal: &SourceOutcome<LegalSearchResult>,
) -> SubjectProfile {
    let mut profile = SubjectProfile::new(npi.clone());

    profile.sources.insert(SourceKind::Registry, identity.health());
    profile
        .sources
        .insert(SourceKind::Utilization, utilization.health());
    profile
        .sources
        .insert(SourceKind::Exclusion, exclusion.health());
    profile
        .sources
        .insert(SourceKind::LegalSearch, legal.health());

    if let SourceOutcome::Ok(record) = identity {
        profile.name = record.name;
        profile.credentials = record.credentials;
        profile.specialty = record.specialty;
        profile.practice_location = record.practice_location;
        profile.taxonomies = record.taxonomies;
        profile.enumeration_date = record.enumeration_date;
        profile.certification_date = record.certification_date;
    }
    if let SourceOutcome::Ok(metrics) = utilization {
        profile.utilization = metrics;
    }
    if let SourceOutcome::Ok(record) = exclusion {
        profile.exclusion = record;
    }

    profile.risk_factors = identify_risk_factors(&profile);
    profile
}

/// Preliminary risk-factor strings surfaced on the profile
fn identify_risk_factors(profile: &SubjectProfile) -> Vec<String> {
    let mut factors = Vec::new();

    if profile.exclusion.excluded {
        factors.push(format!(
            "Regulatory exclusion: {}",
            profile
                .exclusion
                .description
                .as_deref()
                .unwrap_or("Unknown exclusion type")
        ));
    }

    let utilization = &profile.utilization;
    if utilization.total_services > 0 && utilization.unique_beneficiaries > 0 {
        let ratio = utilization.services_per_beneficiary();
        if ratio > 50.0 {
            factors.push(format!("High services per beneficiary: {ratio:.1}"));
        }
    }
    if utilization.charge_to_payment_ratio() > 2.0 {
        factors.push(format!(
            "High charge-to-payment ratio: {:.2}",
            utilization.charge_to_payment_ratio()
        ));
    }

    let missing: Vec<String> = profile
        .sources
        .iter()
        .filter(|(_, health)| **health == SourceHealth::Failed)
        .map(|(kind, _)| kind.to_string())
        .collect();
    if !missing.is_empty() {
        factors.push(format!("Incomplete data: missing {}", missing.join(", ")));
    }

    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ExclusionRecord, SubjectName, UtilizationMetrics};

    fn npi() -> Npi {
        Npi::new("1234567890").unwrap()
    }

    fn identity_record() -> IdentityRecord {
        IdentityRecord {
            npi: "1234567890".into(),
            name: SubjectName {
                first: Some("Jane".into()),
                last: Some("Doe".into()),
                organization: None,
            },
            credentials: Some("MD".into()),
            gender: None,
            enumeration_date: None,
            certification_date: None,
            practice_location: Default::default(),
            specialty: Some("Cardiology".into()),
            taxonomies: vec![],
        }
    }

    fn weights() -> QualityWeights {
        QualityWeights::default()
    }

    fn quality_of(
        identity: SourceOutcome<IdentityRecord>,
        utilization: SourceOutcome<UtilizationMetrics>,
        exclusion: SourceOutcome<ExclusionRecord>,
        legal: SourceOutcome<LegalSearchResult>,
    ) -> f64 {
        weighted_quality(
            &weights(),
            identity.health(),
            utilization.health(),
            exclusion.health(),
            legal.health(),
        )
    }

    #[test]
    fn quality_is_one_when_everything_answers() {
        let q = quality_of(
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::Ok(UtilizationMetrics::default()),
            SourceOutcome::Ok(ExclusionRecord::not_excluded()),
            SourceOutcome::Ok(LegalSearchResult::default()),
        );
        assert!((q - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_data_earns_half_the_weight_of_success() {
        let failed = quality_of(
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::Ok(ExclusionRecord::not_excluded()),
            SourceOutcome::Ok(LegalSearchResult::default()),
        );
        let empty = quality_of(
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::no_data("no rows"),
            SourceOutcome::Ok(ExclusionRecord::not_excluded()),
            SourceOutcome::Ok(LegalSearchResult::default()),
        );
        let full = quality_of(
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::Ok(UtilizationMetrics::default()),
            SourceOutcome::Ok(ExclusionRecord::not_excluded()),
            SourceOutcome::Ok(LegalSearchResult::default()),
        );
        assert!(failed < empty && empty < full);
        assert!((empty - failed - 0.15).abs() < 1e-9);
        assert!((full - empty - 0.15).abs() < 1e-9);
    }

    #[test]
    fn quality_is_monotone_in_source_success() {
        // Holding other sources fixed at failure, upgrading one source
        // never lowers the score.
        let all_down = quality_of(
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
        );
        assert_eq!(all_down, 0.0);
        let one_up = quality_of(
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
        );
        assert!(one_up > all_down);
    }

    #[test]
    fn fuse_merges_fields_and_defaults() {
        let profile = fuse(
            &npi(),
            SourceOutcome::Ok(identity_record()),
            SourceOutcome::unavailable(UnavailableReason::Timeout),
            SourceOutcome::Ok(ExclusionRecord::not_excluded()),
            &SourceOutcome::Ok(LegalSearchResult::default()),
        );
        assert_eq!(profile.name.full_name().as_deref(), Some("Jane Doe"));
        assert_eq!(profile.specialty.as_deref(), Some("Cardiology"));
        // Missing utilization falls back to zeroed metrics.
        assert_eq!(profile.utilization.total_services, 0);
        assert!(!profile.exclusion.excluded);
        assert_eq!(
            profile.sources[&SourceKind::Utilization],
            SourceHealth::Failed
        );
        assert!(profile
            .risk_factors
            .iter()
            .any(|f| f.contains("utilization")));
    }

    #[test]
    fn risk_factors_flag_exclusion_and_ratios() {
        let mut profile = SubjectProfile::new(npi());
        profile.exclusion = ExclusionRecord {
            excluded: true,
            description: Some("Mandatory - Felony conviction".into()),
            ..Default::default()
        };
        profile.utilization = UtilizationMetrics {
            total_services: 6000,
            unique_beneficiaries: 100,
            total_charges: 300_000.0,
            total_payments: 100_000.0,
            ..Default::default()
        };
        let factors = identify_risk_factors(&profile);
        assert!(factors.iter().any(|f| f.contains("Felony")));
        assert!(factors.iter().any(|f| f.contains("services per beneficiary")));
        assert!(factors.iter().any(|f| f.contains("charge-to-payment")));
    }
}
