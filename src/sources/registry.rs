//! Identity registry connector
//!
//! Looks a subject up in the national provider registry. This is the one
//! source the aggregator must consult first: it supplies the display name,
//! specialty, and practice location that seed the legal search.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{classify_request_error, Clock, SourceOutcome, TtlCache, UnavailableReason};
use crate::profile::{Npi, PracticeLocation, SubjectName, Taxonomy};

/// Normalized identity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub npi: String,
    pub name: SubjectName,
    pub credentials: Option<String>,
    pub gender: Option<String>,
    pub enumeration_date: Option<String>,
    pub certification_date: Option<String>,
    pub practice_location: PracticeLocation,
    pub specialty: Option<String>,
    pub taxonomies: Vec<Taxonomy>,
}

pub struct RegistryConnector {
    client: reqwest::Client,
    endpoint: String,
    cache: TtlCache,
}

impl RegistryConnector {
    pub fn new(
        endpoint: &str,
        cache_root: &Path,
        ttl: Duration,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
            cache: TtlCache::new(cache_root, "registry", ttl, clock),
        }
    }

    /// Fetch the identity record, preferring a fresh cached copy
    pub async fn fetch(&self, npi: &Npi) -> SourceOutcome<IdentityRecord> {
        if let Some(cached) = self.cache.get::<IdentityRecord>(npi.as_str()) {
            tracing::debug!("Registry cache hit for {npi}");
            return SourceOutcome::Ok(cached);
        }

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("number", npi.as_str()), ("version", "2.1")])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let reason = classify_request_error(&e);
                tracing::error!("Registry lookup failed for {npi}: {reason}");
                return SourceOutcome::unavailable(reason);
            }
        };

        if !response.status().is_success() {
            let code = response.status().as_u16();
            tracing::error!("Registry returned HTTP {code} for {npi}");
            return SourceOutcome::unavailable(UnavailableReason::HttpStatus(code));
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return SourceOutcome::unavailable(UnavailableReason::Malformed(e.to_string()))
            }
        };

        let outcome = normalize(&body, npi);
        if let SourceOutcome::Ok(ref record) = outcome {
            self.cache.put(npi.as_str(), record);
        }
        outcome
    }
}

/// Normalize a raw registry response into an [`IdentityRecord`].
///
/// A `result_count` of zero is an authoritative "no such subject", not a
/// failure.
pub fn normalize(body: &Value, npi: &Npi) -> SourceOutcome<IdentityRecord> {
    if body.get("result_count").and_then(Value::as_u64).unwrap_or(0) == 0 {
        return SourceOutcome::no_data(format!("subject not found in registry: {npi}"));
    }

    let record = match body.get("results").and_then(|r| r.get(0)) {
        Some(r) => r,
        None => {
            return SourceOutcome::unavailable(UnavailableReason::Malformed(
                "result_count > 0 but no results array".into(),
            ))
        }
    };

    let basic = record.get("basic").cloned().unwrap_or(Value::Null);

    // The practice location is the first address tagged LOCATION; mailing
    // addresses are ignored.
    let practice_location = record
        .get("addresses")
        .and_then(Value::as_array)
        .and_then(|addrs| {
            addrs.iter().find(|a| {
                a.get("address_purpose").and_then(Value::as_str) == Some("LOCATION")
            })
        })
        .map(|addr| PracticeLocation {
            address: str_field(addr, "address_1"),
            city: str_field(addr, "city"),
            state: str_field(addr, "state"),
            postal_code: str_field(addr, "postal_code"),
            country: str_field(addr, "country_code").or_else(|| Some("US".into())),
        })
        .unwrap_or_default();

    let taxonomies: Vec<Taxonomy> = record
        .get("taxonomies")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|t| Taxonomy {
                    code: str_field(t, "code"),
                    description: str_field(t, "desc"),
                    license: str_field(t, "license"),
                    state: str_field(t, "state"),
                })
                .collect()
        })
        .unwrap_or_default();

    // Primary specialty is the first taxonomy description.
    let specialty = taxonomies.first().and_then(|t| t.description.clone());

    SourceOutcome::Ok(IdentityRecord {
        npi: record
            .get("number")
            .map(json_to_string)
            .unwrap_or_else(|| npi.to_string()),
        name: SubjectName {
            first: str_field(&basic, "first_name"),
            last: str_field(&basic, "last_name"),
            organization: str_field(&basic, "organization_name"),
        },
        credentials: str_field(&basic, "credential"),
        gender: str_field(&basic, "gender"),
        enumeration_date: str_field(&basic, "enumeration_date"),
        certification_date: str_field(&basic, "certification_date"),
        practice_location,
        specialty,
        taxonomies,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Registries are inconsistent about whether the identifier is a string or
/// a number
fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn npi() -> Npi {
        Npi::new("1234567890").unwrap()
    }

    #[test]
    fn normalizes_individual_with_location_address() {
        let body = json!({
            "result_count": 1,
            "results": [{
                "number": 1234567890u64,
                "basic": {
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "credential": "MD",
                    "enumeration_date": "2008-03-14"
                },
                "addresses": [
                    {"address_purpose": "MAILING", "city": "Denver", "state": "CO"},
                    {"address_purpose": "LOCATION", "address_1": "1 Main St",
                     "city": "Boulder", "state": "CO", "postal_code": "80301"}
                ],
                "taxonomies": [
                    {"code": "207RC0000X", "desc": "Cardiovascular Disease", "state": "CO"}
                ]
            }]
        });
        let record = normalize(&body, &npi()).ok().expect("should normalize");
        assert_eq!(record.npi, "1234567890");
        assert_eq!(record.name.full_name().as_deref(), Some("Jane Doe"));
        assert_eq!(record.practice_location.city.as_deref(), Some("Boulder"));
        assert_eq!(record.specialty.as_deref(), Some("Cardiovascular Disease"));
        assert_eq!(record.practice_location.country.as_deref(), Some("US"));
    }

    #[test]
    fn zero_results_is_no_data() {
        let body = json!({"result_count": 0, "results": []});
        assert!(matches!(
            normalize(&body, &npi()),
            SourceOutcome::NoData { .. }
        ));
    }

    #[test]
    fn claimed_results_but_empty_array_is_malformed() {
        let body = json!({"result_count": 3});
        assert!(matches!(
            normalize(&body, &npi()),
            SourceOutcome::Unavailable {
                reason: UnavailableReason::Malformed(_)
            }
        ));
    }

    #[test]
    fn organization_record_has_no_individual_name() {
        let body = json!({
            "result_count": 1,
            "results": [{
                "number": "1234567890",
                "basic": {"organization_name": "Acme Cardiology LLC"},
                "addresses": [],
                "taxonomies": []
            }]
        });
        let record = normalize(&body, &npi()).ok().unwrap();
        assert_eq!(
            record.name.full_name().as_deref(),
            Some("Acme Cardiology LLC")
        );
        assert_eq!(record.specialty, None);
    }
}
