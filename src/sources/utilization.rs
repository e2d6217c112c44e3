//! Utilization data connector
//!
//! Pulls billing/utilization metrics for a subject. The upstream API is
//! loose about both shape (bare list, `{"data": [...]}` wrapper, or single
//! object) and field names; every variant is folded to one canonical record
//! here, at the boundary, so nothing downstream ever sees a raw payload.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{classify_request_error, Clock, SourceOutcome, TtlCache, UnavailableReason};
use crate::profile::{Npi, UtilizationMetrics};

/// Ordered fallback names tried once per canonical field
const SERVICE_COUNT_FIELDS: &[&str] = &["line_srvc_cnt", "total_services"];
const BENEFICIARY_FIELDS: &[&str] = &["bene_unique_cnt", "unique_beneficiaries"];
const CHARGES_FIELDS: &[&str] = &["total_sbmtd_chrg", "total_charges"];
const PAYMENTS_FIELDS: &[&str] = &["total_medicare_payment_amt", "total_payments"];
const PROVIDER_TYPE_FIELDS: &[&str] = &["provider_type", "entity_type"];
const PARTICIPATION_FIELDS: &[&str] = &["medicare_participation_indicator", "participation"];

pub struct UtilizationConnector {
    client: reqwest::Client,
    endpoint: String,
    cache: TtlCache,
}

impl UtilizationConnector {
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
            cache: TtlCache::new(cache_root, "utilization", ttl, clock),
        }
    }

    pub async fn fetch(&self, npi: &Npi) -> SourceOutcome<UtilizationMetrics> {
        if let Some(cached) = self.cache.get::<UtilizationMetrics>(npi.as_str()) {
            tracing::debug!("Utilization cache hit for {npi}");
            return SourceOutcome::Ok(cached);
        }

        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("npi", npi.as_str()), ("$limit", "1000")])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let reason = classify_request_error(&e);
                tracing::error!("Utilization lookup failed for {npi}: {reason}");
                return SourceOutcome::unavailable(reason);
            }
        };

        if !response.status().is_success() {
            let code = response.status().as_u16();
            tracing::error!("Utilization API returned HTTP {code} for {npi}");
            return SourceOutcome::unavailable(UnavailableReason::HttpStatus(code));
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                return SourceOutcome::unavailable(UnavailableReason::Malformed(e.to_string()))
            }
        };

        let outcome = normalize(&body, npi);
        if let SourceOutcome::Ok(ref metrics) = outcome {
            self.cache.put(npi.as_str(), metrics);
        }
        outcome
    }
}

/// Normalize any of the observed response shapes into one metrics record.
///
/// A multi-record response (one row per service line) is summed per numeric
/// field; the descriptive fields are taken from the first row.
pub fn normalize(body: &Value, npi: &Npi) -> SourceOutcome<UtilizationMetrics> {
    let rows: Vec<&Value> = match body {
        Value::Array(list) => list.iter().collect(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(list)) => list.iter().collect(),
            Some(_) => Vec::new(),
            None => vec![body],
        },
        _ => Vec::new(),
    };

    if rows.is_empty() {
        return SourceOutcome::no_data(format!("no utilization data for {npi}"));
    }

    let mut metrics = UtilizationMetrics {
        provider_type: first_str(&rows, PROVIDER_TYPE_FIELDS),
        medicare_participation: first_str(&rows, PARTICIPATION_FIELDS),
        ..Default::default()
    };
    for row in &rows {
        metrics.total_services += numeric(row, SERVICE_COUNT_FIELDS) as u64;
        metrics.unique_beneficiaries += numeric(row, BENEFICIARY_FIELDS) as u64;
        metrics.total_charges += numeric(row, CHARGES_FIELDS);
        metrics.total_payments += numeric(row, PAYMENTS_FIELDS);
    }

    SourceOutcome::Ok(metrics)
}

/// Read the first present fallback field as a number; the API serves
/// numerics both as JSON numbers and as quoted strings
fn numeric(row: &Value, fields: &[&str]) -> f64 {
    for field in fields {
        if let Some(v) = row.get(field) {
            match v {
                Value::Number(n) => return n.as_f64().unwrap_or(0.0),
                Value::String(s) => {
                    if let Ok(parsed) = s.trim().parse::<f64>() {
                        return parsed;
                    }
                }
                _ => {}
            }
        }
    }
    0.0
}

fn first_str(rows: &[&Value], fields: &[&str]) -> Option<String> {
    let row = rows.first()?;
    for field in fields {
        if let Some(s) = row.get(field).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}
