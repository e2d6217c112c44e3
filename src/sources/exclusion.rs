//! Exclusion-list connector
//!
//! The exclusion registry publishes one large CSV snapshot for the entire
//! population rather than a per-subject endpoint. The snapshot is cached
//! for a month; when a refresh download fails, a stale snapshot is reused
//! rather than reporting the source down. Column names vary between
//! snapshot vintages, so every lookup goes through an ordered fallback
//! list tried once, here.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{classify_request_error, Clock, SourceOutcome, TtlCache, UnavailableReason};
use crate::profile::{ExclusionRecord, Npi};

const SNAPSHOT_KEY: &str = "snapshot";

/// Identifier column variants across snapshot vintages
const NPI_COLUMNS: &[&str] = &["NPI", "NATIONAL_PROVIDER_IDENTIFIER"];
const TYPE_COLUMNS: &[&str] = &["EXCLTYPE", "EXCLUSION_TYPE", "TYPE"];
const DATE_COLUMNS: &[&str] = &["EXCLDATE", "EXCLUSION_DATE", "DATE"];
const REINSTATE_COLUMNS: &[&str] = &["REINSTDATE", "REINSTATEMENT_DATE"];
const STATE_COLUMNS: &[&str] = &["STATE", "PROVIDER_STATE"];

/// Statutory exclusion classes and their descriptions
pub const EXCLUSION_TYPES: &[(&str, &str)] = &[
    ("1128a1", "Mandatory - Medicare/Medicaid conviction"),
    ("1128a2", "Mandatory - Patient abuse conviction"),
    ("1128a3", "Mandatory - Felony conviction"),
    ("1128b1", "Permissive - Misdemeanor conviction"),
    ("1128b2", "Permissive - License revocation"),
    ("1128b4", "Permissive - Default on health education loan"),
];

/// Human-readable description for an exclusion-type code
pub fn describe_exclusion_type(code: &str) -> &'static str {
    EXCLUSION_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, desc)| *desc)
        .unwrap_or("Unknown exclusion type")
}

pub struct ExclusionConnector {
    client: reqwest::Client,
    snapshot_url: String,
    cache: TtlCache,
}

impl ExclusionConnector {
    pub fn new(
        snapshot_url: &str,
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
            snapshot_url: snapshot_url.to_string(),
            cache: TtlCache::new(cache_root, "exclusion", ttl, clock),
        }
    }

    /// Check whether the subject appears on the exclusion list.
    ///
    /// Absence from the snapshot is an authoritative not-excluded answer,
    /// not a miss.
    pub async fn fetch(&self, npi: &Npi) -> SourceOutcome<ExclusionRecord> {
        let csv_text = match self.snapshot().await {
            Ok(text) => text,
            Err(reason) => return SourceOutcome::unavailable(reason),
        };
        match lookup(&csv_text, npi) {
            Ok(record) => SourceOutcome::Ok(record),
            Err(reason) => SourceOutcome::unavailable(reason),
        }
    }

    /// The current snapshot: fresh cache, else download, else stale cache
    async fn snapshot(&self) -> Result<String, UnavailableReason> {
        if let Some(cached) = self.cache.get::<String>(SNAPSHOT_KEY) {
            tracing::debug!("Using cached exclusion snapshot");
            return Ok(cached);
        }

        tracing::info!("Downloading exclusion-list snapshot...");
        match self.download().await {
            Ok(text) => {
                tracing::info!("Exclusion snapshot downloaded ({} bytes)", text.len());
                self.cache.put(SNAPSHOT_KEY, &text);
                Ok(text)
            }
            Err(reason) => {
                if let Some(stale) = self.cache.get_stale::<String>(SNAPSHOT_KEY) {
                    tracing::warn!("Snapshot download failed ({reason}); using stale cache");
                    Ok(stale)
                } else {
                    tracing::error!("Snapshot download failed with no cached fallback: {reason}");
                    Err(reason)
                }
            }
        }
    }

    async fn download(&self) -> Result<String, UnavailableReason> {
        let response = self
            .client
            .get(&self.snapshot_url)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;
        if !response.status().is_success() {
            return Err(UnavailableReason::HttpStatus(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| UnavailableReason::Malformed(e.to_string()))
    }
}

/// Search the snapshot for the subject's identifier.
///
/// The first matching row wins; numeric fields are compared as trimmed
/// strings because snapshot vintages disagree about quoting.
pub fn lookup(csv_text: &str, npi: &Npi) -> Result<ExclusionRecord, UnavailableReason> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| UnavailableReason::Malformed(e.to_string()))?
        .clone();

    let npi_idx = match column_index(&headers, NPI_COLUMNS) {
        Some(i) => i,
        None => {
            return Err(UnavailableReason::Malformed(
                "identifier column not found in exclusion snapshot".into(),
            ))
        }
    };

    for row in reader.records() {
        let row = match row {
            Ok(r) => r,
            // A damaged row should not fail the whole lookup
            Err(_) => continue,
        };
        if row.get(npi_idx).map(str::trim) != Some(npi.as_str()) {
            continue;
        }

        let exclusion_type = field(&headers, &row, TYPE_COLUMNS);
        let description = exclusion_type
            .as_deref()
            .map(describe_exclusion_type)
            .unwrap_or("Unknown exclusion type");

        let first = field(&headers, &row, &["FIRSTNAME", "FIRST_NAME", "FNAME"]);
        let last = field(&headers, &row, &["LASTNAME", "LAST_NAME", "LNAME"]);
        let provider_name = match (first, last) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        };
        if let Some(name) = provider_name {
            tracing::warn!("Exclusion match for {npi}: {name}");
        }

        return Ok(ExclusionRecord {
            excluded: true,
            exclusion_type,
            exclusion_date: field(&headers, &row, DATE_COLUMNS),
            reinstatement_date: field(&headers, &row, REINSTATE_COLUMNS),
            description: Some(description.to_string()),
            state: field(&headers, &row, STATE_COLUMNS),
        });
    }

    Ok(ExclusionRecord::not_excluded())
}

fn column_index(headers: &csv::StringRecord, variants: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let upper = h.trim().to_ascii_uppercase();
        variants.iter().any(|v| upper == *v)
    })
}

fn field(headers: &csv::StringRecord, row: &csv::StringRecord, variants: &[&str]) -> Option<String> {
    let idx = column_index(headers, variants)?;
    row.get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npi() -> Npi {
        Npi::new("1234567890").unwrap()
    }

    #[test]
    fn absent_subject_is_not_excluded() {
        let csv = "NPI,EXCLTYPE,EXCLDATE\n9999999999,1128a1,20200101\n";
        let record = lookup(csv, &npi()).unwrap();
        assert!(!record.excluded);
        assert_eq!(record.exclusion_type, None);
    }

    #[test]
    fn matching_row_yields_full_record() {
        let csv = "LASTNAME,FIRSTNAME,NPI,EXCLTYPE,EXCLDATE,REINSTDATE,STATE\n\
                   DOE,JANE,1234567890,1128a3,20190615,,CO\n";
        let record = lookup(csv, &npi()).unwrap();
        assert!(record.excluded);
        assert_eq!(record.exclusion_type.as_deref(), Some("1128a3"));
        assert_eq!(record.exclusion_date.as_deref(), Some("20190615"));
        assert_eq!(record.reinstatement_date, None);
        assert_eq!(
            record.description.as_deref(),
            Some("Mandatory - Felony conviction")
        );
        assert_eq!(record.state.as_deref(), Some("CO"));
    }

    #[test]
    fn alternate_column_names_are_recognized() {
        let csv = "NATIONAL_PROVIDER_IDENTIFIER,EXCLUSION_TYPE,EXCLUSION_DATE,PROVIDER_STATE\n\
                   1234567890,1128b2,20210301,TX\n";
        let record = lookup(csv, &npi()).unwrap();
        assert!(record.excluded);
        assert_eq!(record.exclusion_type.as_deref(), Some("1128b2"));
        assert_eq!(
            record.description.as_deref(),
            Some("Permissive - License revocation")
        );
        assert_eq!(record.state.as_deref(), Some("TX"));
    }

    #[test]
    fn missing_identifier_column_is_malformed() {
        let csv = "LASTNAME,EXCLTYPE\nDOE,1128a1\n";
        assert!(matches!(
            lookup(csv, &npi()),
            Err(UnavailableReason::Malformed(_))
        ));
    }

    #[test]
    fn unknown_type_code_gets_fallback_description() {
        assert_eq!(describe_exclusion_type("9999zz"), "Unknown exclusion type");
        let csv = "NPI,EXCLTYPE\n1234567890,9999zz\n";
        let record = lookup(csv, &npi()).unwrap();
        assert_eq!(
            record.description.as_deref(),
            Some("Unknown exclusion type")
        );
    }

    #[test]
    fn short_rows_are_skipped() {
        let csv = "NPI,EXCLTYPE\noops\n1234567890,1128a1\n";
        let record = lookup(csv, &npi()).unwrap();
        assert!(record.excluded);
        assert_eq!(record.exclusion_type.as_deref(), Some("1128a1"));
    }
}
