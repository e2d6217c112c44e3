//! Legal-record search connector
//!
//! Issues a small battery of free-text queries about the subject against an
//! HTML search endpoint and extracts raw hits (title, snippet, URL). The
//! hits are classification input for the legal-evidence classifier; nothing
//! is interpreted here. Queries run concurrently and fail independently — a
//! dead query contributes nothing rather than sinking the batch.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{classify_request_error, Clock, SourceOutcome, TtlCache};
use crate::profile::Npi;

/// Cap on concurrent queries per investigation
const MAX_QUERIES: usize = 5;
/// Cap on hits extracted per query
const MAX_HITS_PER_QUERY: usize = 10;

/// One raw search hit, unclassified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub query: String,
}

/// The batch result for one subject
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegalSearchResult {
    pub hits: Vec<SearchHit>,
    pub searches_performed: usize,
}

pub struct LegalSearchConnector {
    client: reqwest::Client,
    endpoint: String,
    cache: TtlCache,
    enabled: bool,
}

impl LegalSearchConnector {
    pub fn new(
        endpoint: &str,
        cache_root: &Path,
        ttl: Duration,
        timeout: Duration,
        clock: Arc<dyn Clock>,
        enabled: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
            cache: TtlCache::new(cache_root, "legal_search", ttl, clock),
            enabled,
        }
    }

    /// Run the query battery for a subject.
    ///
    /// Disabled search is an authoritative empty answer, not a failure.
    pub async fn search(
        &self,
        subject_name: &str,
        npi: &Npi,
        specialty: Option<&str>,
        location: Option<&str>,
    ) -> SourceOutcome<LegalSearchResult> {
        if !self.enabled {
            tracing::info!("Legal search disabled, skipping");
            return SourceOutcome::Ok(LegalSearchResult::default());
        }

        let cache_key = format!("{}_{}_{}", subject_name, npi, specialty.unwrap_or(""));
        if let Some(cached) = self.cache.get::<LegalSearchResult>(&cache_key) {
            tracing::debug!("Legal search cache hit for {subject_name}");
            return SourceOutcome::Ok(cached);
        }

        let queries = build_queries(subject_name, npi, specialty, location);

        let mut handles = Vec::new();
        for query in queries.into_iter().take(MAX_QUERIES) {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            handles.push(tokio::spawn(async move {
                perform_search(&client, &endpoint, &query).await
            }));
        }

        let mut all_hits: Vec<SearchHit> = Vec::new();
        let mut searches_performed = 0usize;
        for handle in handles {
            match handle.await {
                Ok(Ok(hits)) => {
                    searches_performed += 1;
                    all_hits.extend(hits);
                }
                Ok(Err(reason)) => {
                    tracing::warn!("Legal search query failed: {reason}");
                }
                Err(e) => {
                    tracing::warn!("Legal search task failed: {e}");
                }
            }
        }

        // Deduplicate by URL, preserving first-seen order.
        let mut seen = HashSet::new();
        let unique: Vec<SearchHit> = all_hits
            .into_iter()
            .filter(|h| !h.url.is_empty() && seen.insert(h.url.clone()))
            .collect();

        tracing::info!(
            "Legal search complete: {} unique hits from {} queries for {subject_name}",
            unique.len(),
            searches_performed
        );

        let result = LegalSearchResult {
            hits: unique,
            searches_performed,
        };
        self.cache.put(&cache_key, &result);
        SourceOutcome::Ok(result)
    }
}

async fn perform_search(
    client: &reqwest::Client,
    endpoint: &str,
    query: &str,
) -> Result<Vec<SearchHit>, super::UnavailableReason> {
    let response = client
        .get(endpoint)
        .query(&[("q", query), ("kl", "us-en")])
        .send()
        .await
        .map_err(|e| classify_request_error(&e))?;
    if !response.status().is_success() {
        return Err(super::UnavailableReason::HttpStatus(
            response.status().as_u16(),
        ));
    }
    let html = response
        .text()
        .await
        .map_err(|e| super::UnavailableReason::Malformed(e.to_string()))?;
    Ok(parse_results(&html, query))
}

/// The query battery: five strategies, most-specific first
pub fn build_queries(
    subject_name: &str,
    npi: &Npi,
    specialty: Option<&str>,
    location: Option<&str>,
) -> Vec<String> {
    let name = subject_name.trim();
    let mut queries = vec![
        format!("\"{name}\" convicted healthcare fraud"),
        format!("\"{name}\" lawsuit healthcare"),
        format!("\"{name}\" court judgment"),
    ];
    if let Some(spec) = specialty {
        queries.push(format!("\"{name}\" {spec} malpractice"));
        queries.push(format!("\"{name}\" {spec} criminal"));
    }
    queries.push(format!("NPI {npi} legal court"));
    queries.push(format!("NPI {npi} lawsuit judgment"));
    if let Some(loc) = location {
        queries.push(format!("\"{name}\" {loc} convicted"));
        queries.push(format!("\"{name}\" {loc} lawsuit"));
    }
    queries.push(format!("\"{name}\" alleged fraud"));
    queries
}

static RESULT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#).unwrap()
});

static RESULT_SNIPPET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#).unwrap()
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Extract result blocks from the search engine's HTML.
///
/// Links and snippets are captured in document order and paired by index; a
/// result with no snippet keeps an empty one.
pub fn parse_results(html: &str, query: &str) -> Vec<SearchHit> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .take(MAX_HITS_PER_QUERY)
        .enumerate()
        .filter_map(|(i, c)| {
            let url = c[1].trim().to_string();
            let title = clean_text(&c[2]);
            if title.is_empty() || url.is_empty() {
                return None;
            }
            Some(SearchHit {
                title,
                snippet: snippets.get(i).cloned().unwrap_or_default(),
                url,
                query: query.to_string(),
            })
        })
        .collect()
}

/// Strip markup and decode the handful of entities the engine emits
fn clean_text(fragment: &str) -> String {
    let stripped = HTML_TAG.replace_all(fragment, "");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npi() -> Npi {
        Npi::new("1234567890").unwrap()
    }

    #[test]
    fn query_battery_covers_all_strategies() {
        let queries = build_queries("Jane Doe", &npi(), Some("Cardiology"), Some("CO"));
        assert!(queries.iter().any(|q| q.contains("convicted healthcare fraud")));
        assert!(queries.iter().any(|q| q.contains("Cardiology malpractice")));
        assert!(queries.iter().any(|q| q.contains("NPI 1234567890")));
        assert!(queries.iter().any(|q| q.contains("CO lawsuit")));
        assert!(queries.iter().any(|q| q.contains("alleged fraud")));
    }

    #[test]
    fn optional_context_prunes_strategies() {
        let queries = build_queries("Jane Doe", &npi(), None, None);
        assert_eq!(queries.len(), 6);
        assert!(!queries.iter().any(|q| q.contains("malpractice")));
    }

    #[test]
    fn parses_result_blocks() {
        let html = r##"
            <div class="result">
              <a class="result__a" href="https://www.justice.gov/case1">Dr. <b>Jane Doe</b> Sentenced</a>
              <a class="result__snippet" href="#">pleaded guilty to &amp; billing fraud</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://example.com/story">Local clinic news</a>
            </div>
        "##;
        let hits = parse_results(html, "test query");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Dr. Jane Doe Sentenced");
        assert_eq!(hits[0].snippet, "pleaded guilty to & billing fraud");
        assert_eq!(hits[0].url, "https://www.justice.gov/case1");
        assert_eq!(hits[1].snippet, "");
        assert_eq!(hits[1].query, "test query");
    }

    #[test]
    fn hit_cap_applies_per_query() {
        let block: String = (0..20)
            .map(|i| {
                format!(
                    r#"<a class="result__a" href="https://example.com/{i}">Result {i}</a>"#
                )
            })
            .collect();
        let hits = parse_results(&block, "q");
        assert_eq!(hits.len(), MAX_HITS_PER_QUERY);
    }

    #[test]
    fn entity_decoding_and_whitespace_collapse() {
        assert_eq!(
            clean_text(" Dr.&nbsp;Doe&#x27;s   <em>case</em> "),
            "Dr. Doe's case"
        );
    }
}
