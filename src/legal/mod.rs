//! Legal-evidence classifier
//!
//! Turns raw search hits into structured, scored, deduplicated legal
//! findings. Classification is an ordered rule table evaluated
//! top-to-bottom with first-match-wins semantics; the conviction rule sits
//! first on purpose — a missed conviction is considered worse than a false
//! positive, so any conviction indicator wins regardless of other signals.

pub mod textparse;

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::config::ScoringPolicy;
use crate::profile::{CaseStatus, CaseType, LegalFinding, Npi};
use crate::sources::{Clock, SearchHit};
use chrono::Datelike;

// ─── Keyword Sets ──────────────────────────────────────────────────

const CONVICTION_KEYWORDS: &[&str] = &[
    "convicted",
    "sentenced",
    "pleaded guilty",
    "plea deal",
    "found guilty",
    "criminal conviction",
    "felony",
    "misdemeanor",
    "prison",
    "jail",
];

const SETTLEMENT_KEYWORDS: &[&str] = &[
    "settled",
    "settlement",
    "agreed to pay",
    "reached settlement",
    "settled out of court",
];

const PENDING_KEYWORDS: &[&str] = &[
    "pending",
    "alleged",
    "accused",
    "charges",
    "indictment",
    "under investigation",
    "facing charges",
    "charged with",
];

const LAWSUIT_KEYWORDS: &[&str] = &[
    "lawsuit",
    "sued",
    "litigation",
    "civil suit",
    "malpractice",
    "negligence",
    "damages",
    "plaintiff",
    "defendant",
];

/// Domains treated as official court/government sources
const OFFICIAL_DOMAINS: &[&str] = &[
    "court", "gov", "uscourts", "justice", "doj", "fbi", "state", "county", "district",
    "supreme",
];

fn matcher(keywords: &[&str]) -> AhoCorasick {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(keywords)
        .expect("keyword set builds")
}

static CONVICTION_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| matcher(CONVICTION_KEYWORDS));
static SETTLEMENT_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| matcher(SETTLEMENT_KEYWORDS));
static PENDING_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| matcher(PENDING_KEYWORDS));
static LAWSUIT_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| matcher(LAWSUIT_KEYWORDS));

fn has_conviction_keyword(text: &str) -> bool {
    CONVICTION_MATCHER.is_match(text)
}
fn has_settlement_keyword(text: &str) -> bool {
    SETTLEMENT_MATCHER.is_match(text)
}
fn has_pending_keyword(text: &str) -> bool {
    PENDING_MATCHER.is_match(text)
}
fn has_lawsuit_keyword(text: &str) -> bool {
    LAWSUIT_MATCHER.is_match(text)
}

// ─── Rule Table ────────────────────────────────────────────────────

/// One classification rule: a predicate over the combined title+snippet
/// text and an outcome resolver for sub-classification by co-occurrence
struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    resolve: fn(&str) -> (CaseType, CaseStatus),
}

fn resolve_conviction(_text: &str) -> (CaseType, CaseStatus) {
    (CaseType::Conviction, CaseStatus::Convicted)
}

fn resolve_settlement(_text: &str) -> (CaseType, CaseStatus) {
    (CaseType::Lawsuit, CaseStatus::Settled)
}

fn resolve_pending(text: &str) -> (CaseType, CaseStatus) {
    if text.contains("lawsuit") || text.contains("sued") {
        (CaseType::Lawsuit, CaseStatus::Pending)
    } else {
        (CaseType::Allegation, CaseStatus::Pending)
    }
}

fn resolve_lawsuit(text: &str) -> (CaseType, CaseStatus) {
    if text.contains("settled") || text.contains("settlement") {
        (CaseType::Lawsuit, CaseStatus::Settled)
    } else if text.contains("dismissed") {
        (CaseType::Lawsuit, CaseStatus::Dismissed)
    } else {
        (CaseType::Lawsuit, CaseStatus::Pending)
    }
}

/// Evaluated top-to-bottom; the first matching rule wins
static RULES: &[Rule] = &[
    Rule {
        name: "conviction",
        applies: has_conviction_keyword,
        resolve: resolve_conviction,
    },
    Rule {
        name: "settlement",
        applies: has_settlement_keyword,
        resolve: resolve_settlement,
    },
    Rule {
        name: "pending",
        applies: has_pending_keyword,
        resolve: resolve_pending,
    },
    Rule {
        name: "lawsuit",
        applies: has_lawsuit_keyword,
        resolve: resolve_lawsuit,
    },
];

/// Classify combined title+snippet text; `None` means the hit carries no
/// legal signal and is discarded
pub fn classify_case(text: &str) -> Option<(CaseType, CaseStatus)> {
    let rule = RULES.iter().find(|r| (r.applies)(text))?;
    tracing::debug!("Hit matched rule '{}'", rule.name);
    Some((rule.resolve)(text))
}

/// True when the URL points at a court/government domain
pub fn is_official_source(url: &str) -> bool {
    let lower = url.to_lowercase();
    OFFICIAL_DOMAINS.iter().any(|d| lower.contains(d))
}

// ─── Subject Context ───────────────────────────────────────────────

/// What we know about the subject, for relevance scoring
pub struct SubjectContext<'a> {
    pub name: &'a str,
    pub npi: &'a Npi,
    pub specialty: Option<&'a str>,
    pub location: Option<&'a str>,
}

// ─── Classifier ────────────────────────────────────────────────────

pub struct LegalClassifier {
    clock: Arc<dyn Clock>,
    relevance_threshold: f64,
    conviction_floor: f64,
}

impl LegalClassifier {
    pub fn new(clock: Arc<dyn Clock>, policy: &ScoringPolicy) -> Self {
        Self {
            clock,
            relevance_threshold: policy.relevance_threshold,
            conviction_floor: policy.conviction_relevance_floor,
        }
    }

    /// Classify a batch of raw hits into deduplicated findings, sorted by
    /// descending relevance.
    pub fn classify(&self, hits: &[SearchHit], subject: &SubjectContext) -> Vec<LegalFinding> {
        let mut findings: Vec<LegalFinding> = hits
            .iter()
            .filter_map(|hit| self.classify_hit(hit, subject))
            .collect();

        findings.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let findings = dedup_findings(findings);

        tracing::info!(
            "Classified {} legal findings from {} search hits",
            findings.len(),
            hits.len()
        );
        findings
    }

    fn classify_hit(&self, hit: &SearchHit, subject: &SubjectContext) -> Option<LegalFinding> {
        let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
        let (case_type, status) = classify_case(&text)?;

        let raw = self.relevance(&text, &hit.url, subject);

        // Convictions are never dropped. A conviction whose only signal is
        // the conviction keyword itself lands exactly at the inclusion
        // threshold; its relevance collapses to the floor so it is retained
        // without reading as a corroborated match.
        let relevance = if case_type == CaseType::Conviction {
            if raw > self.relevance_threshold {
                raw
            } else {
                self.conviction_floor
            }
        } else {
            if raw < self.relevance_threshold {
                return None;
            }
            raw
        };

        let date = textparse::extract_date(&text);
        let description = build_description(&hit.title, &hit.snippet, case_type, status);
        let amounts = textparse::attribute_amounts(&text, case_type, status);

        Some(LegalFinding {
            case_type,
            status,
            date,
            description,
            source_url: hit.url.clone(),
            relevance,
            verified: is_official_source(&hit.url),
            amounts,
        })
    }

    /// Additive relevance in [0, 1]
    fn relevance(&self, text: &str, url: &str, subject: &SubjectContext) -> f64 {
        let url_lower = url.to_lowercase();
        let mut score: f64 = 0.0;

        let name = subject.name.trim().to_lowercase();
        if !name.is_empty() && text.contains(&name) {
            score += 0.3;
        }
        if text.contains(subject.npi.as_str()) || url.contains(subject.npi.as_str()) {
            score += 0.5;
        }
        if let Some(spec) = subject.specialty {
            if !spec.is_empty() && text.contains(&spec.to_lowercase()) {
                score += 0.2;
            }
        }
        if let Some(loc) = subject.location {
            if !loc.is_empty() && text.contains(&loc.to_lowercase()) {
                score += 0.2;
            }
        }
        if is_official_source(url) {
            score += 0.5;
        }
        if let Some(year) = textparse::extract_date(text).and_then(|d| textparse::extract_year(&d))
        {
            if self.clock.now().year() - year <= 2 {
                score += 0.3;
            }
        }
        // Conviction-language bonus, independent of any subject match
        if has_conviction_keyword(text) {
            score += 0.3;
        }
        if has_conviction_keyword(&url_lower) {
            score += 0.2;
        }

        score.min(1.0)
    }
}

/// "Conviction (convicted): <title-or-snippet>", truncated at 500 chars
fn build_description(
    title: &str,
    snippet: &str,
    case_type: CaseType,
    status: CaseStatus,
) -> String {
    let body = if !title.is_empty() { title } else { snippet };
    let type_label = capitalize(&case_type.to_string());
    let mut description = format!("{type_label} ({status}): {body}");
    if description.chars().count() > 500 {
        description = description.chars().take(497).collect::<String>() + "...";
    }
    description
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Drop findings with a duplicate identity signature, keeping the
/// first (highest-relevance after sorting). Idempotent.
pub fn dedup_findings(findings: Vec<LegalFinding>) -> Vec<LegalFinding> {
    let mut seen = std::collections::HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(f.signature()))
        .collect()
}
