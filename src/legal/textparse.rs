//! Free-text date and dollar-amount extraction
//!
//! Pure parsing utilities over the noisy prose in legal search hits. The
//! grammars are deliberately narrow:
//!
//! - dates: "March 4, 2021" · "3/4/21", "03-04-2021" · bare "2021"
//! - amounts: "$1,234.56" · "$2.5 million" / "$3M" / "$1.2B" / "$900k"
//!
//! Amount attribution (estimated fraud vs. settlement vs. restitution) is
//! decided by keywords in a small window around each match, with a default
//! per case disposition when the window says nothing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::profile::{CaseStatus, CaseType, MonetaryAmounts};

// ─── Dates ─────────────────────────────────────────────────────────

static DATE_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
    )
    .unwrap()
});

static DATE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap());

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Extract the first date-like fragment, most specific form first
pub fn extract_date(text: &str) -> Option<String> {
    for pattern in [&*DATE_LONG, &*DATE_NUMERIC, &*YEAR_ONLY] {
        if let Some(m) = pattern.find(text) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Pull a four-digit year out of a previously extracted date fragment
pub fn extract_year(fragment: &str) -> Option<i32> {
    YEAR_ONLY.find(fragment)?.as_str().parse().ok()
}

// ─── Amounts ───────────────────────────────────────────────────────

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(million|billion|thousand|[mbk])?\b")
        .unwrap()
});

/// Character window inspected on each side of an amount for attribution
const CONTEXT_WINDOW: usize = 50;

const RESTITUTION_CONTEXT: &[&str] = &["restitution", "repay", "reimburse"];
const SETTLEMENT_CONTEXT: &[&str] = &["settle", "agreed to pay", "resolve"];
const FRAUD_CONTEXT: &[&str] = &["fraud", "defraud", "bilk", "loss", "scheme", "billed"];

/// A dollar amount with its byte span in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct RawAmount {
    pub value: f64,
    pub start: usize,
    pub end: usize,
}

/// Extract every dollar amount, resolving magnitude suffixes
pub fn parse_amounts(text: &str) -> Vec<RawAmount> {
    AMOUNT
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let digits = caps.get(1)?.as_str().replace(',', "");
            let base: f64 = digits.parse().ok()?;
            let multiplier = match caps.get(2).map(|s| s.as_str().to_ascii_lowercase()) {
                Some(s) if s == "billion" || s == "b" => 1e9,
                Some(s) if s == "million" || s == "m" => 1e6,
                Some(s) if s == "thousand" || s == "k" => 1e3,
                _ => 1.0,
            };
            Some(RawAmount {
                value: base * multiplier,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

/// Attribute every amount in the text to a financial bucket.
///
/// The window around each match is checked for the most specific context
/// first (restitution, then settlement, then fraud language). When the
/// window is silent, conviction cases default to estimated fraud and
/// settled cases to settlement. Per bucket, the largest figure wins.
pub fn attribute_amounts(
    text: &str,
    case_type: CaseType,
    status: CaseStatus,
) -> MonetaryAmounts {
    let lower = text.to_lowercase();
    let mut amounts = MonetaryAmounts::default();

    for raw in parse_amounts(text) {
        let window = context_window(&lower, raw.start, raw.end);

        let bucket = if contains_any(&window, RESTITUTION_CONTEXT) {
            &mut amounts.restitution
        } else if contains_any(&window, SETTLEMENT_CONTEXT) {
            &mut amounts.settlement
        } else if contains_any(&window, FRAUD_CONTEXT) {
            &mut amounts.estimated_fraud
        } else if status == CaseStatus::Settled {
            &mut amounts.settlement
        } else if case_type == CaseType::Conviction {
            &mut amounts.estimated_fraud
        } else {
            &mut amounts.estimated_fraud
        };

        *bucket = Some(bucket.map_or(raw.value, |prev: f64| prev.max(raw.value)));
    }

    amounts
}

fn context_window(lower: &str, start: usize, end: usize) -> String {
    let from = floor_char_boundary(lower, start.saturating_sub(CONTEXT_WINDOW));
    let to = ceil_char_boundary(lower, (end + CONTEXT_WINDOW).min(lower.len()));
    lower[from..to].to_string()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
