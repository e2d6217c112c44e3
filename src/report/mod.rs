//! Result rendering at the collaborator boundary
//!
//! The engine's contract ends at `RiskAnalysisResult`; these renderers
//! serialize it for the narrative-generation and document-rendering
//! collaborators. JSON is the machine interface; Markdown is a human
//! summary for review queues.

use std::path::Path;

use crate::engine::RiskAnalysisResult;
use crate::ProvguardResult;

/// Output format for the analysis result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
}

/// Render the result to a string
pub fn render_report(result: &RiskAnalysisResult, format: ReportFormat) -> ProvguardResult<String> {
    match format {
        ReportFormat::Json => render_json(result),
        ReportFormat::Markdown => Ok(render_markdown(result)),
    }
}

/// Write the result in the given format
pub fn write_report(
    result: &RiskAnalysisResult,
    format: ReportFormat,
    output: &Path,
) -> ProvguardResult<()> {
    let content = render_report(result, format)?;
    std::fs::write(output, content).map_err(crate::ProvguardError::Io)?;
    Ok(())
}

fn render_json(result: &RiskAnalysisResult) -> ProvguardResult<String> {
    serde_json::to_string_pretty(result).map_err(crate::ProvguardError::SerdeError)
}

fn render_markdown(result: &RiskAnalysisResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Risk Analysis — {}\n\n", result.npi));
    out.push_str(&format!(
        "**Risk score:** {}/100 ({} priority)  \n**Data quality:** {:.2}  \n**Evidence digest:** `{}`\n\n",
        result.risk_score, result.priority, result.data_quality, result.evidence_digest
    ));

    if !result.anomalies.is_empty() {
        out.push_str("## Statistical anomalies\n\n");
        out.push_str("| Metric | Value | Peer mean | Z-score | Direction |\n");
        out.push_str("|---|---|---|---|---|\n");
        for (metric, flag) in &result.anomalies {
            out.push_str(&format!(
                "| {} | {} | {} | {:.2} | {} |\n",
                metric, flag.value, flag.mean, flag.z_score, flag.direction
            ));
        }
        out.push('\n');
    }

    if !result.evidence.is_empty() {
        out.push_str("## Evidence\n\n");
        for (i, item) in result.evidence.iter().enumerate() {
            out.push_str(&format!(
                "{}. **[{}]** {} _(significance {:.2}, source: {})_\n",
                i + 1,
                item.severity,
                item.description,
                item.statistical_significance,
                item.source
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "---\n_Generated by provguard {} in {}ms_\n",
        result.engine_version, result.duration_ms
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GeographicPatterns, TemporalPatterns};
    use crate::scoring::Priority;
    use std::collections::BTreeMap;

    fn result() -> RiskAnalysisResult {
        RiskAnalysisResult {
            npi: "1234567890".into(),
            risk_score: 35,
            priority: Priority::Medium,
            anomalies: BTreeMap::new(),
            evidence: vec![],
            temporal_patterns: TemporalPatterns::default(),
            geographic_patterns: GeographicPatterns::default(),
            data_quality: 0.9,
            evidence_digest: "abc123".into(),
            engine_version: "0.3.0".into(),
            duration_ms: 12,
        }
    }

    #[test]
    fn json_round_trips() {
        let rendered = render_report(&result(), ReportFormat::Json).unwrap();
        let back: RiskAnalysisResult = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back.risk_score, 35);
        assert_eq!(back.priority, Priority::Medium);
    }

    #[test]
    fn markdown_carries_score_and_priority() {
        let rendered = render_report(&result(), ReportFormat::Markdown).unwrap();
        assert!(rendered.contains("35/100"));
        assert!(rendered.contains("medium priority"));
        assert!(rendered.contains("abc123"));
    }
}
