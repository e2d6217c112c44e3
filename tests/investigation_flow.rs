//! Fixture-driven pipeline flow test
//!
//! Walks realistic raw source payloads through every stage the engine
//! chains together — connector normalization, legal classification,
//! evidence compilation, scoring — without touching the network. This is
//! the investigation the aggregator would assemble if the wire answered
//! with these fixtures.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use provguard::analysis::{analyze_geographic, detect_anomalies, detect_temporal, PeerBaseline};
use provguard::config::ScoringPolicy;
use provguard::evidence::{compile_evidence, evidence_digest, EvidenceSeverity};
use provguard::legal::{LegalClassifier, SubjectContext};
use provguard::profile::{CaseType, Npi, SubjectProfile};
use provguard::scoring::{calculate_risk_score, priority_from_score, Priority};
use provguard::sources::{exclusion, legal_search, registry, utilization, FixedClock, SourceOutcome};

fn npi() -> Npi {
    Npi::new("1234567890").unwrap()
}

const REGISTRY_FIXTURE: &str = r#"{
    "result_count": 1,
    "results": [{
        "number": "1234567890",
        "basic": {
            "first_name": "Jane",
            "last_name": "Doe",
            "credential": "MD",
            "enumeration_date": "2008-03-14"
        },
        "addresses": [
            {"address_purpose": "LOCATION", "address_1": "1 Main St",
             "city": "Denver", "state": "CO", "postal_code": "80201"}
        ],
        "taxonomies": [
            {"code": "207RC0000X", "desc": "Cardiology", "state": "CO"}
        ]
    }]
}"#;

const UTILIZATION_FIXTURE: &str = r#"[
    {"line_srvc_cnt": "1200", "bene_unique_cnt": "200",
     "total_sbmtd_chrg": "420000", "total_medicare_payment_amt": "150000",
     "provider_type": "Cardiology"},
    {"line_srvc_cnt": "600", "bene_unique_cnt": "50",
     "total_sbmtd_chrg": "180000", "total_medicare_payment_amt": "50000"}
]"#;

const EXCLUSION_FIXTURE: &str = "\
LASTNAME,FIRSTNAME,NPI,EXCLTYPE,EXCLDATE,STATE\n\
SMITH,JOHN,9876543210,1128b4,20180101,TX\n";

const SEARCH_FIXTURE: &str = r##"
<div class="result">
  <a class="result__a" href="https://www.justice.gov/usao/pr/cardiologist-sentenced">
    Denver cardiologist Jane Doe sentenced for health care fraud
  </a>
  <a class="result__snippet" href="#">pleaded guilty to a $2.5 million billing scheme, March 3, 2025</a>
</div>
<div class="result">
  <a class="result__a" href="https://www.example-news.com/local">
    Local clinic expands cardiology wing
  </a>
  <a class="result__snippet" href="#">new imaging suite opens downtown</a>
</div>
"##;

#[test]
fn full_pipeline_over_fixtures() {
    let subject = npi();

    // ── Connector normalization ──
    let identity = registry::normalize(
        &serde_json::from_str(REGISTRY_FIXTURE).unwrap(),
        &subject,
    )
    .ok()
    .expect("registry fixture normalizes");
    let metrics = utilization::normalize(
        &serde_json::from_str(UTILIZATION_FIXTURE).unwrap(),
        &subject,
    )
    .ok()
    .expect("utilization fixture normalizes");
    let exclusion_record = exclusion::lookup(EXCLUSION_FIXTURE, &subject).unwrap();
    let hits = legal_search::parse_results(SEARCH_FIXTURE, "\"Jane Doe\" convicted healthcare fraud");

    // List rows summed per numeric field.
    assert_eq!(metrics.total_services, 1800);
    assert_eq!(metrics.unique_beneficiaries, 250);
    assert!(!exclusion_record.excluded, "different subject on the list");
    assert_eq!(hits.len(), 2);

    // ── Profile assembly (what the aggregator would produce) ──
    let mut profile = SubjectProfile::new(subject.clone());
    profile.name = identity.name;
    profile.specialty = identity.specialty;
    profile.practice_location = identity.practice_location;
    profile.utilization = metrics;
    profile.exclusion = exclusion_record;

    // ── Legal classification ──
    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
    ));
    let classifier = LegalClassifier::new(clock, &ScoringPolicy::default());
    let name = profile.name.full_name().unwrap();
    let findings = classifier.classify(
        &hits,
        &SubjectContext {
            name: &name,
            npi: &subject,
            specialty: profile.specialty.as_deref(),
            location: profile.practice_location.state.as_deref(),
        },
    );
    // The neutral expansion story is discarded; the sentencing story is a
    // conviction with the dollar amount attributed to estimated fraud.
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].case_type, CaseType::Conviction);
    assert!(findings[0].verified);
    assert!(findings[0].relevance > 0.9);
    assert_eq!(findings[0].amounts.estimated_fraud, Some(2_500_000.0));
    assert_eq!(findings[0].date.as_deref(), Some("march 3, 2025"));
    profile.legal_findings = findings;

    // ── Analysis ──
    let baseline = PeerBaseline::default();
    let anomalies = detect_anomalies(&profile.utilization, &baseline, 2.5);
    // total_services: z = (1800 - 1000) / 200 = 4.0
    assert!((anomalies["total_services"].z_score - 4.0).abs() < 1e-9);
    // services/beneficiary 7.2 is within peer range at std 1.0? z = 3.9 —
    // flagged as well; charge ratio (600k/200k = 3.0): z = 6.0.
    assert!(anomalies.contains_key("charge_to_payment_ratio"));

    let temporal = detect_temporal(&profile);
    let geographic = analyze_geographic(&profile);
    assert!(geographic.anomalies.is_empty());

    // ── Evidence ──
    let evidence = compile_evidence(&profile, &anomalies, &temporal, &geographic);
    // Anomaly items first, legal last; no exclusion section.
    assert!(matches!(
        evidence.first().unwrap().kind,
        provguard::evidence::EvidenceKind::BillingAnomaly { .. }
    ));
    let last = evidence.last().unwrap();
    assert!(matches!(
        last.kind,
        provguard::evidence::EvidenceKind::Legal { .. }
    ));
    assert_eq!(last.severity, EvidenceSeverity::High);
    assert_eq!(last.regulatory_citation.as_deref(), Some("Public court records"));

    // ── Scoring ──
    let score = calculate_risk_score(
        &profile,
        &anomalies,
        &evidence,
        1.0,
        &ScoringPolicy::default(),
    );
    // Highest anomaly is the charge ratio (z = 6.0 → capped contribution
    // 30); conviction addend 20 → 50.
    assert_eq!(score, 50);
    assert_eq!(priority_from_score(score), Priority::Medium);

    // The digest is stable across recomputation of the same trail.
    assert_eq!(evidence_digest(&evidence), evidence_digest(&evidence));
}

#[test]
fn registry_no_data_flows_as_empty_answer() {
    let body = serde_json::from_str(r#"{"result_count": 0, "results": []}"#).unwrap();
    let outcome = registry::normalize(&body, &npi());
    assert!(matches!(outcome, SourceOutcome::NoData { .. }));
}
