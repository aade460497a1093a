//! End-to-end loan journey: ingest, temporal queries, conflict surfacing,
//! and guidance over one applicant's evolving twin.

use chrono::{DateTime, Duration, TimeZone, Utc};
use twingraph::{
    CancelToken, CandidateFact, ChangeKind, EngineConfig, EntityId, EntityKind, FlagStatus,
    GuidanceConfig, Influence, Provenance, SourceId, TripleKey, TwinEngine, Value,
};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn guidance_config() -> GuidanceConfig {
    GuidanceConfig::new()
        .with_influence("creditScore", Influence::numeric(-1.2, 650.0, 60.0))
        .with_influence("missedPayments", Influence::numeric(1.5, 1.0, 2.0))
        .with_influence("cashReserves", Influence::numeric(-0.9, 250_000.0, 150_000.0))
        .with_candidate(
            "missedPayments",
            0.05,
            vec![(Value::Int(0), 0.7), (Value::Int(3), 0.3)],
        )
        .with_candidate(
            "cashReserves",
            0.10,
            vec![
                (Value::Float(100_000.0), 0.5),
                (Value::Float(400_000.0), 0.5),
            ],
        )
}

fn engine() -> TwinEngine {
    let engine = TwinEngine::new(EngineConfig {
        guidance: guidance_config(),
        ..EngineConfig::default()
    });
    engine.rate_source(SourceId::from_name("bureau"), 0.9);
    engine.rate_source(SourceId::from_name("forum"), 0.2);
    engine
}

fn bureau_fact(
    subject: EntityId,
    predicate: &str,
    value: impl Into<Value>,
    minutes: i64,
) -> CandidateFact {
    CandidateFact::new(
        TripleKey::literal(subject, predicate),
        value,
        Provenance::structured("bureau", 0.95).unwrap(),
        t(minutes),
    )
}

#[test]
fn loan_application_journey() {
    let engine = engine();
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let credit = TripleKey::literal(loan, "creditScore").identity();

    // 1. Initial application facts arrive.
    engine.ingest(bureau_fact(loan, "creditScore", 680, 0)).unwrap();
    engine
        .ingest(bureau_fact(loan, "cashReserves", 180_000.0, 0))
        .unwrap();

    // 2. A month later the bureau reports an improved score.
    engine.ingest(bureau_fact(loan, "creditScore", 710, 30)).unwrap();

    // Point-in-time reads see each era.
    assert_eq!(engine.get_at(credit, t(15)).unwrap().value, Value::Int(680));
    assert_eq!(engine.get_at(credit, t(45)).unwrap().value, Value::Int(710));

    // 3. Diff over the journey reports exactly the score change.
    let events = engine.diff(loan, t(0), t(45), &CancelToken::new()).unwrap();
    let change = events
        .iter()
        .find(|e| e.key.predicate == "creditScore")
        .expect("creditScore changed");
    assert_eq!(change.kind, ChangeKind::Modified);
    assert_eq!(change.before, Some(Value::Int(680)));
    assert_eq!(change.after, Some(Value::Int(710)));

    // 4. History is a clean, contiguous chain.
    let history = engine.history(credit).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].validity.until, Some(t(30)));
    assert_eq!(history[0].superseded_by, Some(history[1].id));
    assert_eq!(history[1].supersedes, Some(history[0].id));
    assert!(history[1].is_open());
}

#[test]
fn contradiction_is_flagged_not_resolved() {
    let engine = engine();
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;

    engine.ingest(bureau_fact(loan, "creditScore", 680, 0)).unwrap();

    // An unreliable forum post contradicts the bureau.
    let receipt = engine
        .ingest(CandidateFact::new(
            TripleKey::literal(loan, "creditScore"),
            550,
            Provenance::structured("forum", 0.6).unwrap(),
            t(10),
        ))
        .unwrap();

    // The fact stored (versioning is not vetoed)...
    let credit = TripleKey::literal(loan, "creditScore").identity();
    assert_eq!(engine.get_at(credit, t(15)).unwrap().value, Value::Int(550));

    // ...but discounted and flagged for review.
    let flag = receipt.conflict.expect("conflict surfaced");
    assert!(receipt.version.components.contradicts_incumbent);
    assert_eq!(flag.incumbent_value, Value::Int(680));
    assert_eq!(engine.open_conflicts().len(), 1);

    engine.review_conflict(flag.id, FlagStatus::Reviewed);
    assert!(engine.open_conflicts().is_empty());
}

#[test]
fn guidance_ranks_missing_information() {
    let engine = engine();
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    engine.ingest(bureau_fact(loan, "creditScore", 710, 0)).unwrap();

    let snapshot = engine.snapshot(loan, t(10));
    let outcome = twingraph::OutcomeVariable::new("default_risk", 0.3).unwrap();
    let ctx = twingraph::DecisionContext::new(snapshot, outcome);

    let rec = engine.recommend(&ctx).unwrap();

    // Both unknown predicates rank; the heavier-weighted missedPayments
    // carries more expected information.
    assert_eq!(rec.actions.len(), 2);
    assert_eq!(rec.actions[0].predicate, "missedPayments");
    assert!(rec.actions[0].expected_gain > 0.0);

    // The reasoning path explains the estimate via the known score.
    assert_eq!(rec.reasoning.steps[0].predicate, "creditScore");
    assert!(rec.reasoning.probability < 0.3);

    // Identical context, identical ranking.
    let again = engine.recommend(&ctx).unwrap();
    assert_eq!(rec, again);
}

#[test]
fn rejected_write_enables_backfill() {
    let engine = engine();
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let credit = TripleKey::literal(loan, "creditScore").identity();

    engine.ingest(bureau_fact(loan, "creditScore", 710, 30)).unwrap();

    // A late-arriving older report is rejected head-on...
    let err = engine
        .ingest(bureau_fact(loan, "creditScore", 680, 0))
        .unwrap_err();
    let twingraph::TwinError::Store(twingraph::StoreError::OutOfOrderWrite { open, .. }) = err
    else {
        panic!("expected OutOfOrderWrite");
    };
    assert_eq!(open.value, Value::Int(710));

    // ...and lands through the explicit historical path instead.
    engine
        .backfill(bureau_fact(loan, "creditScore", 680, 0), t(30))
        .unwrap();
    assert_eq!(engine.get_at(credit, t(15)).unwrap().value, Value::Int(680));
    assert_eq!(engine.get_at(credit, t(45)).unwrap().value, Value::Int(710));
}
