//! Property-style checks over the temporal contracts: interval chains,
//! diff symmetry, trend bucketing, decay monotonicity, and cancellation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use twingraph::{
    CancelToken, CandidateFact, ChangeKind, EngineConfig, EntityId, EntityKind, Interval,
    Provenance, QueryError, TripleKey, TwinEngine, TwinError, Value,
};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn fact(subject: EntityId, predicate: &str, value: impl Into<Value>, minutes: i64) -> CandidateFact {
    CandidateFact::new(
        TripleKey::literal(subject, predicate),
        value,
        Provenance::structured("feed", 0.9).unwrap(),
        t(minutes),
    )
}

#[test]
fn history_intervals_never_overlap_and_stay_contiguous() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let triple = TripleKey::literal(loan, "balance").identity();

    for (minute, value) in [(0, 100), (10, 140), (25, 90), (60, 175)] {
        engine.ingest(fact(loan, "balance", value, minute)).unwrap();
    }

    let history = engine.history(triple).unwrap();
    assert_eq!(history.len(), 4);
    for pair in history.windows(2) {
        assert!(!pair[0].validity.overlaps(&pair[1].validity));
        // No expire happened, so validity is gapless.
        assert_eq!(pair[0].validity.until, Some(pair[1].validity.from));
    }
}

#[test]
fn expire_introduces_the_only_gaps() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let triple = TripleKey::literal(loan, "balance").identity();

    engine.ingest(fact(loan, "balance", 100, 0)).unwrap();
    engine.expire(triple, t(10)).unwrap();
    engine.ingest(fact(loan, "balance", 120, 30)).unwrap();

    let history = engine.history(triple).unwrap();
    assert_eq!(history[0].validity.until, Some(t(10)));
    assert_eq!(history[1].validity.from, t(30));

    // Inside the gap, the lapsed version comes back with until populated —
    // distinct from NotFound, which is reserved for the pre-history era.
    let lapsed = engine.get_at(triple, t(20)).unwrap();
    assert_eq!(lapsed.validity.until, Some(t(10)));
    assert!(!lapsed.is_live_at(t(20)));
    assert!(matches!(
        engine.get_at(triple, t(-5)),
        Err(TwinError::Store(twingraph::StoreError::NotFound { .. }))
    ));
}

#[test]
fn diff_at_equal_times_is_empty() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    engine.ingest(fact(loan, "balance", 100, 0)).unwrap();

    for minute in [0, 5, 50] {
        let events = engine
            .diff(loan, t(minute), t(minute), &CancelToken::new())
            .unwrap();
        assert!(events.is_empty(), "diff(t, t) must be empty at t({minute})");
    }
}

#[test]
fn diff_reversal_inverts_added_and_removed() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let balance = TripleKey::literal(loan, "balance").identity();

    engine.ingest(fact(loan, "balance", 100, 0)).unwrap();
    engine.ingest(fact(loan, "rating", "B+", 10)).unwrap();
    engine.expire(balance, t(20)).unwrap();
    engine.ingest(fact(loan, "balance", 150, 40)).unwrap();

    let forward = engine.diff(loan, t(5), t(25), &CancelToken::new()).unwrap();
    let backward = engine.diff(loan, t(25), t(5), &CancelToken::new()).unwrap();
    assert_eq!(forward.len(), backward.len());

    for fwd in &forward {
        let bwd = backward
            .iter()
            .find(|e| e.triple == fwd.triple)
            .expect("same change set");
        assert_eq!(bwd.before, fwd.after);
        assert_eq!(bwd.after, fwd.before);
        match fwd.kind {
            ChangeKind::Added => assert_eq!(bwd.kind, ChangeKind::Removed),
            ChangeKind::Removed => assert_eq!(bwd.kind, ChangeKind::Added),
            ChangeKind::Modified => assert_eq!(bwd.kind, ChangeKind::Modified),
        }
    }

    // The expiry shows as removed going forward.
    let balance_fwd = forward.iter().find(|e| e.triple == balance).unwrap();
    assert_eq!(balance_fwd.kind, ChangeKind::Removed);
}

#[test]
fn numeric_representation_never_registers_as_change() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;

    engine.ingest(fact(loan, "balance", Value::Int(100), 0)).unwrap();
    engine
        .ingest(fact(loan, "balance", Value::Float(100.0), 10))
        .unwrap();

    let events = engine.diff(loan, t(5), t(15), &CancelToken::new()).unwrap();
    assert!(events.is_empty());
}

#[test]
fn trend_reports_last_known_per_bucket() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let triple = TripleKey::literal(loan, "balance").identity();

    engine.ingest(fact(loan, "balance", 100, 0)).unwrap();
    engine.ingest(fact(loan, "balance", 130, 22)).unwrap();
    engine.ingest(fact(loan, "balance", 90, 47)).unwrap();

    let range = Interval::new(t(0), t(60)).unwrap();
    let points = engine
        .trend(triple, &range, Duration::minutes(15), &CancelToken::new())
        .unwrap();

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    // Bucket ends at t15, t30, t45, t60: last-known, never averaged.
    assert_eq!(values, vec![100.0, 130.0, 130.0, 90.0]);
}

#[test]
fn cancelled_queries_return_no_partial_results() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    engine.ingest(fact(loan, "balance", 100, 0)).unwrap();
    let triple = TripleKey::literal(loan, "balance").identity();

    let token = CancelToken::new();
    token.cancel();

    assert!(matches!(
        engine.diff(loan, t(0), t(30), &token),
        Err(TwinError::Query(QueryError::Cancelled))
    ));
    let range = Interval::new(t(0), t(60)).unwrap();
    assert!(matches!(
        engine.trend(triple, &range, Duration::minutes(5), &token),
        Err(TwinError::Query(QueryError::Cancelled))
    ));
}

#[test]
fn confidence_decays_but_never_rises_with_age() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let receipt = engine.ingest(fact(loan, "balance", 100, 0)).unwrap();

    let mut last = f32::INFINITY;
    for days in [0i64, 7, 30, 180, 720] {
        let score = engine.current_confidence(&receipt.version, t(days * 24 * 60));
        assert!(score <= last, "confidence rose at {days} days");
        last = score;
    }
}

#[test]
fn edges_appear_in_both_endpoints_snapshots() {
    let engine = TwinEngine::new(EngineConfig::default());
    let loan = engine.register_entity("loanA", EntityKind::Asset).id;
    let guarantor = engine.register_entity("acme", EntityKind::Organization).id;

    engine
        .ingest(CandidateFact::new(
            TripleKey::edge(loan, "guaranteedBy", guarantor),
            Value::Entity(guarantor),
            Provenance::manual("analyst-3", 1.0).unwrap(),
            t(0),
        ))
        .unwrap();

    let from_loan = engine.snapshot(loan, t(5));
    let from_guarantor = engine.snapshot(guarantor, t(5));
    assert_eq!(from_loan.len(), 1);
    assert_eq!(from_guarantor.len(), 1);
    assert_eq!(
        from_loan.facts.keys().next(),
        from_guarantor.facts.keys().next()
    );
}
