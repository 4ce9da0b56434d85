// SPDX-License-Identifier: MIT OR Apache-2.0
//! S6 — two candidates tied on balanced score, with the same input
//! fingerprint, resolve to the same winner on every run.

use requiem_arbitration::arbitrate;
use requiem_circuit::CircuitRegistry;
use requiem_id::FixedClock;
use requiem_types::{ArbitrationRequest, ArbitrationStrategy, Candidate};
use std::sync::Arc;

fn tied_request() -> ArbitrationRequest {
    ArbitrationRequest {
        tenant_id: "tenant-a".to_string(),
        purpose: "chat".to_string(),
        input_fingerprint: "fingerprint-fixed".to_string(),
        candidates: vec![
            Candidate { provider: "alpha".to_string(), model: "m1".to_string(), cost_cents: 10, latency_ms: 200, quality_score: 80 },
            Candidate { provider: "beta".to_string(), model: "m1".to_string(), cost_cents: 10, latency_ms: 200, quality_score: 80 },
        ],
        strategy: ArbitrationStrategy::Balanced,
    }
}

#[test]
fn tied_balanced_candidates_break_ties_deterministically() {
    let clock = Arc::new(FixedClock::new(0));
    let circuits = CircuitRegistry::new(clock, 3, 30_000);
    let request = tied_request();

    let mut chosen = Vec::new();
    for _ in 0..10 {
        let result = arbitrate(&request, &circuits).unwrap();
        let decision = result.decision.expect("at least one eligible candidate");
        chosen.push(decision.chosen);
    }

    let first = chosen[0].clone();
    assert!(chosen.iter().all(|c| *c == first), "tie-break must pick the same candidate every run: {chosen:?}");
}

#[test]
fn different_input_fingerprints_may_break_ties_differently_but_stay_stable_each() {
    let clock = Arc::new(FixedClock::new(0));
    let circuits = CircuitRegistry::new(clock, 3, 30_000);

    let mut request_a = tied_request();
    request_a.input_fingerprint = "fingerprint-a".to_string();
    let mut request_b = tied_request();
    request_b.input_fingerprint = "fingerprint-b".to_string();

    let winner_a_first = arbitrate(&request_a, &circuits).unwrap().decision.unwrap().chosen;
    let winner_b_first = arbitrate(&request_b, &circuits).unwrap().decision.unwrap().chosen;

    for _ in 0..5 {
        assert_eq!(arbitrate(&request_a, &circuits).unwrap().decision.unwrap().chosen, winner_a_first);
        assert_eq!(arbitrate(&request_b, &circuits).unwrap().decision.unwrap().chosen, winner_b_first);
    }
}
