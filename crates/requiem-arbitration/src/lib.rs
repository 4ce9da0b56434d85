// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-arbitration
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_circuit::CircuitRegistry;
use requiem_error::{ErrorCode, RequiemError};
use requiem_types::{ArbitrationDecision, ArbitrationRequest, ArbitrationResult, ArbitrationStrategy, Candidate};

fn cost_optimized_order(candidates: &[&Candidate]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    idx.sort_by_key(|&i| candidates[i].cost_cents);
    idx
}

fn latency_optimized_order(candidates: &[&Candidate]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    idx.sort_by_key(|&i| candidates[i].latency_ms);
    idx
}

fn quality_first_order(candidates: &[&Candidate]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    idx.sort_by_key(|&i| std::cmp::Reverse(candidates[i].quality_score));
    idx
}

/// Weight the balanced strategy gives cost in its composite score.
pub const BALANCED_COST_WEIGHT: f64 = 0.3;
/// Weight the balanced strategy gives quality in its composite score.
pub const BALANCED_QUALITY_WEIGHT: f64 = 0.4;
/// Weight the balanced strategy gives latency in its composite score.
pub const BALANCED_LATENCY_WEIGHT: f64 = 0.3;

/// Balanced strategy's composite score: lower is better. Cost and latency
/// are normalized against the candidate pool's own max so no single unit
/// dominates; quality's complement (100 - score) is weighted the same way.
fn balanced_scores(candidates: &[&Candidate]) -> Vec<f64> {
    let max_cost = candidates.iter().map(|c| c.cost_cents).max().unwrap_or(1).max(1) as f64;
    let max_latency = candidates.iter().map(|c| c.latency_ms).max().unwrap_or(1).max(1) as f64;
    candidates
        .iter()
        .map(|c| {
            let cost_term = f64::from(c.cost_cents) / max_cost;
            let latency_term = f64::from(c.latency_ms) / max_latency;
            let quality_term = f64::from(100 - c.quality_score.min(100)) / 100.0;
            BALANCED_COST_WEIGHT * cost_term + BALANCED_QUALITY_WEIGHT * quality_term + BALANCED_LATENCY_WEIGHT * latency_term
        })
        .collect()
}

/// Hash `input_fingerprint` against a tied set of candidate keys and return
/// the index of the one it selects. Pure function of its inputs: the same
/// fingerprint and tied set always picks the same member, which is what
/// gives `balanced` and `deterministic-hash` their determinism property.
fn hash_tiebreak(input_fingerprint: &str, tied_keys: &[&str]) -> requiem_error::Result<usize> {
    let digest = requiem_hash::digest_hex(&(input_fingerprint, tied_keys))?;
    let bucket = u64::from_str_radix(&digest[..16], 16).unwrap_or(0);
    Ok((bucket as usize) % tied_keys.len().max(1))
}

fn balanced_order(request: &ArbitrationRequest, candidates: &[&Candidate]) -> requiem_error::Result<Vec<usize>> {
    let scores = balanced_scores(candidates);
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    idx.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap());

    // Group indices tied on score with the best-ranked group, and break that
    // tie deterministically by hashing the input fingerprint.
    let Some(&best) = idx.first() else { return Ok(idx) };
    let best_score = scores[best];
    let tied: Vec<usize> = idx.iter().copied().take_while(|&i| (scores[i] - best_score).abs() < f64::EPSILON).collect();
    if tied.len() > 1 {
        let tied_keys: Vec<String> = tied.iter().map(|&i| candidates[i].key()).collect();
        let borrowed: Vec<&str> = tied_keys.iter().map(String::as_str).collect();
        let winner_pos = hash_tiebreak(&request.input_fingerprint, &borrowed)?;
        let winner = tied[winner_pos];
        let mut reordered = vec![winner];
        reordered.extend(idx.iter().copied().filter(|&i| i != winner));
        return Ok(reordered);
    }
    Ok(idx)
}

fn deterministic_hash_order(request: &ArbitrationRequest, candidates: &[&Candidate]) -> requiem_error::Result<Vec<usize>> {
    let keys: Vec<String> = candidates.iter().map(|c| c.key()).collect();
    let borrowed: Vec<&str> = keys.iter().map(String::as_str).collect();
    let mut idx: Vec<usize> = (0..candidates.len()).collect();
    if !idx.is_empty() {
        let start = hash_tiebreak(&request.input_fingerprint, &borrowed)?;
        idx.rotate_left(start);
    }
    Ok(idx)
}

/// Arbitrate a request against the current circuit breaker state.
///
/// Candidates whose breaker is open are excluded from selection and listed
/// in [`ArbitrationResult::skipped_open_circuits`]. The remaining candidates
/// are ordered by `request.strategy`; the first becomes [`ArbitrationDecision::chosen`]
/// and the rest form its `fallback_chain` in preference order.
///
/// # Errors
///
/// Returns [`ErrorCode::InternalError`] only if canonicalizing the request
/// for [`ArbitrationStrategy::DeterministicHash`] fails, which does not
/// happen for any request built from this crate's types.
pub fn arbitrate(request: &ArbitrationRequest, circuits: &CircuitRegistry) -> requiem_error::Result<ArbitrationResult> {
    let mut skipped_open_circuits = Vec::new();
    let eligible: Vec<&Candidate> = request
        .candidates
        .iter()
        .filter(|c| {
            if circuits.is_open(&c.key()) {
                skipped_open_circuits.push(c.key());
                false
            } else {
                true
            }
        })
        .collect();

    if eligible.is_empty() {
        return Ok(ArbitrationResult { decision: None, skipped_open_circuits });
    }

    let order = match request.strategy {
        ArbitrationStrategy::CostOptimized => cost_optimized_order(&eligible),
        ArbitrationStrategy::LatencyOptimized => latency_optimized_order(&eligible),
        ArbitrationStrategy::QualityFirst => quality_first_order(&eligible),
        ArbitrationStrategy::Balanced => balanced_order(request, &eligible)?,
        ArbitrationStrategy::DeterministicHash => deterministic_hash_order(request, &eligible)?,
    };

    let ranked: Vec<String> = order.iter().map(|&i| eligible[i].key()).collect();
    let chosen = ranked[0].clone();
    let fallback_chain = ranked[1..].to_vec();
    let reason = if skipped_open_circuits.is_empty() {
        format!("selected '{chosen}' via {:?} over {} candidate(s)", request.strategy, eligible.len())
    } else {
        format!(
            "selected '{chosen}' via {:?}; excluded {} candidate(s) with open circuits",
            request.strategy,
            skipped_open_circuits.len()
        )
    };

    Ok(ArbitrationResult {
        decision: Some(ArbitrationDecision { chosen, strategy: request.strategy, reason, fallback_chain }),
        skipped_open_circuits,
    })
}

/// Convenience wrapper returning a typed error when no candidate is eligible,
/// for callers that want `?` rather than matching on `decision: None`.
///
/// # Errors
///
/// Returns [`ErrorCode::CircuitOpen`] if every candidate's breaker is open
/// (or the pool was empty), otherwise delegates to [`arbitrate`].
pub fn arbitrate_or_err(request: &ArbitrationRequest, circuits: &CircuitRegistry) -> requiem_error::Result<ArbitrationDecision> {
    let result = arbitrate(request, circuits)?;
    result.decision.ok_or_else(|| {
        RequiemError::new(ErrorCode::CircuitOpen, format!("no eligible candidate for purpose '{}'", request.purpose))
            .with_detail("tenant_id", &request.tenant_id)
            .with_detail("purpose", &request.purpose)
    })
}
