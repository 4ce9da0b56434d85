// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named strategy the arbitration engine selects a provider/model with.
///
/// All strategies are deterministic given the same candidate set and circuit
/// breaker state: no strategy consults wall-clock jitter or randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationStrategy {
    /// Prefer the candidate with the lowest cost-per-call estimate.
    CostOptimized,
    /// Prefer the candidate with the lowest observed latency.
    LatencyOptimized,
    /// Prefer the candidate ranked highest for output quality.
    QualityFirst,
    /// Weigh cost, latency, and quality evenly.
    Balanced,
    /// Select deterministically by hashing the request, for reproducible
    /// load spreading across equally-ranked candidates.
    DeterministicHash,
}

/// A candidate provider:model pair with the static scoring inputs the
/// arbitration strategies read from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    /// Provider identifier, e.g. `"openai"`.
    pub provider: String,
    /// Model identifier, e.g. `"gpt-5"`.
    pub model: String,
    /// Estimated cost in cents per call.
    pub cost_cents: u32,
    /// Estimated latency in milliseconds.
    pub latency_ms: u32,
    /// Quality score in `[0, 100]`, higher is better.
    pub quality_score: u8,
}

impl Candidate {
    /// The `"{provider}:{model}"` identifier used by the circuit breaker and
    /// error details.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// A request to select one candidate from a set, by a given strategy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArbitrationRequest {
    /// Tenant this selection is made on behalf of.
    pub tenant_id: String,
    /// Purpose the selected model will serve, e.g. `"chat"`, `"embedding"`.
    pub purpose: String,
    /// Stable hex identifier of the input, consulted to break ties
    /// deterministically among equally-ranked candidates.
    pub input_fingerprint: String,
    /// Candidate pool to select from.
    pub candidates: Vec<Candidate>,
    /// Strategy to apply.
    pub strategy: ArbitrationStrategy,
}

/// The arbitration engine's decision for a given request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArbitrationDecision {
    /// The chosen candidate's `"{provider}:{model}"` key.
    pub chosen: String,
    /// Strategy that produced this decision.
    pub strategy: ArbitrationStrategy,
    /// Human-readable justification (which candidates were excluded and why).
    pub reason: String,
    /// Remaining candidates in preference order, for failover.
    pub fallback_chain: Vec<String>,
}

/// The result of running arbitration: either an [`ArbitrationDecision`] or an
/// indication that no eligible candidate remained (all circuits open, empty
/// pool).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArbitrationResult {
    /// The decision, if at least one eligible candidate remained.
    pub decision: Option<ArbitrationDecision>,
    /// Candidates skipped because their circuit breaker was open.
    pub skipped_open_circuits: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_key_formats_as_provider_colon_model() {
        let c = Candidate {
            provider: "openai".into(),
            model: "gpt-5".into(),
            cost_cents: 10,
            latency_ms: 200,
            quality_score: 90,
        };
        assert_eq!(c.key(), "openai:gpt-5");
    }
}
