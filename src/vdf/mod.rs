//! Verifiable Delay Function engine (C1).
//!
//! Grounded on the teacher's `core::memory_hard_vdf::MemoryHardVDF`: a
//! `compute`/`verify_proof` pair operating on a 32-byte state, iterated a
//! fixed number of times, with a `*Proof` struct carrying
//! `(input, output, iterations)`. The teacher's VDF is memory-hard (ASIC
//! resistance for a storage-continuity network); this one only needs to
//! prove *sequential* minimum elapsed time, so the per-step function is the
//! plain iterated hash the spec names: `x_{i+1} = H(x_i)`, domain-separated
//! and re-mixed with the original input and step counter so that two
//! different `(input, n)` pairs never collide on an intermediate state.

use crate::hash::{domain_hash, Hash32};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const VDF_STEP_DOMAIN: &[u8] = b"witnessd-vdf-step-v1";

/// Immutable VDF difficulty parameters for a chain. Shipped inside any
/// exported packet (spec §3 "VDF parameters").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VdfParams {
    /// Minimum number of sequential iterations the chain layer accepts.
    pub min_iterations: u64,
    /// Calibration used to translate iterations into a minimum-elapsed-time claim.
    pub iterations_per_second: u64,
}

impl Default for VdfParams {
    fn default() -> Self {
        // ~1M simple SHA-256 steps is a few hundred ms on commodity hardware;
        // callers tune this to the latency they want a checkpoint to prove.
        Self {
            min_iterations: 1_000_000,
            iterations_per_second: 2_000_000,
        }
    }
}

impl VdfParams {
    pub fn new(min_iterations: u64, iterations_per_second: u64) -> Self {
        Self {
            min_iterations,
            iterations_per_second,
        }
    }

    /// The claim of *at least* this much wall-clock time having elapsed.
    pub fn min_elapsed_time(&self, iterations: u64) -> Duration {
        if self.iterations_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(iterations as f64 / self.iterations_per_second as f64)
    }
}

/// A VDF proof: the sequential-work triple plus the wall-clock time the
/// computing device actually observed (informational only — verification
/// never trusts this field, only `iterations`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdfProof {
    pub input: Hash32,
    pub output: Hash32,
    pub iterations: u64,
    #[serde(with = "duration_millis")]
    pub wall_clock: Duration,
}

impl VdfProof {
    /// Minimum elapsed time this proof claims, given the chain's parameters.
    pub fn min_elapsed_time(&self, params: &VdfParams) -> Duration {
        params.min_elapsed_time(self.iterations)
    }

    /// Recompute the sequential function and compare. Spec §4.1: verify is a
    /// pure function of `(input, n)`; never shortcuts the computation.
    pub fn verify(&self) -> bool {
        compute_raw(&self.input, self.iterations) == self.output
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// One sequential step: mix the running state with the original input and
/// the step index, then hash. Mixing in `input`/`i` prevents precomputed
/// rainbow-table-style shortcuts across different seeds.
fn step(state: Hash32, input: &Hash32, i: u64) -> Hash32 {
    domain_hash(VDF_STEP_DOMAIN, &[&state, input, &i.to_be_bytes()])
}

fn compute_raw(input: &Hash32, iterations: u64) -> Hash32 {
    let mut state = *input;
    for i in 0..iterations {
        state = step(state, input, i);
    }
    state
}

/// Run the VDF for exactly `iterations` sequential steps from `input`,
/// producing a proof. Deterministic; a pure function of `(input, iterations)`.
pub fn compute(input: Hash32, iterations: u64) -> VdfProof {
    let start = Instant::now();
    let output = compute_raw(&input, iterations);
    VdfProof {
        input,
        output,
        iterations,
        wall_clock: start.elapsed(),
    }
}

/// Verify a proof independently of any particular [`VdfParams`] minimum —
/// the chain layer, not this function, enforces `n >= min_iterations`
/// (spec §4.1: "reject `n < min_iterations` at the chain layer, not the VDF
/// layer itself").
pub fn verify(proof: &VdfProof) -> bool {
    proof.verify()
}
