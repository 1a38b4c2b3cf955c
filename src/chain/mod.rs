//! Checkpoint chain (C3): an append-only, hash-linked sequence of content
//! states, each carrying a VDF delay proof and optionally an
//! attestation-provider binding and an author signature.
//!
//! Grounded on the teacher's `IndividualHashChain`: an owned `Vec` of
//! linked records, an `append`/`add_commitment`-shaped mutator that computes
//! the new record's canonical hash and pushes it, and a `verify_chain` that
//! walks the vector checking linkage and recomputed hashes in one pass.

pub mod checkpoint;
pub mod persistence;

pub use checkpoint::Checkpoint;

use crate::attestation::{Binding, HardwareAttestationProvider};
use crate::error::{WitnessError, WitnessResult};
use crate::hash::{domain_hash, Hash32, ZERO_HASH};
use crate::telemetry::performance::PerformanceTimer;
use crate::vdf::{self, VdfParams};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Keypair, Signer};
use serde::{Deserialize, Serialize};

const VDF_INPUT_DOMAIN: &[u8] = b"vdf-input-v1";

/// The ordered checkpoint sequence for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub document_id: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub vdf_params: VdfParams,
    checkpoints: Vec<Checkpoint>,
}

impl Chain {
    pub fn new(document_id: impl Into<String>, path: impl Into<String>, vdf_params: VdfParams) -> Self {
        Self {
            document_id: document_id.into(),
            path: path.into(),
            created_at: Utc::now(),
            vdf_params,
            checkpoints: Vec::new(),
        }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn head(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    pub fn head_hash(&self) -> Hash32 {
        self.head().map(|c| c.hash()).unwrap_or(ZERO_HASH)
    }

    /// Append a new checkpoint (spec §4.3 algorithm). `attestor` and
    /// `author_keypair` are both optional: a chain with neither is still
    /// valid, just weaker evidence (reflected later in packet strength).
    pub fn append(
        &mut self,
        content_hash: Hash32,
        content_size: u64,
        message: Option<String>,
        attestor: Option<&dyn HardwareAttestationProvider>,
        author_keypair: Option<&Keypair>,
    ) -> WitnessResult<&Checkpoint> {
        let timer = PerformanceTimer::new("chain_append");
        let ordinal = self.checkpoints.len() as u64;
        let previous_hash = self.head_hash();

        let vdf_input = domain_hash(
            VDF_INPUT_DOMAIN,
            &[&previous_hash, &content_hash, &ordinal.to_be_bytes()],
        );
        let vdf_proof = vdf::compute(vdf_input, self.vdf_params.min_iterations);

        let mut checkpoint = Checkpoint {
            ordinal,
            content_hash,
            content_size,
            timestamp: Utc::now(),
            message,
            previous_hash,
            vdf_proof,
            attestation_binding: None,
            signature: None,
        };

        let checkpoint_hash = checkpoint.hash();

        if let Some(provider) = attestor {
            let previous_counter = self
                .checkpoints
                .last()
                .and_then(|c| c.attestation_binding.as_ref())
                .map(|b| b.attestation.counter);
            let attestation = provider.quote(&checkpoint_hash)?;
            checkpoint.attestation_binding = Some(Binding {
                checkpoint_hash,
                attestation,
                previous_counter,
            });
        }

        if let Some(keypair) = author_keypair {
            checkpoint.signature = Some(keypair.sign(&checkpoint_hash).to_bytes().to_vec());
        }

        self.checkpoints.push(checkpoint);
        let elapsed = timer.finish();
        log::debug!(
            "appended checkpoint {} to chain {} in {}ms",
            ordinal,
            self.document_id,
            elapsed
        );
        Ok(self.checkpoints.last().unwrap())
    }

    /// Verify linkage, ordinal density, VDF proofs and any attestation
    /// bindings, in order, failing on the first broken checkpoint (spec
    /// §4.3 "Verification").
    pub fn verify(&self) -> WitnessResult<()> {
        verify_checkpoints(&self.checkpoints, &self.vdf_params)
    }
}

/// Walk a checkpoint sequence and the VDF parameters it was built under,
/// checking ordinal density, previous-hash linkage, VDF proof validity and
/// attestation-binding monotonicity, failing on the first broken checkpoint
/// (spec §4.3 "Verification"). Free function so [`Chain::verify`] and an
/// exported evidence packet's own re-verification share one implementation.
pub fn verify_checkpoints(checkpoints: &[Checkpoint], vdf_params: &VdfParams) -> WitnessResult<()> {
    let mut previous_hash = ZERO_HASH;
    let mut previous_counter: Option<u64> = None;

    for (i, checkpoint) in checkpoints.iter().enumerate() {
        let index = i as u64;

        if checkpoint.ordinal != index {
            return Err(WitnessError::OrdinalGap {
                index,
                expected: index,
                actual: checkpoint.ordinal,
            });
        }

        if checkpoint.previous_hash != previous_hash {
            return Err(WitnessError::ChainLinkageBroken { index });
        }

        if checkpoint.vdf_proof.iterations < vdf_params.min_iterations || !vdf::verify(&checkpoint.vdf_proof) {
            return Err(WitnessError::VdfProofInvalid { index });
        }

        let checkpoint_hash = checkpoint.hash();

        if let Some(binding) = &checkpoint.attestation_binding {
            if binding.checkpoint_hash != checkpoint_hash || !binding.attestation.binds_checkpoint(&checkpoint_hash) {
                return Err(WitnessError::AttestationBindingInvalid {
                    index,
                    reason: "attestation does not bind this checkpoint's hash".to_string(),
                });
            }
            if !binding.attestation.clock.safe_flag {
                return Err(WitnessError::AttestationBindingInvalid {
                    index,
                    reason: "attestation clock is not marked safe".to_string(),
                });
            }
            if let Some(prev) = previous_counter {
                if binding.attestation.counter <= prev {
                    return Err(WitnessError::CounterRollback {
                        previous: prev,
                        next: binding.attestation.counter,
                    });
                }
            }
            previous_counter = Some(binding.attestation.counter);
        }

        previous_hash = checkpoint_hash;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::SoftwareAttestationSimulator;

    fn small_params() -> VdfParams {
        VdfParams::new(10, 1000)
    }

    #[test]
    fn empty_chain_verifies() {
        let chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        assert!(chain.verify().is_ok());
    }

    #[test]
    fn single_checkpoint_has_zero_previous_hash() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        chain
            .append(crate::hash::sha256(b""), 0, None, None, None)
            .unwrap();
        assert_eq!(chain.checkpoints()[0].previous_hash, ZERO_HASH);
        assert!(chain.verify().is_ok());
    }

    #[test]
    fn appends_are_linked_in_order() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        chain.append(crate::hash::sha256(b"a"), 1, None, None, None).unwrap();
        chain.append(crate::hash::sha256(b"ab"), 2, None, None, None).unwrap();
        chain.append(crate::hash::sha256(b"abc"), 3, None, None, None).unwrap();
        assert!(chain.verify().is_ok());
        assert_eq!(chain.checkpoints()[1].previous_hash, chain.checkpoints()[0].hash());
        assert_eq!(chain.checkpoints()[2].previous_hash, chain.checkpoints()[1].hash());
    }

    #[test]
    fn broken_linkage_is_detected_at_its_index() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        chain.append(crate::hash::sha256(b"a"), 1, None, None, None).unwrap();
        chain.append(crate::hash::sha256(b"ab"), 2, None, None, None).unwrap();
        let mut broken = chain.clone();
        broken.checkpoints[1].previous_hash = ZERO_HASH;
        match broken.verify() {
            Err(WitnessError::ChainLinkageBroken { index }) => assert_eq!(index, 1),
            other => panic!("expected ChainLinkageBroken at index 1, got {:?}", other),
        }
    }

    #[test]
    fn attestation_bound_checkpoints_have_monotone_counters() {
        let sim = SoftwareAttestationSimulator::new([3u8; 32]);
        sim.open().unwrap();
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        chain
            .append(crate::hash::sha256(b"a"), 1, None, Some(&sim), None)
            .unwrap();
        chain
            .append(crate::hash::sha256(b"ab"), 2, None, Some(&sim), None)
            .unwrap();
        assert!(chain.verify().is_ok());
    }

    #[test]
    fn counter_rollback_is_rejected() {
        let sim = SoftwareAttestationSimulator::new([4u8; 32]);
        sim.open().unwrap();
        // Build two checkpoints, then hand-roll the second binding's counter
        // backwards to exercise the rollback check.
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", small_params());
        let first = {
            let c = chain
                .append(crate::hash::sha256(b"a"), 1, None, Some(&sim), None)
                .unwrap();
            c.clone()
        };
        let mut second = first.clone();
        second.ordinal = 1;
        second.previous_hash = first.hash();
        let second_hash = second.hash();
        if let Some(binding) = second.attestation_binding.as_mut() {
            // Re-quote so `attestation.data` binds the *second* checkpoint's
            // hash, then roll the freshly issued counter back below the
            // first checkpoint's, so the rollback check is what fires (not
            // the binding-validity check).
            binding.attestation = sim.quote(&second_hash).unwrap();
            binding.attestation.counter = first
                .attestation_binding
                .as_ref()
                .unwrap()
                .attestation
                .counter
                .saturating_sub(1);
            binding.checkpoint_hash = second_hash;
        }
        chain.checkpoints.push(second);
        match chain.verify() {
            Err(WitnessError::CounterRollback { .. }) => {}
            other => panic!("expected CounterRollback, got {:?}", other),
        }
    }
}
