//! A single committed content state (spec §3 "Checkpoint").

use crate::attestation::Binding;
use crate::hash::{domain_hash, encode_timestamp_nanos, Hash32};
use crate::vdf::VdfProof;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CHECKPOINT_DOMAIN: &[u8] = b"checkpoint-v1";

/// A committed, hash-linked snapshot of a document state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub ordinal: u64,
    pub content_hash: Hash32,
    pub content_size: u64,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    pub previous_hash: Hash32,
    pub vdf_proof: VdfProof,
    pub attestation_binding: Option<Binding>,
    /// Ed25519 signature over `hash()`, if the chain has an author key.
    pub signature: Option<Vec<u8>>,
}

impl Checkpoint {
    /// Canonical checkpoint hash per spec §3:
    /// `H("checkpoint-v1" || previous_hash || content_hash || ordinal_BE ||
    ///    content_size_BE || timestamp_nanos_BE || message || vdf_output)`.
    pub fn hash(&self) -> Hash32 {
        domain_hash(
            CHECKPOINT_DOMAIN,
            &[
                &self.previous_hash,
                &self.content_hash,
                &self.ordinal.to_be_bytes(),
                &self.content_size.to_be_bytes(),
                &encode_timestamp_nanos(self.timestamp),
                self.message.as_deref().unwrap_or("").as_bytes(),
                &self.vdf_proof.output,
            ],
        )
    }

    /// The preimage signed/quoted for this checkpoint's attestation binding
    /// and author signature: the checkpoint hash itself, at least 32 bytes
    /// as spec §3 ("Attestation" invariant) requires.
    pub fn binding_preimage(&self) -> Hash32 {
        self.hash()
    }
}
