//! Presence / keystroke / behavioral / contextual adapters (C5).
//!
//! These are data-carrying types the core accepts verbatim, after a schema
//! self-check, as optional packet layers (spec §2 "C5"). Capture of the
//! underlying signal (a UI challenge, a keystroke-timing hook, a browser
//! extension) is an external collaborator (spec §1 "Out of scope"); this
//! module defines only what the core consumes from each.
//!
//! Grounded on the reference `declaration::DeclarationJitter` shape
//! (`examples/other_examples/...witnessd...war.rs.rs`: timing samples plus
//! a derived digest) and the teacher's plain schema-validated struct style.

use crate::error::{WitnessError, WitnessResult};
use crate::hash::{domain_hash, Hash32};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A presence challenge-response: proof a human acknowledged a prompt at a
/// specific time, independent of any particular challenge UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub challenge_id: String,
    pub responded_at: DateTime<Utc>,
    pub response_latency_ms: u64,
}

impl PresenceRecord {
    pub fn self_check(&self) -> WitnessResult<()> {
        if self.challenge_id.trim().is_empty() {
            return Err(WitnessError::MissingField("challenge_id"));
        }
        Ok(())
    }
}

/// Aggregated keystroke-jitter statistics, plus a commitment to the raw
/// sample set without including the samples themselves (which could encode
/// content). Mirrors the reference implementation's
/// `DeclarationJitter::from_samples` split between digest and summary stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystrokeRecord {
    pub sample_count: u32,
    pub mean_interval_ms: f64,
    pub stddev_interval_ms: f64,
    pub samples_digest: Hash32,
    pub suspiciously_uniform: bool,
}

impl KeystrokeRecord {
    const DOMAIN: &'static [u8] = b"witnessd-keystroke-digest-v1";

    /// Derive the commitment digest for a raw interval sample set (caller
    /// computes mean/stddev themselves; this module never sees content).
    pub fn digest_samples(samples_ms: &[u32]) -> Hash32 {
        let owned: Vec<[u8; 4]> = samples_ms.iter().map(|s| s.to_be_bytes()).collect();
        let borrowed: Vec<&[u8]> = owned.iter().map(|b| b.as_slice()).collect();
        domain_hash(Self::DOMAIN, &borrowed)
    }

    pub fn self_check(&self) -> WitnessResult<()> {
        if self.sample_count == 0 {
            return Err(WitnessError::EmptyCollection("keystroke samples"));
        }
        Ok(())
    }
}

/// A single behavioral-telemetry observation (e.g. pause/resume pattern,
/// window-focus changes) the core treats as opaque, schema-checked data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralEvent {
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralRecord {
    pub events: Vec<BehavioralEvent>,
}

impl BehavioralRecord {
    pub fn self_check(&self) -> WitnessResult<()> {
        if self.events.is_empty() {
            return Err(WitnessError::EmptyCollection("behavioral events"));
        }
        for event in &self.events {
            if event.event_type.trim().is_empty() {
                return Err(WitnessError::MissingField("event_type"));
            }
        }
        Ok(())
    }
}

/// Free-form capture-session context (editor name/version, OS, locale, ...).
/// Schema-validated but otherwise opaque to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRecord {
    pub fields: std::collections::BTreeMap<String, String>,
}

/// A provenance note about prior, external handling of the content (e.g.
/// "imported from document X, chain hash Y"). Optional, additive (spec §9
/// open question: provenance/key-hierarchy are additive and capped below
/// `Maximum`; see [`SPEC_FULL.md`] §11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub source_description: String,
    pub source_chain_hash: Option<Hash32>,
    pub recorded_at: DateTime<Utc>,
}

/// One link in an author's key-rotation history: an old key signing a
/// statement vouching for the new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyHierarchyLink {
    pub previous_public_key: Vec<u8>,
    pub new_public_key: Vec<u8>,
    pub rotated_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl KeyHierarchyLink {
    const DOMAIN: &'static [u8] = b"witnessd-key-rotation-v1";

    fn payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(Self::DOMAIN);
        buf.extend_from_slice(&self.previous_public_key);
        buf.extend_from_slice(&self.new_public_key);
        buf.extend_from_slice(&crate::hash::encode_timestamp_nanos(self.rotated_at));
        buf
    }

    /// Verify the rotation signature under the *previous* key — the old key
    /// vouches for the new one.
    pub fn verify(&self) -> bool {
        use ed25519_dalek::{PublicKey, Signature, Verifier};
        let public_key = match PublicKey::from_bytes(&self.previous_public_key) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let signature = match Signature::from_bytes(&self.signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        public_key.verify(&self.payload(), &signature).is_ok()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyHierarchy {
    pub links: Vec<KeyHierarchyLink>,
}

impl KeyHierarchy {
    pub fn verify(&self) -> WitnessResult<()> {
        for (i, link) in self.links.iter().enumerate() {
            if !link.verify() {
                return Err(WitnessError::SignatureInvalid("key_hierarchy"));
            }
            if i > 0 && self.links[i - 1].new_public_key != link.previous_public_key {
                return Err(WitnessError::KeyLifecycleInconsistent {
                    reason: format!("key hierarchy link {} does not chain from link {}", i, i - 1),
                });
            }
        }
        Ok(())
    }
}
