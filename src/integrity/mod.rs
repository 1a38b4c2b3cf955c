//! Integrity enforcer (C8): a runtime invariant monitor bound to a signed
//! Capture Environment Declaration (CED), classifying evidence into
//! reliability classes A/B/C/D/X (spec §4.7).
//!
//! Grounded on the teacher's `consensus` module's running-verifier shape (an
//! accumulating checker fed observations one at a time, rather than a single
//! pure function over a whole history) and the crate-wide error variants
//! already carrying the structured context this module's invariants need
//! (`TimeWentBackwards`, `ChainForked`, `AnchorPrecedesLocalEvent`,
//! `CedFingerprintChanged`, `KeyLifecycleInconsistent`).

use crate::error::{WitnessError, WitnessResult};
use crate::hash::{domain_hash, Hash32};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

const CED_FINGERPRINT_DOMAIN: &[u8] = b"witnessd-ced-fingerprint-v1";
const CED_SIGNING_DOMAIN: &[u8] = b"witnessd-ced-signature-v1";

/// A snapshot of observable platform properties taken at session start (spec
/// §4.7): OS, kernel, secure-boot and virtualization flags, process
/// UID/EUID, the running executable's hash, and explicit negatives of
/// things checked for and found absent (e.g. "no debugger attached").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedEnvironment {
    pub os: String,
    pub kernel: String,
    pub secure_boot: bool,
    pub virtualization: Option<String>,
    pub uid: u32,
    pub euid: u32,
    pub executable_hash: Hash32,
    pub checked_absent: Vec<String>,
}

impl CapturedEnvironment {
    /// A deterministic digest of every field, used to detect mid-session
    /// drift (spec §4.7 "CED fingerprint constant during session").
    pub fn fingerprint(&self) -> Hash32 {
        let mut checked_absent_bytes = Vec::new();
        for item in &self.checked_absent {
            checked_absent_bytes.extend_from_slice(item.as_bytes());
            checked_absent_bytes.push(0);
        }
        domain_hash(
            CED_FINGERPRINT_DOMAIN,
            &[
                self.os.as_bytes(),
                self.kernel.as_bytes(),
                &[self.secure_boot as u8],
                self.virtualization.as_deref().unwrap_or("").as_bytes(),
                &self.uid.to_be_bytes(),
                &self.euid.to_be_bytes(),
                &self.executable_hash,
                &checked_absent_bytes,
            ],
        )
    }
}

/// A signed Capture Environment Declaration: an environment snapshot plus
/// who vouches for it and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedEnvironmentDeclaration {
    pub environment: CapturedEnvironment,
    pub created_at: DateTime<Utc>,
    pub signer_public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CapturedEnvironmentDeclaration {
    fn payload(environment: &CapturedEnvironment, created_at: DateTime<Utc>) -> Hash32 {
        domain_hash(
            CED_SIGNING_DOMAIN,
            &[&environment.fingerprint(), &crate::hash::encode_timestamp_nanos(created_at)],
        )
    }

    pub fn sign(environment: CapturedEnvironment, signer: &Keypair) -> Self {
        let created_at = Utc::now();
        let payload = Self::payload(&environment, created_at);
        let signature = signer.sign(&payload).to_bytes().to_vec();
        Self {
            environment,
            created_at,
            signer_public_key: signer.public.to_bytes().to_vec(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        let public_key = match PublicKey::from_bytes(&self.signer_public_key) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let signature = match Signature::from_bytes(&self.signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        let payload = Self::payload(&self.environment, self.created_at);
        public_key.verify(&payload, &signature).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    A,
    B,
    C,
    D,
    X,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: String,
    pub detail: String,
    pub class: Class,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub class: Class,
    pub reason: String,
    pub violations: Vec<Violation>,
    pub warnings: Vec<String>,
    pub suitability: String,
}

/// Accumulates runtime invariant observations for one capture session and
/// produces a final [`Classification`] (spec §4.7's classification table).
pub struct IntegrityEnforcer {
    ced: CapturedEnvironmentDeclaration,
    ced_fingerprint_at_start: Hash32,
    last_time_ms: Option<u64>,
    last_chain_head: Option<Hash32>,
    violations: Vec<Violation>,
    warnings: Vec<String>,
    verification_failed: bool,
}

impl IntegrityEnforcer {
    pub fn new(ced: CapturedEnvironmentDeclaration) -> WitnessResult<Self> {
        if !ced.verify() {
            return Err(WitnessError::SignatureInvalid("capture_environment_declaration"));
        }
        let ced_fingerprint_at_start = ced.environment.fingerprint();
        Ok(Self {
            ced,
            ced_fingerprint_at_start,
            last_time_ms: None,
            last_chain_head: None,
            violations: Vec::new(),
            warnings: Vec::new(),
            verification_failed: false,
        })
    }

    pub fn ced(&self) -> &CapturedEnvironmentDeclaration {
        &self.ced
    }

    fn record(&mut self, class: Class, invariant: &str, detail: String) {
        self.violations.push(Violation {
            invariant: invariant.to_string(),
            detail,
            class,
        });
    }

    /// Monotonic time never decreases (spec §4.7: class D on violation).
    pub fn observe_time(&mut self, now_ms: u64) -> WitnessResult<()> {
        if let Some(previous) = self.last_time_ms {
            if now_ms < previous {
                let err = WitnessError::TimeWentBackwards { previous, observed: now_ms };
                self.record(Class::D, "monotonic_time", err.to_string());
                return Err(err);
            }
        }
        self.last_time_ms = Some(now_ms);
        Ok(())
    }

    /// Hash chain never forks: the previous-hash a caller reports for a new
    /// head must match the last head this enforcer observed (class D).
    pub fn observe_chain_head(&mut self, previous_hash: Hash32, new_head: Hash32) -> WitnessResult<()> {
        if let Some(expected) = self.last_chain_head {
            if previous_hash != expected {
                let err = WitnessError::ChainForked {
                    expected: hex::encode(expected),
                    actual: hex::encode(previous_hash),
                };
                self.record(Class::D, "chain_fork", err.to_string());
                return Err(err);
            }
        }
        self.last_chain_head = Some(new_head);
        Ok(())
    }

    /// External-anchor timestamp must not precede the local event it anchors
    /// (spec §4.7: class C).
    pub fn observe_external_anchor(
        &mut self,
        anchor_time: DateTime<Utc>,
        local_event_time: DateTime<Utc>,
    ) -> WitnessResult<()> {
        if anchor_time < local_event_time {
            let err = WitnessError::AnchorPrecedesLocalEvent {
                anchor_ms: anchor_time.timestamp_millis().max(0) as u64,
                local_ms: local_event_time.timestamp_millis().max(0) as u64,
            };
            self.record(Class::C, "external_anchor_ordering", err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// CED fingerprint must stay constant for the life of the session (spec
    /// §4.7: class C).
    pub fn observe_ced_fingerprint(&mut self, current: &CapturedEnvironment) -> WitnessResult<()> {
        if current.fingerprint() != self.ced_fingerprint_at_start {
            let err = WitnessError::CedFingerprintChanged;
            self.record(Class::C, "ced_fingerprint", err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Key lifecycle must be internally consistent: `first_use >=
    /// generated_at`, `last_use >= first_use`, `destroyed_at >= last_use`
    /// (spec §4.7: class D).
    pub fn observe_key_lifecycle(
        &mut self,
        generated_at: DateTime<Utc>,
        first_use: DateTime<Utc>,
        last_use: DateTime<Utc>,
        destroyed_at: Option<DateTime<Utc>>,
    ) -> WitnessResult<()> {
        let mut reasons = Vec::new();
        if first_use < generated_at {
            reasons.push("first use precedes key generation".to_string());
        }
        if last_use < first_use {
            reasons.push("last use precedes first use".to_string());
        }
        if let Some(destroyed) = destroyed_at {
            if destroyed < last_use {
                reasons.push("key destroyed before its last recorded use".to_string());
            }
        }
        if !reasons.is_empty() {
            let err = WitnessError::KeyLifecycleInconsistent { reason: reasons.join("; ") };
            self.record(Class::D, "key_lifecycle", err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Record a non-fatal observation (class B if nothing worse is present).
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Caller informs the enforcer that `Packet::verify` failed; this forces
    /// class X regardless of any other observation (spec §4.7).
    pub fn mark_verification_failed(&mut self) {
        self.verification_failed = true;
    }

    pub fn classify(&self) -> Classification {
        if self.verification_failed {
            return Classification {
                class: Class::X,
                reason: "packet failed cryptographic verification".to_string(),
                violations: self.violations.clone(),
                warnings: self.warnings.clone(),
                suitability: "Not suitable for any reliance; treat as unverified.".to_string(),
            };
        }

        match self.violations.iter().map(|v| v.class).max() {
            Some(Class::D) => Classification {
                class: Class::D,
                reason: "one or more runtime invariants were violated".to_string(),
                violations: self.violations.clone(),
                warnings: self.warnings.clone(),
                suitability: "Not suitable for reliance.".to_string(),
            },
            Some(Class::C) => Classification {
                class: Class::C,
                reason: "one or more suspicious conditions were observed".to_string(),
                violations: self.violations.clone(),
                warnings: self.warnings.clone(),
                suitability: "Suitable only with independent corroboration.".to_string(),
            },
            _ if !self.warnings.is_empty() => Classification {
                class: Class::B,
                reason: "session completed with warnings but no invariant violations".to_string(),
                violations: Vec::new(),
                warnings: self.warnings.clone(),
                suitability: "Suitable for most purposes; review warnings first.".to_string(),
            },
            _ => Classification {
                class: Class::A,
                reason: "no invariant violations or warnings observed".to_string(),
                violations: Vec::new(),
                warnings: Vec::new(),
                suitability: "Suitable for full reliance within the evidence packet's stated claims.".to_string(),
            },
        }
    }
}
