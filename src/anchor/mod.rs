//! External timestamp-anchor registry (C6): a uniform contract over
//! third-party providers (blockchain anchors, timestamp authorities) that
//! can attest "this hash existed before some external time".
//!
//! Grounded on the teacher's `rayon`-driven fan-out over independent units
//! of work (there: chunk hashing across a proof window; here: provider
//! calls across a registry) and its "collect what succeeded, log what
//! didn't" error handling in `HashChainError`/`add_commitment`.

use crate::error::{WitnessError, WitnessResult};
use crate::hash::Hash32;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainAnchor {
    pub chain: String,
    pub block_height: u64,
    pub block_hash: String,
    pub block_time: DateTime<Utc>,
    pub tx_id: String,
}

/// One provider's proof that `hash` existed at or before `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub provider: String,
    pub hash: Hash32,
    pub status: ProofStatus,
    pub body: Vec<u8>,
    pub verification_url: Option<String>,
    pub blockchain_anchor: Option<BlockchainAnchor>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid,
    Invalid(String),
    Unknown,
}

/// A third-party timestamp-anchor provider (spec §4.5). The concrete
/// network client is an external collaborator; this trait is the contract
/// the core is driven through.
pub trait AnchorProvider: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn legal_standing(&self) -> &str;
    fn jurisdictions(&self) -> &[String];
    fn requires_credentials(&self) -> bool;
    fn is_free(&self) -> bool;

    fn timestamp(&self, hash: Hash32, deadline: Instant) -> WitnessResult<Proof>;
    fn upgrade(&self, proof: Proof, deadline: Instant) -> WitnessResult<Proof>;
    fn verify(&self, proof: &Proof) -> WitnessResult<VerifyResult>;
}

/// A name-indexed collection of registered providers plus a separately
/// tracked "enabled" subset (spec §4.5).
#[derive(Default)]
pub struct AnchorRegistry {
    providers: HashMap<String, Box<dyn AnchorProvider>>,
    enabled: HashSet<String>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn AnchorProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn enable(&mut self, name: &str) -> WitnessResult<()> {
        if !self.providers.contains_key(name) {
            return Err(WitnessError::AnchorProviderUnknown(name.to_string()));
        }
        self.enabled.insert(name.to_string());
        Ok(())
    }

    pub fn disable(&mut self, name: &str) {
        self.enabled.remove(name);
    }

    pub fn enabled_providers(&self) -> Vec<&str> {
        self.enabled.iter().map(|s| s.as_str()).collect()
    }

    pub fn free_providers(&self) -> Vec<&str> {
        self.providers
            .values()
            .filter(|p| p.is_free())
            .map(|p| p.name())
            .collect()
    }

    /// Fan out `timestamp` to every enabled provider. Per spec §4.5,
    /// provider failures are collected (logged) but never fail the batch —
    /// only successful proofs are returned. Every call respects `deadline`;
    /// once it passes, providers that have not yet been dispatched are
    /// skipped rather than started.
    pub fn timestamp(&self, hash: Hash32, deadline: Instant) -> Vec<Proof> {
        let enabled: Vec<&Box<dyn AnchorProvider>> = self
            .enabled
            .iter()
            .filter_map(|name| self.providers.get(name))
            .collect();

        enabled
            .par_iter()
            .filter_map(|provider| {
                if Instant::now() >= deadline {
                    log::warn!(
                        "anchor deadline already passed, skipping provider '{}'",
                        provider.name()
                    );
                    return None;
                }
                match provider.timestamp(hash, deadline) {
                    Ok(proof) => Some(proof),
                    Err(err) => {
                        log::warn!("anchor provider '{}' failed: {}", provider.name(), err);
                        None
                    }
                }
            })
            .collect()
    }

    /// Attempt to lift every pending proof to confirmed, in place, dropping
    /// (with a log) any that fail rather than aborting the batch.
    pub fn upgrade(&self, proofs: Vec<Proof>, deadline: Instant) -> Vec<Proof> {
        proofs
            .into_par_iter()
            .map(|proof| {
                if proof.status != ProofStatus::Pending {
                    return proof;
                }
                let Some(provider) = self.providers.get(&proof.provider) else {
                    return proof;
                };
                if Instant::now() >= deadline {
                    return proof;
                }
                match provider.upgrade(proof.clone(), deadline) {
                    Ok(upgraded) => upgraded,
                    Err(err) => {
                        log::warn!("anchor upgrade for '{}' failed: {}", proof.provider, err);
                        proof
                    }
                }
            })
            .collect()
    }

    pub fn verify(&self, proof: &Proof) -> WitnessResult<VerifyResult> {
        match self.providers.get(&proof.provider) {
            Some(provider) => provider.verify(proof),
            None => Err(WitnessError::AnchorProviderUnknown(proof.provider.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct AlwaysSucceeds {
        free: bool,
    }

    impl AnchorProvider for AlwaysSucceeds {
        fn name(&self) -> &str {
            "always-succeeds"
        }
        fn display_name(&self) -> &str {
            "Always Succeeds"
        }
        fn legal_standing(&self) -> &str {
            "none"
        }
        fn jurisdictions(&self) -> &[String] {
            &[]
        }
        fn requires_credentials(&self) -> bool {
            false
        }
        fn is_free(&self) -> bool {
            self.free
        }
        fn timestamp(&self, hash: Hash32, _deadline: Instant) -> WitnessResult<Proof> {
            Ok(Proof {
                provider: self.name().to_string(),
                hash,
                status: ProofStatus::Pending,
                body: vec![1, 2, 3],
                verification_url: None,
                blockchain_anchor: None,
                timestamp: Utc::now(),
            })
        }
        fn upgrade(&self, mut proof: Proof, _deadline: Instant) -> WitnessResult<Proof> {
            proof.status = ProofStatus::Confirmed;
            Ok(proof)
        }
        fn verify(&self, _proof: &Proof) -> WitnessResult<VerifyResult> {
            Ok(VerifyResult::Valid)
        }
    }

    struct AlwaysFails;

    impl AnchorProvider for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }
        fn display_name(&self) -> &str {
            "Always Fails"
        }
        fn legal_standing(&self) -> &str {
            "none"
        }
        fn jurisdictions(&self) -> &[String] {
            &[]
        }
        fn requires_credentials(&self) -> bool {
            true
        }
        fn is_free(&self) -> bool {
            false
        }
        fn timestamp(&self, _hash: Hash32, _deadline: Instant) -> WitnessResult<Proof> {
            Err(WitnessError::AnchorProviderFailure {
                provider: self.name().to_string(),
                reason: "network unreachable".to_string(),
            })
        }
        fn upgrade(&self, _proof: Proof, _deadline: Instant) -> WitnessResult<Proof> {
            Err(WitnessError::AnchorProviderFailure {
                provider: self.name().to_string(),
                reason: "network unreachable".to_string(),
            })
        }
        fn verify(&self, _proof: &Proof) -> WitnessResult<VerifyResult> {
            Ok(VerifyResult::Unknown)
        }
    }

    #[test]
    fn enabling_unknown_provider_fails() {
        let mut registry = AnchorRegistry::new();
        assert!(registry.enable("nope").is_err());
    }

    #[test]
    fn timestamp_fans_out_and_drops_failures() {
        let mut registry = AnchorRegistry::new();
        registry.register(Box::new(AlwaysSucceeds { free: true }));
        registry.register(Box::new(AlwaysFails));
        registry.enable("always-succeeds").unwrap();
        registry.enable("always-fails").unwrap();

        let proofs = registry.timestamp([7u8; 32], Instant::now() + Duration::from_secs(1));
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].provider, "always-succeeds");
    }

    #[test]
    fn free_providers_lists_only_free_ones() {
        let mut registry = AnchorRegistry::new();
        registry.register(Box::new(AlwaysSucceeds { free: true }));
        registry.register(Box::new(AlwaysFails));
        assert_eq!(registry.free_providers(), vec!["always-succeeds"]);
    }

    #[test]
    fn upgrade_lifts_pending_to_confirmed() {
        let mut registry = AnchorRegistry::new();
        registry.register(Box::new(AlwaysSucceeds { free: true }));
        registry.enable("always-succeeds").unwrap();

        let proofs = registry.timestamp([1u8; 32], Instant::now() + Duration::from_secs(1));
        let upgraded = registry.upgrade(proofs, Instant::now() + Duration::from_secs(1));
        assert_eq!(upgraded[0].status, ProofStatus::Confirmed);
    }

    #[test]
    fn expired_deadline_skips_undispatched_providers() {
        let mut registry = AnchorRegistry::new();
        registry.register(Box::new(AlwaysSucceeds { free: true }));
        registry.enable("always-succeeds").unwrap();

        let already_passed = Instant::now() - Duration::from_secs(1);
        let proofs = registry.timestamp([1u8; 32], already_passed);
        assert!(proofs.is_empty());
    }

    #[test]
    fn verify_routes_to_the_named_provider() {
        let mut registry = AnchorRegistry::new();
        registry.register(Box::new(AlwaysSucceeds { free: true }));
        let proof = Proof {
            provider: "always-succeeds".to_string(),
            hash: [0u8; 32],
            status: ProofStatus::Confirmed,
            body: vec![],
            verification_url: None,
            blockchain_anchor: None,
            timestamp: Utc::now(),
        };
        assert_eq!(registry.verify(&proof).unwrap(), VerifyResult::Valid);
    }
}
