//! Deterministic, thread-safe software attestation simulator.
//!
//! Grounded on the teacher's `MemoryHardVDF`/`ChainStorage` style of an
//! internally-mutexed, deterministic stand-in for hardware, and on the
//! `NullAttestation` dev-mode fallback in
//! `examples/other_examples/...ChainBridge__chainbridge_kernel-src-hal-attestation.rs`.
//! Unlike that null implementation (which fails signature checks on
//! anything but the nonce), this simulator is a fully working attestor used
//! in tests and non-hardware deployments: its counter, clock, and quote
//! signature all behave like a real TPM would, just without platform-state
//! binding unless a selection is supplied.

use super::{
    build_quote_preimage, Attestation, ClockInfo, HardwareAttestationProvider, PlatformSelection,
    ProviderState,
};
use crate::error::{WitnessError, WitnessResult};
use crate::hash::sha256;
use chrono::Utc;
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};
use hmac::{Hmac, Mac, NewMac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

type HmacSha256 = Hmac<Sha256>;

const SEAL_FORMAT_VERSION: u8 = 1;

struct Inner {
    state: ProviderState,
    counter: u64,
    platform_state: BTreeMap<u32, Vec<u8>>,
    started_at: Instant,
}

/// A deterministic, in-process attestation provider. Two simulators built
/// from the same `device_seed` produce the same device id and signing key,
/// which is what makes it useful for reproducible tests.
pub struct SoftwareAttestationSimulator {
    device_seed: [u8; 32],
    keypair: Keypair,
    inner: Mutex<Inner>,
}

impl SoftwareAttestationSimulator {
    /// Build a simulator whose identity is derived entirely from
    /// `device_seed`, so the same seed always yields the same device id,
    /// public key, and seal/unseal keys across process restarts.
    pub fn new(device_seed: [u8; 32]) -> Self {
        let secret_bytes = sha256(&[b"witnessd-sim-signing-key-v1".as_slice(), &device_seed].concat());
        let secret = SecretKey::from_bytes(&secret_bytes).expect("32-byte secret key");
        let public = PublicKey::from(&secret);
        let keypair = Keypair { secret, public };

        Self {
            device_seed,
            keypair,
            inner: Mutex::new(Inner {
                state: ProviderState::Unopened,
                counter: 0,
                platform_state: BTreeMap::new(),
                started_at: Instant::now(),
            }),
        }
    }

    /// Mutate the simulated platform-state register at `index`. Test hook
    /// used to exercise `StateMismatch` on `unseal` (spec §8 scenario 6).
    pub fn set_platform_state(&self, index: u32, value: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.platform_state.insert(index, value);
    }

    fn require_open(&self) -> WitnessResult<std::sync::MutexGuard<'_, Inner>> {
        let guard = self.inner.lock().unwrap();
        if guard.state == ProviderState::Opened {
            Ok(guard)
        } else {
            Err(WitnessError::ProviderNotOpen)
        }
    }

    /// Derive a selection digest over the current platform-state registers
    /// named in `selection`, defaulting absent registers to all-zero.
    fn selection_digest(&self, inner: &Inner, selection: &PlatformSelection) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.device_seed).expect("hmac accepts any key length");
        for index in selection {
            mac.update(&index.to_be_bytes());
            let value = inner
                .platform_state
                .get(index)
                .cloned()
                .unwrap_or_else(|| vec![0u8; 32]);
            mac.update(&value);
        }
        mac.finalize().into_bytes().to_vec()
    }

    fn quote_internal(
        &self,
        data: &[u8],
        selection: Option<&PlatformSelection>,
    ) -> WitnessResult<Attestation> {
        let mut inner = self.require_open()?;
        inner.counter += 1;
        let counter = inner.counter;
        let clock = clock_from(&inner);

        let (pcr, pcr_digest) = match selection {
            Some(sel) if !sel.is_empty() => {
                let mut map = BTreeMap::new();
                for index in sel {
                    map.insert(
                        *index,
                        inner
                            .platform_state
                            .get(index)
                            .cloned()
                            .unwrap_or_else(|| vec![0u8; 32]),
                    );
                }
                let digest = crate::hash::domain_hash(
                    b"witnessd-pcr-digest-v1",
                    &map.values().map(|v| v.as_slice()).collect::<Vec<_>>(),
                );
                (Some(map), Some(digest))
            }
            _ => (None, None),
        };

        let preimage = build_quote_preimage(data, counter, &clock, pcr_digest.as_ref());
        let signature = self.keypair.sign(&preimage).to_bytes().to_vec();

        Ok(Attestation {
            device_id: self.device_id_bytes(),
            attestation_public_key: Some(self.keypair.public.to_bytes().to_vec()),
            counter,
            firmware_version: Some("witnessd-sim/1.0".to_string()),
            clock,
            data: data.to_vec(),
            signature,
            quote: preimage,
            pcr,
            pcr_digest,
            created_at: Utc::now(),
        })
    }

    fn device_id_bytes(&self) -> Vec<u8> {
        sha256(&[b"witnessd-sim-device-id-v1".as_slice(), &self.device_seed].concat()).to_vec()
    }
}

fn clock_from(inner: &Inner) -> ClockInfo {
    ClockInfo {
        clock_ms: inner.started_at.elapsed().as_millis() as u64,
        reset_count: 0,
        restart_count: 0,
        safe_flag: true,
    }
}

impl HardwareAttestationProvider for SoftwareAttestationSimulator {
    fn available(&self) -> bool {
        true
    }

    fn open(&self) -> WitnessResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == ProviderState::Opened {
            return Err(WitnessError::ProviderAlreadyOpen);
        }
        inner.state = ProviderState::Opened;
        Ok(())
    }

    fn close(&self) -> WitnessResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.state = ProviderState::Closed;
        Ok(())
    }

    fn device_id(&self) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        Ok(self.device_id_bytes())
    }

    fn public_key(&self) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        Ok(self.keypair.public.to_bytes().to_vec())
    }

    fn increment_counter(&self) -> WitnessResult<u64> {
        let mut inner = self.require_open()?;
        inner.counter += 1;
        Ok(inner.counter)
    }

    fn get_counter(&self) -> WitnessResult<u64> {
        let inner = self.require_open()?;
        if inner.counter == 0 {
            return Err(WitnessError::CounterNotInitialized);
        }
        Ok(inner.counter)
    }

    fn get_clock(&self) -> WitnessResult<ClockInfo> {
        let inner = self.require_open()?;
        Ok(clock_from(&inner))
    }

    fn quote(&self, data: &[u8]) -> WitnessResult<Attestation> {
        self.quote_internal(data, None)
    }

    fn quote_with_selection(
        &self,
        data: &[u8],
        selection: &PlatformSelection,
    ) -> WitnessResult<Attestation> {
        self.quote_internal(data, Some(selection))
    }

    fn read_state(&self, selection: &PlatformSelection) -> WitnessResult<BTreeMap<u32, Vec<u8>>> {
        let inner = self.require_open()?;
        Ok(selection
            .iter()
            .map(|index| {
                (
                    *index,
                    inner
                        .platform_state
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| vec![0u8; 32]),
                )
            })
            .collect())
    }

    /// Seal `data` to `selection`. Format: `version(1) || digest(32) ||
    /// ciphertext`. The "ciphertext" here is `data` XORed with an
    /// HMAC-derived keystream over the selection digest — adequate for a
    /// simulator whose whole job is to exercise `StateMismatch`, but this is
    /// explicitly NOT a hardware binding (spec §4.2: "A fallback scheme that
    /// derives the sealing key from a stable device identifier is permitted
    /// for simulators but MUST be labelled as non-hardware binding").
    fn seal(&self, data: &[u8], selection: &PlatformSelection) -> WitnessResult<Vec<u8>> {
        let inner = self.require_open()?;
        let digest = self.selection_digest(&inner, selection);
        let keystream = keystream(&digest, data.len());
        let ciphertext: Vec<u8> = data.iter().zip(keystream.iter()).map(|(a, b)| a ^ b).collect();

        let mut blob = Vec::with_capacity(1 + 32 + ciphertext.len());
        blob.push(SEAL_FORMAT_VERSION);
        blob.extend_from_slice(&digest[..32]);
        blob.extend_from_slice(&ciphertext);

        // Remember which selection produced this blob so unseal can
        // recompute the same digest from the *current* state.
        Ok(encode_selection(selection, &blob))
    }

    fn unseal(&self, opaque: &[u8]) -> WitnessResult<Vec<u8>> {
        let inner = self.require_open()?;
        let (selection, blob) = decode_selection(opaque)?;

        if blob.is_empty() || blob[0] != SEAL_FORMAT_VERSION {
            return Err(WitnessError::MalformedEncoding(
                "unsupported seal format version".into(),
            ));
        }
        if blob.len() < 33 {
            return Err(WitnessError::MalformedEncoding("seal blob truncated".into()));
        }

        let stored_digest = &blob[1..33];
        let ciphertext = &blob[33..];

        let current_digest = self.selection_digest(&inner, &selection);
        if stored_digest != &current_digest[..32] {
            return Err(WitnessError::StateMismatch);
        }

        let keystream = keystream(&current_digest, ciphertext.len());
        Ok(ciphertext
            .iter()
            .zip(keystream.iter())
            .map(|(a, b)| a ^ b)
            .collect())
    }

    fn manufacturer(&self) -> &str {
        "witnessd-software-simulator"
    }

    fn firmware_version(&self) -> Option<String> {
        Some("witnessd-sim/1.0".to_string())
    }
}

/// Expand a digest into a keystream of the requested length via counter-mode
/// hashing, matching the teacher's habit of deriving arbitrary-length
/// material from a fixed-size hash (`core::utils::generate_proof_nonce`).
fn keystream(seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter: u32 = 0;
    while out.len() < len {
        let block = sha256(&[seed, &counter.to_be_bytes()].concat());
        out.extend_from_slice(&block);
        counter += 1;
    }
    out.truncate(len);
    out
}

fn encode_selection(selection: &PlatformSelection, blob: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + selection.len() * 4 + blob.len());
    out.extend_from_slice(&(selection.len() as u32).to_be_bytes());
    for index in selection {
        out.extend_from_slice(&index.to_be_bytes());
    }
    out.extend_from_slice(blob);
    out
}

fn decode_selection(opaque: &[u8]) -> WitnessResult<(PlatformSelection, Vec<u8>)> {
    if opaque.len() < 4 {
        return Err(WitnessError::MalformedEncoding("seal blob too short".into()));
    }
    let count = u32::from_be_bytes(opaque[0..4].try_into().unwrap()) as usize;
    let mut cursor = 4;
    let mut selection = Vec::with_capacity(count);
    for _ in 0..count {
        if opaque.len() < cursor + 4 {
            return Err(WitnessError::MalformedEncoding(
                "seal blob selection truncated".into(),
            ));
        }
        selection.push(u32::from_be_bytes(opaque[cursor..cursor + 4].try_into().unwrap()));
        cursor += 4;
    }
    Ok((selection, opaque[cursor..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened_simulator() -> SoftwareAttestationSimulator {
        let sim = SoftwareAttestationSimulator::new([9u8; 32]);
        sim.open().unwrap();
        sim
    }

    #[test]
    fn same_seed_yields_same_identity() {
        let a = SoftwareAttestationSimulator::new([1u8; 32]);
        let b = SoftwareAttestationSimulator::new([1u8; 32]);
        a.open().unwrap();
        b.open().unwrap();
        assert_eq!(a.device_id().unwrap(), b.device_id().unwrap());
        assert_eq!(a.public_key().unwrap(), b.public_key().unwrap());
    }

    #[test]
    fn open_twice_fails() {
        let sim = opened_simulator();
        assert!(sim.open().is_err());
    }

    #[test]
    fn calls_before_open_fail_not_open() {
        let sim = SoftwareAttestationSimulator::new([2u8; 32]);
        assert!(matches!(sim.device_id(), Err(WitnessError::ProviderNotOpen)));
    }

    #[test]
    fn counter_is_strictly_increasing_across_quotes() {
        let sim = opened_simulator();
        let a = sim.quote(b"checkpoint-a").unwrap();
        let b = sim.quote(b"checkpoint-b").unwrap();
        let c = sim.quote(b"checkpoint-c").unwrap();
        assert!(a.counter < b.counter);
        assert!(b.counter < c.counter);
    }

    #[test]
    fn get_counter_before_any_quote_is_not_initialized() {
        let sim = opened_simulator();
        assert!(matches!(
            sim.get_counter(),
            Err(WitnessError::CounterNotInitialized)
        ));
    }

    #[test]
    fn quote_signature_is_verifiable() {
        let sim = opened_simulator();
        let attestation = sim.quote(b"hello").unwrap();
        let public = PublicKey::from_bytes(attestation.attestation_public_key.as_ref().unwrap())
            .unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&attestation.signature).unwrap();
        use ed25519_dalek::Verifier;
        assert!(public.verify(&attestation.quote, &signature).is_ok());
    }

    #[test]
    fn seal_roundtrip_succeeds_when_state_matches() {
        let sim = opened_simulator();
        let selection = vec![0, 4, 7];
        let sealed = sim.seal(b"secret payload", &selection).unwrap();
        let recovered = sim.unseal(&sealed).unwrap();
        assert_eq!(recovered, b"secret payload");
    }

    #[test]
    fn seal_fails_with_state_mismatch_after_mutation() {
        let sim = opened_simulator();
        let selection = vec![0, 4, 7];
        let sealed = sim.seal(&[0x01u8; 4], &selection).unwrap();

        sim.set_platform_state(7, vec![0xFFu8; 32]);

        assert!(matches!(sim.unseal(&sealed), Err(WitnessError::StateMismatch)));
    }

    #[test]
    fn clock_is_always_safe_and_never_decreases() {
        let sim = opened_simulator();
        let first = sim.get_clock().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = sim.get_clock().unwrap();
        assert!(first.safe_flag && second.safe_flag);
        assert!(second.clock_ms >= first.clock_ms);
    }
}
