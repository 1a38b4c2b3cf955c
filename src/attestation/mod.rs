//! Hardware-attestation provider abstraction (C2).
//!
//! Grounded on `examples/other_examples/...ChainBridge__chainbridge_kernel-src-hal-attestation.rs`
//! (a `HardwareAttestation` capability trait with a `NullAttestation` dev
//! fallback) and the teacher's tagged-variant style of wrapping
//! platform-specific work behind a small, uniform surface. Per spec design
//! note "Polymorphism", this is modeled as a capability trait plus a
//! tagged-variant registry (`AttestationHandle`), not a class hierarchy.

pub mod simulator;

pub use simulator::SoftwareAttestationSimulator;

use crate::error::{WitnessError, WitnessResult};
use crate::hash::Hash32;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque platform-state selection: indices into whatever the provider's
/// platform-state registers are (TPM PCRs, Secure Enclave measurements, ...).
pub type PlatformSelection = Vec<u32>;

/// Safe-clock reading. `safe_flag` is true iff the provider has not observed
/// the underlying clock move backwards since it was opened (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockInfo {
    pub clock_ms: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe_flag: bool,
}

/// A provider-signed attestation over arbitrary caller-supplied data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub device_id: Vec<u8>,
    pub attestation_public_key: Option<Vec<u8>>,
    pub counter: u64,
    pub firmware_version: Option<String>,
    pub clock: ClockInfo,
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
    pub quote: Vec<u8>,
    pub pcr: Option<BTreeMap<u32, Vec<u8>>>,
    pub pcr_digest: Option<Hash32>,
    pub created_at: DateTime<Utc>,
}

impl Attestation {
    /// Spec §3 invariant: `data[0..32] == bound_checkpoint_hash`.
    pub fn binds_checkpoint(&self, checkpoint_hash: &Hash32) -> bool {
        self.data.len() >= 32 && &self.data[..32] == checkpoint_hash
    }
}

/// Pairs a checkpoint hash to the attestation over it and the counter value
/// the *previous* attestation from the same provider carried, so a chain of
/// bindings can be checked for monotonicity without re-querying the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub checkpoint_hash: Hash32,
    pub attestation: Attestation,
    pub previous_counter: Option<u64>,
}

impl Binding {
    /// Spec §3 invariant: per attestor, counter strictly increases across
    /// successive attestations.
    pub fn counter_is_monotone(&self) -> bool {
        match self.previous_counter {
            Some(previous) => self.attestation.counter > previous,
            None => true,
        }
    }
}

/// The provider state machine: `Unopened -> Opened -> Closed` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Unopened,
    Opened,
    Closed,
}

/// Capability interface every attestation provider implements.
///
/// Implementations MUST serialize calls under an internal mutex (spec §5:
/// "provider methods are serialized under an internal mutex; callers may
/// invoke from multiple tasks").
pub trait HardwareAttestationProvider: Send + Sync {
    fn available(&self) -> bool;
    fn open(&self) -> WitnessResult<()>;
    fn close(&self) -> WitnessResult<()>;
    fn device_id(&self) -> WitnessResult<Vec<u8>>;
    fn public_key(&self) -> WitnessResult<Vec<u8>>;
    fn increment_counter(&self) -> WitnessResult<u64>;
    fn get_counter(&self) -> WitnessResult<u64>;
    fn get_clock(&self) -> WitnessResult<ClockInfo>;
    fn quote(&self, data: &[u8]) -> WitnessResult<Attestation>;
    fn quote_with_selection(
        &self,
        data: &[u8],
        selection: &PlatformSelection,
    ) -> WitnessResult<Attestation>;
    fn read_state(&self, selection: &PlatformSelection) -> WitnessResult<BTreeMap<u32, Vec<u8>>>;
    fn seal(&self, data: &[u8], selection: &PlatformSelection) -> WitnessResult<Vec<u8>>;
    fn unseal(&self, opaque: &[u8]) -> WitnessResult<Vec<u8>>;
    fn manufacturer(&self) -> &str;
    fn firmware_version(&self) -> Option<String>;
}

/// The "unavailable" variant: always safe to call, fails every operation
/// with a well-defined error (spec §4.2; design note: "A 'none' variant MUST
/// exist and always be safe to call").
pub struct UnavailableProvider;

impl HardwareAttestationProvider for UnavailableProvider {
    fn available(&self) -> bool {
        false
    }
    fn open(&self) -> WitnessResult<()> {
        Err(WitnessError::ProviderFailure(
            "no attestation hardware available".into(),
        ))
    }
    fn close(&self) -> WitnessResult<()> {
        Ok(())
    }
    fn device_id(&self) -> WitnessResult<Vec<u8>> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn public_key(&self) -> WitnessResult<Vec<u8>> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn increment_counter(&self) -> WitnessResult<u64> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn get_counter(&self) -> WitnessResult<u64> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn get_clock(&self) -> WitnessResult<ClockInfo> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn quote(&self, _data: &[u8]) -> WitnessResult<Attestation> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn quote_with_selection(
        &self,
        _data: &[u8],
        _selection: &PlatformSelection,
    ) -> WitnessResult<Attestation> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn read_state(&self, _selection: &PlatformSelection) -> WitnessResult<BTreeMap<u32, Vec<u8>>> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn seal(&self, _data: &[u8], _selection: &PlatformSelection) -> WitnessResult<Vec<u8>> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn unseal(&self, _opaque: &[u8]) -> WitnessResult<Vec<u8>> {
        Err(WitnessError::ProviderFailure("provider unavailable".into()))
    }
    fn manufacturer(&self) -> &str {
        "none"
    }
    fn firmware_version(&self) -> Option<String> {
        None
    }
}

/// Bridge to a platform-specific attestor (TPM 2.0 / Secure Enclave). The
/// concrete transport is an external collaborator (spec §1 "Out of scope");
/// this crate only defines the contract it is driven through.
pub trait HardwareTransport: Send + Sync {
    fn device_id(&self) -> WitnessResult<Vec<u8>>;
    fn manufacturer(&self) -> &str;
    fn firmware_version(&self) -> Option<String>;
    fn public_key(&self) -> WitnessResult<Vec<u8>>;
    fn increment_counter(&self) -> WitnessResult<u64>;
    fn get_counter(&self) -> WitnessResult<u64>;
    fn get_clock(&self) -> WitnessResult<ClockInfo>;
    fn sign(&self, message: &[u8]) -> WitnessResult<Vec<u8>>;
    fn read_state(&self, selection: &PlatformSelection) -> WitnessResult<BTreeMap<u32, Vec<u8>>>;
    fn seal(&self, data: &[u8], selection: &PlatformSelection) -> WitnessResult<Vec<u8>>;
    fn unseal(&self, opaque: &[u8]) -> WitnessResult<Vec<u8>>;
}

/// Attestation provider backed by a real platform transport.
pub struct HardwareAttestationHandle<T: HardwareTransport> {
    transport: T,
    state: std::sync::Mutex<ProviderState>,
}

impl<T: HardwareTransport> HardwareAttestationHandle<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: std::sync::Mutex::new(ProviderState::Unopened),
        }
    }

    fn require_open(&self) -> WitnessResult<()> {
        let state = self.state.lock().unwrap();
        if *state == ProviderState::Opened {
            Ok(())
        } else {
            Err(WitnessError::ProviderNotOpen)
        }
    }

    fn quote_signed(
        &self,
        data: &[u8],
        selection: Option<&PlatformSelection>,
    ) -> WitnessResult<Attestation> {
        self.require_open()?;
        let counter = self.transport.increment_counter()?;
        let clock = self.transport.get_clock()?;
        if !clock.safe_flag {
            return Err(WitnessError::ProviderFailure(
                "clock is not in a safe state".into(),
            ));
        }

        let (pcr, pcr_digest) = match selection {
            Some(sel) if !sel.is_empty() => {
                let state = self.transport.read_state(sel)?;
                let digest = crate::hash::domain_hash(
                    b"witnessd-pcr-digest-v1",
                    &state.values().map(|v| v.as_slice()).collect::<Vec<_>>(),
                );
                (Some(state), Some(digest))
            }
            _ => (None, None),
        };

        let preimage = build_quote_preimage(data, counter, &clock, pcr_digest.as_ref());
        let signature = self.transport.sign(&preimage)?;

        Ok(Attestation {
            device_id: self.transport.device_id()?,
            attestation_public_key: self.transport.public_key().ok(),
            counter,
            firmware_version: self.transport.firmware_version(),
            clock,
            data: data.to_vec(),
            signature,
            quote: preimage,
            pcr,
            pcr_digest,
            created_at: Utc::now(),
        })
    }
}

impl<T: HardwareTransport> HardwareAttestationProvider for HardwareAttestationHandle<T> {
    fn available(&self) -> bool {
        true
    }

    fn open(&self) -> WitnessResult<()> {
        let mut state = self.state.lock().unwrap();
        if *state == ProviderState::Opened {
            return Err(WitnessError::ProviderAlreadyOpen);
        }
        *state = ProviderState::Opened;
        Ok(())
    }

    fn close(&self) -> WitnessResult<()> {
        let mut state = self.state.lock().unwrap();
        *state = ProviderState::Closed;
        Ok(())
    }

    fn device_id(&self) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        self.transport.device_id()
    }

    fn public_key(&self) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        self.transport.public_key()
    }

    fn increment_counter(&self) -> WitnessResult<u64> {
        self.require_open()?;
        self.transport.increment_counter()
    }

    fn get_counter(&self) -> WitnessResult<u64> {
        self.require_open()?;
        self.transport.get_counter()
    }

    fn get_clock(&self) -> WitnessResult<ClockInfo> {
        self.require_open()?;
        self.transport.get_clock()
    }

    fn quote(&self, data: &[u8]) -> WitnessResult<Attestation> {
        self.quote_signed(data, None)
    }

    fn quote_with_selection(
        &self,
        data: &[u8],
        selection: &PlatformSelection,
    ) -> WitnessResult<Attestation> {
        self.quote_signed(data, Some(selection))
    }

    fn read_state(&self, selection: &PlatformSelection) -> WitnessResult<BTreeMap<u32, Vec<u8>>> {
        self.require_open()?;
        self.transport.read_state(selection)
    }

    fn seal(&self, data: &[u8], selection: &PlatformSelection) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        self.transport.seal(data, selection)
    }

    fn unseal(&self, opaque: &[u8]) -> WitnessResult<Vec<u8>> {
        self.require_open()?;
        self.transport.unseal(opaque)
    }

    fn manufacturer(&self) -> &str {
        self.transport.manufacturer()
    }

    fn firmware_version(&self) -> Option<String> {
        self.transport.firmware_version()
    }
}

/// Build the quote preimage per spec §4.2: `H(domain || data || counter_BE
/// || clock_BE [|| pcr_digest])`.
pub(crate) fn build_quote_preimage(
    data: &[u8],
    counter: u64,
    clock: &ClockInfo,
    pcr_digest: Option<&Hash32>,
) -> Vec<u8> {
    let mut clock_bytes = Vec::with_capacity(17);
    clock_bytes.extend_from_slice(&clock.clock_ms.to_be_bytes());
    clock_bytes.extend_from_slice(&clock.reset_count.to_be_bytes());
    clock_bytes.extend_from_slice(&clock.restart_count.to_be_bytes());
    clock_bytes.push(clock.safe_flag as u8);

    let mut parts: Vec<&[u8]> = vec![data, &counter.to_be_bytes(), &clock_bytes];
    if let Some(digest) = pcr_digest {
        parts.push(digest);
    }
    crate::hash::domain_hash(b"witnessd-quote-v1", &parts).to_vec()
}

/// Tagged-variant registry entry point: always one of hardware, software
/// simulator, or unavailable. Calling code holds a `Box<dyn
/// HardwareAttestationProvider>` produced by one of these constructors.
pub enum AttestationHandle {
    Hardware(Box<dyn HardwareAttestationProvider>),
    Software(SoftwareAttestationSimulator),
    Unavailable(UnavailableProvider),
}

impl AttestationHandle {
    pub fn as_provider(&self) -> &dyn HardwareAttestationProvider {
        match self {
            AttestationHandle::Hardware(p) => p.as_ref(),
            AttestationHandle::Software(p) => p,
            AttestationHandle::Unavailable(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_provider_fails_every_call() {
        let provider = UnavailableProvider;
        assert!(!provider.available());
        assert!(provider.open().is_err());
        assert!(provider.device_id().is_err());
        assert!(provider.quote(b"data").is_err());
        // close() is always safe, even on the unavailable variant.
        assert!(provider.close().is_ok());
    }
}
