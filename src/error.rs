//! Crate-wide error type.
//!
//! Mirrors the teacher's `core::errors::HashChainError`: one variant per
//! failure shape, grouped here by the six error kinds of the evidence-stack
//! design (validation, signature, chain, invariant, provider, schema).

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Error, Debug)]
pub enum WitnessError {
    // ---- Validation -------------------------------------------------
    #[error("invalid length for {field}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("modality percentages sum to {sum:.2}, outside the [95, 105] tolerance")]
    ModalityPercentageOutOfRange { sum: f64 },

    #[error("percentage {0} out of range [0, 100]")]
    PercentageOutOfRange(f64),

    #[error("empty collection where at least one element is required: {0}")]
    EmptyCollection(&'static str),

    #[error("zero hash not permitted for {0}")]
    ZeroHash(&'static str),

    // ---- Signature ----------------------------------------------------
    #[error("signature verification failed for {0}")]
    SignatureInvalid(&'static str),

    #[error("invalid key size for {field}: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    // ---- Chain ----------------------------------------------------
    #[error("checkpoint {index}: previous-hash linkage broken")]
    ChainLinkageBroken { index: u64 },

    #[error("checkpoint {index}: ordinal gap, expected {expected}, got {actual}")]
    OrdinalGap {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("checkpoint {index}: VDF proof failed to verify")]
    VdfProofInvalid { index: u64 },

    #[error("checkpoint {index}: attestation binding failed to verify: {reason}")]
    AttestationBindingInvalid { index: u64, reason: String },

    #[error("duplicate append: chain already has a checkpoint at ordinal {0}")]
    DuplicateAppend(u64),

    #[error("counter rollback detected: {previous} >= {next}")]
    CounterRollback { previous: u64, next: u64 },

    #[error("non-contiguous ordinal sequence on load")]
    NonContiguousSequence,

    // ---- Invariant (integrity enforcer) ----------------------------
    #[error("monotonic time decreased: previous {previous}ms, observed {observed}ms")]
    TimeWentBackwards { previous: u64, observed: u64 },

    #[error("hash chain forked: previous head {expected} does not match observed {actual}")]
    ChainForked { expected: String, actual: String },

    #[error("external anchor timestamp {anchor_ms} precedes local event time {local_ms}")]
    AnchorPrecedesLocalEvent { anchor_ms: u64, local_ms: u64 },

    #[error("capture environment declaration fingerprint changed mid-session")]
    CedFingerprintChanged,

    #[error("key lifecycle inconsistent: {reason}")]
    KeyLifecycleInconsistent { reason: String },

    // ---- Provider (attestation / anchor transport) -----------------
    #[error("attestation provider is not open")]
    ProviderNotOpen,

    #[error("attestation provider is already open")]
    ProviderAlreadyOpen,

    #[error("attestation provider has not minted a monotonic counter yet")]
    CounterNotInitialized,

    #[error("platform state selection does not match sealed state")]
    StateMismatch,

    #[error("attestation provider call failed: {0}")]
    ProviderFailure(String),

    #[error("external anchor provider '{provider}' failed: {reason}")]
    AnchorProviderFailure { provider: String, reason: String },

    #[error("external anchor provider '{0}' is not registered")]
    AnchorProviderUnknown(String),

    // ---- Schema ----------------------------------------------------
    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(u32),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    // ---- Build aggregation ------------------------------------------
    #[error("build failed with {} error(s): {}", .0.len(), join_errors(.0))]
    Aggregated(Vec<WitnessError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[WitnessError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the crate.
pub type WitnessResult<T> = std::result::Result<T, WitnessError>;

/// Accumulates errors across a multi-step builder, matching spec's
/// "builders carry accumulated errors" design note.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<WitnessError>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: WitnessError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Finish the accumulation: `Ok(())` if no errors were recorded,
    /// otherwise a single `WitnessError::Aggregated`.
    pub fn finish(self) -> WitnessResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(WitnessError::Aggregated(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_passes_through_when_empty() {
        let acc = ErrorAccumulator::new();
        assert!(acc.finish().is_ok());
    }

    #[test]
    fn accumulator_aggregates_multiple_errors() {
        let mut acc = ErrorAccumulator::new();
        acc.push(WitnessError::MissingField("title"));
        acc.push(WitnessError::PercentageOutOfRange(150.0));
        let err = acc.finish().unwrap_err();
        match err {
            WitnessError::Aggregated(errs) => assert_eq!(errs.len(), 2),
            _ => panic!("expected aggregated error"),
        }
    }
}
