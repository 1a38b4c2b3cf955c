//! Canonical hashing and timestamp-encoding helpers.
//!
//! Ported from the teacher's `core::utils` hashing helpers. Every hash input
//! in this crate is prefixed with a domain-separation tag per spec design
//! note "Canonical hashing"; every signed timestamp is encoded as
//! nanoseconds-since-epoch, big-endian u64, per design note "Time".

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// 32-byte hash output used throughout the crate.
pub type Hash32 = [u8; 32];

/// All-zero hash, used as the sentinel "no previous" value.
pub const ZERO_HASH: Hash32 = [0u8; 32];

/// Compute SHA-256 of the given bytes.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 of the empty string, `H("")`. Used for empty-content
/// checkpoints (spec §8 scenario 1).
pub fn sha256_empty() -> Hash32 {
    sha256(b"")
}

/// Build a domain-separated hash input: `tag || parts[0] || parts[1] || ...`.
pub fn domain_hash(tag: &[u8], parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Encode a `DateTime<Utc>` as nanoseconds since the Unix epoch, big-endian.
/// Never sign a formatted time string (spec design note "Time").
pub fn encode_timestamp_nanos(ts: DateTime<Utc>) -> [u8; 8] {
    let nanos = ts.timestamp_nanos_opt().unwrap_or(0) as u64;
    nanos.to_be_bytes()
}

/// Big-endian encoding helpers used by every canonical preimage in this crate.
pub fn be_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn be_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn domain_hash_changes_with_tag() {
        let a = domain_hash(b"tag-v1", &[b"data"]);
        let b = domain_hash(b"tag-v2", &[b"data"]);
        assert_ne!(a, b);
    }

    #[test]
    fn timestamp_encoding_is_big_endian_and_stable() {
        let ts = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let encoded = encode_timestamp_nanos(ts);
        let decoded = u64::from_be_bytes(encoded);
        assert_eq!(decoded, ts.timestamp_nanos_opt().unwrap() as u64);
    }
}
