//! Persisted chain layout (spec §6 "Persisted state layout"): a manifest
//! plus an ordinal-ordered sequence of checkpoints. Grounded on the
//! teacher's `ChainStorage::{write_hashchain_header, load_hashchain_header}`
//! pair, minus the memory-mapped chunk machinery this spec has no use for.

use super::{Chain, Checkpoint};
use crate::error::{WitnessError, WitnessResult};
use crate::vdf::VdfParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The manifest half of a persisted chain: everything except the
/// checkpoints themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainManifest {
    pub document_id: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub vdf_params: VdfParams,
}

/// The full on-disk representation: manifest plus checkpoints in ordinal
/// order, serialized separately from each other as the teacher splits
/// header from commitment log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedChain {
    pub manifest: ChainManifest,
    pub checkpoints: Vec<Checkpoint>,
}

impl PersistedChain {
    pub fn from_chain(chain: &Chain) -> Self {
        Self {
            manifest: ChainManifest {
                document_id: chain.document_id.clone(),
                path: chain.path.clone(),
                created_at: chain.created_at,
                vdf_params: chain.vdf_params,
            },
            checkpoints: chain.checkpoints().to_vec(),
        }
    }

    pub fn to_json(&self) -> WitnessResult<String> {
        serde_json::to_string(self).map_err(|e| WitnessError::MalformedEncoding(e.to_string()))
    }

    pub fn from_json(data: &str) -> WitnessResult<Self> {
        let persisted: Self =
            serde_json::from_str(data).map_err(|e| WitnessError::MalformedEncoding(e.to_string()))?;
        persisted.validate_contiguous()?;
        Ok(persisted)
    }

    /// Reject corrupted or non-contiguous ordinal sequences on load (spec
    /// §6): ordinals must run `0, 1, 2, ...` with no gaps or duplicates.
    fn validate_contiguous(&self) -> WitnessResult<()> {
        for (i, checkpoint) in self.checkpoints.iter().enumerate() {
            if checkpoint.ordinal != i as u64 {
                return Err(WitnessError::NonContiguousSequence);
            }
        }
        Ok(())
    }

    /// Reconstitute a [`Chain`] from its persisted form. Linkage and VDF
    /// validity are not re-checked here — call [`Chain::verify`] after
    /// loading if the caller needs that guarantee.
    pub fn into_chain(self) -> Chain {
        Chain {
            document_id: self.manifest.document_id,
            path: self.manifest.path,
            created_at: self.manifest.created_at,
            vdf_params: self.manifest.vdf_params,
            checkpoints: self.checkpoints,
        }
    }
}
