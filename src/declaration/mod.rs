//! Signed Process Declaration (C4): an author-signed attestation of how a
//! document was produced, bound to a document-hash and chain-head.
//!
//! Grounded on the reference `declaration` module's `Declaration::sign`/
//! builder shape (`examples/other_examples/...witnessd...war.rs.rs` calls
//! `declaration::no_ai_declaration(...).sign(&signing_key)`), and on the
//! teacher's accumulated-error builder idiom used throughout `chain`.

use crate::error::{ErrorAccumulator, WitnessError, WitnessResult};
use crate::hash::{encode_timestamp_nanos, Hash32, ZERO_HASH};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};

const DECLARATION_DOMAIN: &[u8] = b"witnessd-declaration-v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalityType {
    Keyboard,
    Dictation,
    Handwriting,
    Paste,
    Import,
    Mixed,
    Other,
}

impl ModalityType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Keyboard => "keyboard",
            Self::Dictation => "dictation",
            Self::Handwriting => "handwriting",
            Self::Paste => "paste",
            Self::Import => "import",
            Self::Mixed => "mixed",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiToolExtent {
    None,
    Minimal,
    Moderate,
    Substantial,
}

impl AiToolExtent {
    fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Substantial => "substantial",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityShare {
    #[serde(rename = "type")]
    pub modality_type: ModalityType,
    pub percentage: f64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiToolUsage {
    pub tool: String,
    pub version: String,
    pub purpose: String,
    pub interaction_note: String,
    pub extent: AiToolExtent,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub name: String,
    pub role: String,
    pub sections: Vec<String>,
    pub public_key: Option<Vec<u8>>,
}

/// An author-signed attestation of process, bound to one document and one
/// chain head. Immutable once signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub document_hash: Hash32,
    pub chain_hash: Hash32,
    pub title: String,
    pub modalities: Vec<ModalityShare>,
    pub ai_tools: Vec<AiToolUsage>,
    pub collaborators: Vec<Collaborator>,
    pub statement: String,
    pub created_at: DateTime<Utc>,
    pub schema_version: u32,
    pub author_public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Declaration {
    /// The canonical signing preimage, exactly per the §4.4 formula. Every
    /// field that could be tampered with is included; nothing is formatted
    /// as a display string except the free-form note/statement text itself.
    pub fn canonical_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(DECLARATION_DOMAIN);
        buf.extend_from_slice(&self.document_hash);
        buf.extend_from_slice(&self.chain_hash);
        buf.extend_from_slice(self.title.as_bytes());

        buf.extend_from_slice(&(self.modalities.len() as u64).to_be_bytes());
        for m in &self.modalities {
            buf.extend_from_slice(m.modality_type.as_str().as_bytes());
            buf.extend_from_slice(&((m.percentage * 1000.0).round() as u64).to_be_bytes());
            buf.extend_from_slice(m.note.as_bytes());
        }

        buf.extend_from_slice(&(self.ai_tools.len() as u64).to_be_bytes());
        for a in &self.ai_tools {
            buf.extend_from_slice(a.tool.as_bytes());
            buf.extend_from_slice(a.version.as_bytes());
            buf.extend_from_slice(a.purpose.as_bytes());
            buf.extend_from_slice(a.interaction_note.as_bytes());
            buf.extend_from_slice(a.extent.as_str().as_bytes());
            buf.extend_from_slice(&(a.sections.len() as u64).to_be_bytes());
            for section in &a.sections {
                buf.extend_from_slice(section.as_bytes());
            }
        }

        buf.extend_from_slice(&(self.collaborators.len() as u64).to_be_bytes());
        for c in &self.collaborators {
            buf.extend_from_slice(c.name.as_bytes());
            buf.extend_from_slice(c.role.as_bytes());
            buf.extend_from_slice(&(c.sections.len() as u64).to_be_bytes());
            for section in &c.sections {
                buf.extend_from_slice(section.as_bytes());
            }
            if let Some(key) = &c.public_key {
                buf.extend_from_slice(key);
            }
        }

        buf.extend_from_slice(self.statement.as_bytes());
        buf.extend_from_slice(&encode_timestamp_nanos(self.created_at));
        buf.extend_from_slice(&(self.schema_version as u64).to_be_bytes());
        buf.extend_from_slice(&self.author_public_key);
        buf
    }

    /// Verify the signature over the recomputed canonical payload. Wrong key
    /// or signature *sizes* return `false` rather than an error, per §4.4.
    pub fn verify(&self) -> bool {
        let public_key = match PublicKey::from_bytes(&self.author_public_key) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let signature = match Signature::from_bytes(&self.signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        public_key.verify(&self.canonical_payload(), &signature).is_ok()
    }
}

/// Builds a [`Declaration`], accumulating validation errors until `sign`.
pub struct DeclarationBuilder {
    document_hash: Hash32,
    chain_hash: Hash32,
    title: String,
    modalities: Vec<ModalityShare>,
    ai_tools: Vec<AiToolUsage>,
    collaborators: Vec<Collaborator>,
    statement: String,
    schema_version: u32,
    errors: ErrorAccumulator,
}

impl DeclarationBuilder {
    pub fn new(document_hash: Hash32, chain_hash: Hash32, title: impl Into<String>) -> Self {
        Self {
            document_hash,
            chain_hash,
            title: title.into(),
            modalities: Vec::new(),
            ai_tools: Vec::new(),
            collaborators: Vec::new(),
            statement: String::new(),
            schema_version: crate::config::DECLARATION_SCHEMA_VERSION,
            errors: ErrorAccumulator::new(),
        }
    }

    pub fn add_modality(mut self, modality_type: ModalityType, percentage: f64, note: impl Into<String>) -> Self {
        if !(0.0..=100.0).contains(&percentage) {
            self.errors.push(WitnessError::PercentageOutOfRange(percentage));
        }
        self.modalities.push(ModalityShare {
            modality_type,
            percentage,
            note: note.into(),
        });
        self
    }

    pub fn add_ai_tool(mut self, usage: AiToolUsage) -> Self {
        self.ai_tools.push(usage);
        self
    }

    pub fn add_collaborator(mut self, collaborator: Collaborator) -> Self {
        self.collaborators.push(collaborator);
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = statement.into();
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Validate and sign, consuming the builder. On any validation failure
    /// returns a single `WitnessError::Aggregated` listing every reason.
    pub fn sign(mut self, author_keypair: &Keypair) -> WitnessResult<Declaration> {
        if self.document_hash == ZERO_HASH {
            self.errors.push(WitnessError::ZeroHash("document_hash"));
        }
        if self.chain_hash == ZERO_HASH {
            self.errors.push(WitnessError::ZeroHash("chain_hash"));
        }
        if self.title.trim().is_empty() {
            self.errors.push(WitnessError::MissingField("title"));
        }
        if self.statement.trim().is_empty() {
            self.errors.push(WitnessError::MissingField("statement"));
        }
        if self.modalities.is_empty() {
            self.errors.push(WitnessError::EmptyCollection("modalities"));
        }

        let sum: f64 = self.modalities.iter().map(|m| m.percentage).sum();
        if !self.modalities.is_empty() && !(95.0..=105.0).contains(&sum) {
            self.errors.push(WitnessError::ModalityPercentageOutOfRange { sum });
        }

        self.errors.finish()?;

        let mut declaration = Declaration {
            document_hash: self.document_hash,
            chain_hash: self.chain_hash,
            title: self.title,
            modalities: self.modalities,
            ai_tools: self.ai_tools,
            collaborators: self.collaborators,
            statement: self.statement,
            created_at: Utc::now(),
            schema_version: self.schema_version,
            author_public_key: author_keypair.public.to_bytes().to_vec(),
            signature: Vec::new(),
        };

        let payload = declaration.canonical_payload();
        declaration.signature = author_keypair.sign(&payload).to_bytes().to_vec();
        Ok(declaration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn keypair() -> Keypair {
        Keypair::generate(&mut OsRng)
    }

    fn sample_builder() -> DeclarationBuilder {
        DeclarationBuilder::new([1u8; 32], [2u8; 32], "My Essay")
            .add_modality(ModalityType::Keyboard, 100.0, "")
            .with_statement("I wrote this by hand")
    }

    #[test]
    fn minimal_declaration_signs_successfully() {
        let decl = sample_builder().sign(&keypair()).unwrap();
        assert!(decl.verify());
    }

    #[test]
    fn modality_sum_within_tolerance_passes() {
        let decl = DeclarationBuilder::new([1u8; 32], [2u8; 32], "t")
            .add_modality(ModalityType::Keyboard, 97.0, "")
            .with_statement("s")
            .sign(&keypair())
            .unwrap();
        assert!(decl.verify());
    }

    #[test]
    fn modality_sum_out_of_tolerance_fails() {
        let result = DeclarationBuilder::new([1u8; 32], [2u8; 32], "t")
            .add_modality(ModalityType::Keyboard, 50.0, "")
            .add_modality(ModalityType::Paste, 20.0, "")
            .with_statement("s")
            .sign(&keypair());
        match result {
            Err(WitnessError::Aggregated(errors)) => {
                let joined = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" ");
                assert!(joined.contains("95") || joined.contains("105"));
            }
            other => panic!("expected aggregated validation error, got {:?}", other),
        }
    }

    #[test]
    fn zero_document_hash_is_rejected() {
        let result = DeclarationBuilder::new(ZERO_HASH, [2u8; 32], "t")
            .add_modality(ModalityType::Keyboard, 100.0, "")
            .with_statement("s")
            .sign(&keypair());
        assert!(result.is_err());
    }

    #[test]
    fn tampering_any_payload_byte_breaks_verification() {
        let mut decl = sample_builder().sign(&keypair()).unwrap();
        decl.title.push('!');
        assert!(!decl.verify());
    }

    #[test]
    fn tampering_signature_breaks_verification() {
        let mut decl = sample_builder().sign(&keypair()).unwrap();
        decl.signature[0] ^= 0xFF;
        assert!(!decl.verify());
    }

    #[test]
    fn round_trip_through_json_preserves_signing_payload() {
        let decl = sample_builder().sign(&keypair()).unwrap();
        let json = serde_json::to_string(&decl).unwrap();
        let reloaded: Declaration = serde_json::from_str(&json).unwrap();
        assert_eq!(decl.canonical_payload(), reloaded.canonical_payload());
        assert!(reloaded.verify());
    }
}
