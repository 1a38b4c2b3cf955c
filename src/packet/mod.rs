//! Evidence Packet assembler/verifier (C7): aggregates C1-C6 into a single
//! tiered, self-contained, verifiable document (spec §4.6).
//!
//! Grounded on the teacher's `ChainStorage`/`HashChainHeader` split (an
//! internal working type plus a serializable export wrapper) and its
//! accumulated-error `add_commitment`-style builder. The packet *clones*
//! chain data at export (spec §3 "Ownership"), matching the teacher's
//! `PhysicalAccessCommitment::clone()` snapshot-on-export pattern.

pub mod record;

use crate::anchor::{BlockchainAnchor, Proof, ProofStatus};
use crate::attestation::{Attestation, Binding, ClockInfo, HardwareAttestationProvider};
use crate::chain::{verify_checkpoints, Chain, Checkpoint};
use crate::declaration::Declaration;
use crate::error::{ErrorAccumulator, WitnessError, WitnessResult};
use crate::hash::Hash32;
use crate::layers::{BehavioralRecord, ContextRecord, KeyHierarchy, KeystrokeRecord, PresenceRecord, ProvenanceRecord};
use crate::vdf::VdfParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const PACKET_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Basic,
    Standard,
    Enhanced,
    Maximum,
    /// Decodable per spec §6 for forward compatibility with packets exported
    /// by a future tier scheme this build doesn't recognize. Never produced
    /// by [`PacketBuilder`] — placed last so it never silently outranks a
    /// real tier in `raise`/`raise_capped`'s `Ord`-based comparisons.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Cryptographic,
    Attestation,
    Statistical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub description: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    pub path: String,
    pub final_hash: String,
    pub final_size: u64,
}

fn hex_to_hash32(field: &'static str, s: &str) -> WitnessResult<Hash32> {
    let bytes = hex::decode(s).map_err(|e| WitnessError::MalformedEncoding(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| WitnessError::InvalidLength { field, expected: 32, actual: s.len() / 2 })
}

fn hex_to_bytes(field: &'static str, s: &str) -> WitnessResult<Vec<u8>> {
    hex::decode(s).map_err(|e| WitnessError::MalformedEncoding(format!("{field}: {e}")))
}

/// Hex-armored mirror of [`Attestation`] for the exported packet format
/// (spec §6 "all binary fields are hex-encoded"). The platform-state map is
/// dropped on export — only its digest travels, which is all verification
/// needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationProof {
    pub device_id: String,
    pub attestation_public_key: Option<String>,
    pub counter: u64,
    pub firmware_version: Option<String>,
    pub clock_ms: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe_flag: bool,
    pub data: String,
    pub signature: String,
    pub quote: String,
    pub pcr_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttestationProof {
    fn from_attestation(a: &Attestation) -> Self {
        Self {
            device_id: hex::encode(&a.device_id),
            attestation_public_key: a.attestation_public_key.as_ref().map(hex::encode),
            counter: a.counter,
            firmware_version: a.firmware_version.clone(),
            clock_ms: a.clock.clock_ms,
            reset_count: a.clock.reset_count,
            restart_count: a.clock.restart_count,
            safe_flag: a.clock.safe_flag,
            data: hex::encode(&a.data),
            signature: hex::encode(&a.signature),
            quote: hex::encode(&a.quote),
            pcr_digest: a.pcr_digest.as_ref().map(hex::encode),
            created_at: a.created_at,
        }
    }

    fn to_attestation(&self) -> WitnessResult<Attestation> {
        Ok(Attestation {
            device_id: hex_to_bytes("attestation.device_id", &self.device_id)?,
            attestation_public_key: self
                .attestation_public_key
                .as_deref()
                .map(|s| hex_to_bytes("attestation.attestation_public_key", s))
                .transpose()?,
            counter: self.counter,
            firmware_version: self.firmware_version.clone(),
            clock: ClockInfo {
                clock_ms: self.clock_ms,
                reset_count: self.reset_count,
                restart_count: self.restart_count,
                safe_flag: self.safe_flag,
            },
            data: hex_to_bytes("attestation.data", &self.data)?,
            signature: hex_to_bytes("attestation.signature", &self.signature)?,
            quote: hex_to_bytes("attestation.quote", &self.quote)?,
            pcr: None,
            pcr_digest: self
                .pcr_digest
                .as_deref()
                .map(|s| hex_to_hash32("attestation.pcr_digest", s))
                .transpose()?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingProof {
    pub checkpoint_hash: String,
    pub attestation: AttestationProof,
    pub previous_counter: Option<u64>,
}

/// Hex-armored, self-contained checkpoint record (spec §3 "list of
/// checkpoint-proofs (hex-encoded fields)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointProof {
    pub ordinal: u64,
    pub content_hash: String,
    pub content_size: u64,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    pub previous_hash: String,
    pub vdf_input: String,
    pub vdf_output: String,
    pub vdf_iterations: u64,
    pub vdf_wall_clock_ms: u64,
    pub attestation_binding: Option<BindingProof>,
    pub signature: Option<String>,
}

impl CheckpointProof {
    pub fn from_checkpoint(c: &Checkpoint) -> Self {
        Self {
            ordinal: c.ordinal,
            content_hash: hex::encode(c.content_hash),
            content_size: c.content_size,
            timestamp: c.timestamp,
            message: c.message.clone(),
            previous_hash: hex::encode(c.previous_hash),
            vdf_input: hex::encode(c.vdf_proof.input),
            vdf_output: hex::encode(c.vdf_proof.output),
            vdf_iterations: c.vdf_proof.iterations,
            vdf_wall_clock_ms: c.vdf_proof.wall_clock.as_millis() as u64,
            attestation_binding: c.attestation_binding.as_ref().map(|b| BindingProof {
                checkpoint_hash: hex::encode(b.checkpoint_hash),
                attestation: AttestationProof::from_attestation(&b.attestation),
                previous_counter: b.previous_counter,
            }),
            signature: c.signature.as_ref().map(hex::encode),
        }
    }

    pub fn to_checkpoint(&self) -> WitnessResult<Checkpoint> {
        Ok(Checkpoint {
            ordinal: self.ordinal,
            content_hash: hex_to_hash32("checkpoint.content_hash", &self.content_hash)?,
            content_size: self.content_size,
            timestamp: self.timestamp,
            message: self.message.clone(),
            previous_hash: hex_to_hash32("checkpoint.previous_hash", &self.previous_hash)?,
            vdf_proof: crate::vdf::VdfProof {
                input: hex_to_hash32("checkpoint.vdf_input", &self.vdf_input)?,
                output: hex_to_hash32("checkpoint.vdf_output", &self.vdf_output)?,
                iterations: self.vdf_iterations,
                wall_clock: std::time::Duration::from_millis(self.vdf_wall_clock_ms),
            },
            attestation_binding: self
                .attestation_binding
                .as_ref()
                .map(|b| -> WitnessResult<Binding> {
                    Ok(Binding {
                        checkpoint_hash: hex_to_hash32("binding.checkpoint_hash", &b.checkpoint_hash)?,
                        attestation: b.attestation.to_attestation()?,
                        previous_counter: b.previous_counter,
                    })
                })
                .transpose()?,
            signature: self
                .signature
                .as_deref()
                .map(|s| hex_to_bytes("checkpoint.signature", s))
                .transpose()?,
        })
    }
}

/// Hardware-attestation summary surfaced at the packet's top level (the
/// per-checkpoint bindings already carry the cryptographic detail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSummary {
    pub manufacturer: String,
    pub firmware_version: Option<String>,
    pub device_id: String,
    pub bound_checkpoints: u64,
}

/// Hex/base64-armored mirror of [`Proof`] for the exported packet format
/// (spec §6: binary fields are hex-encoded except anchor raw-proof bodies,
/// which are base64-encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRecord {
    pub provider: String,
    pub hash: String,
    pub status: ProofStatus,
    pub body: String,
    pub verification_url: Option<String>,
    pub blockchain_anchor: Option<BlockchainAnchor>,
    pub timestamp: DateTime<Utc>,
}

impl ProofRecord {
    fn from_proof(p: &Proof) -> Self {
        Self {
            provider: p.provider.clone(),
            hash: hex::encode(p.hash),
            status: p.status,
            body: base64::encode(&p.body),
            verification_url: p.verification_url.clone(),
            blockchain_anchor: p.blockchain_anchor.clone(),
            timestamp: p.timestamp,
        }
    }

    fn to_proof(&self) -> WitnessResult<Proof> {
        Ok(Proof {
            provider: self.provider.clone(),
            hash: hex_to_hash32("proof.hash", &self.hash)?,
            status: self.status,
            body: base64::decode(&self.body)
                .map_err(|e| WitnessError::MalformedEncoding(format!("proof.body: {e}")))?,
            verification_url: self.verification_url.clone(),
            blockchain_anchor: self.blockchain_anchor.clone(),
            timestamp: self.timestamp,
        })
    }
}

/// Unified external-anchor section. Decoding also accepts the legacy
/// two-list layout and folds it in without cross-mapping (spec §9 open
/// question; decision recorded in `SPEC_FULL.md` §11).
#[derive(Debug, Clone)]
pub struct ExternalAnchors {
    pub proofs: Vec<Proof>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ExternalAnchorsWire {
    Unified { proofs: Vec<ProofRecord> },
    Legacy { timestamps: Vec<ProofRecord>, blockchain_anchors: Vec<ProofRecord> },
}

impl Serialize for ExternalAnchors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proofs = self.proofs.iter().map(ProofRecord::from_proof).collect();
        ExternalAnchorsWire::Unified { proofs }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExternalAnchors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ExternalAnchorsWire::deserialize(deserializer)?;
        let records = match wire {
            ExternalAnchorsWire::Unified { proofs } => proofs,
            ExternalAnchorsWire::Legacy { mut timestamps, blockchain_anchors } => {
                timestamps.extend(blockchain_anchors);
                timestamps
            }
        };
        let proofs = records
            .iter()
            .map(ProofRecord::to_proof)
            .collect::<WitnessResult<_>>()
            .map_err(|e| serde::de::Error::custom(e.to_string()))?;
        Ok(ExternalAnchors { proofs })
    }
}

/// The exported, self-contained evidence packet (spec §3 "Evidence Packet").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub strength: Strength,
    pub document: DocumentInfo,
    pub checkpoints: Vec<CheckpointProof>,
    pub vdf_params: VdfParams,
    pub chain_hash: String,
    pub declaration: Declaration,
    pub claims: Vec<Claim>,
    pub limitations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub presence: Option<PresenceRecord>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hardware: Option<HardwareSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keystroke: Option<KeystrokeRecord>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub behavioral: Option<BehavioralRecord>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contexts: Option<ContextRecord>,
    #[serde(rename = "external", skip_serializing_if = "Option::is_none", default)]
    pub external: Option<ExternalAnchors>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key_hierarchy: Option<KeyHierarchy>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub provenance: Option<ProvenanceRecord>,
}

impl Packet {
    /// Walk checkpoints for linkage/VDF validity, verify the declaration
    /// signature, and verify any key-hierarchy chain. Read-only: never
    /// mutates `self`. Returns the first position-indexed failure (spec
    /// §4.6 "Verification").
    pub fn verify(&self, vdf_params: &VdfParams) -> WitnessResult<()> {
        if self.version != PACKET_VERSION {
            return Err(WitnessError::UnsupportedSchemaVersion(self.version));
        }

        let checkpoints: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .map(CheckpointProof::to_checkpoint)
            .collect::<WitnessResult<_>>()?;
        verify_checkpoints(&checkpoints, vdf_params)?;

        if !self.declaration.verify() {
            return Err(WitnessError::SignatureInvalid("declaration"));
        }

        if let Some(hierarchy) = &self.key_hierarchy {
            hierarchy.verify()?;
        }

        Ok(())
    }

    pub fn encode(&self) -> WitnessResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| WitnessError::MalformedEncoding(e.to_string()))
    }

    pub fn decode(data: &str) -> WitnessResult<Self> {
        let packet: Packet =
            serde_json::from_str(data).map_err(|e| WitnessError::MalformedEncoding(e.to_string()))?;
        if packet.version != PACKET_VERSION {
            return Err(WitnessError::UnsupportedSchemaVersion(packet.version));
        }
        Ok(packet)
    }
}

/// Builds a [`Packet`] from a chain and its optional evidence layers (spec
/// §4.6). Strength rises monotonically to the floor of the highest tier any
/// included layer implies.
pub struct PacketBuilder {
    title: String,
    document_path: String,
    checkpoints: Vec<Checkpoint>,
    vdf_params: VdfParams,
    chain_hash: Hash32,
    declaration: Option<Declaration>,
    presence: Option<PresenceRecord>,
    hardware: Option<HardwareSummary>,
    keystroke: Option<KeystrokeRecord>,
    behavioral: Option<BehavioralRecord>,
    contexts: Option<ContextRecord>,
    external: Option<ExternalAnchors>,
    key_hierarchy: Option<KeyHierarchy>,
    provenance: Option<ProvenanceRecord>,
    errors: ErrorAccumulator,
    strength: Strength,
}

impl PacketBuilder {
    pub fn new(chain: &Chain, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            document_path: chain.path.clone(),
            checkpoints: chain.checkpoints().to_vec(),
            vdf_params: chain.vdf_params,
            chain_hash: chain.head_hash(),
            declaration: None,
            presence: None,
            hardware: None,
            keystroke: None,
            behavioral: None,
            contexts: None,
            external: None,
            key_hierarchy: None,
            provenance: None,
            errors: ErrorAccumulator::new(),
            strength: Strength::Basic,
        }
    }

    fn raise(&mut self, tier: Strength) {
        if tier > self.strength {
            self.strength = tier;
        }
    }

    /// Provenance and key-hierarchy never raise strength past `Enhanced`
    /// (spec §9 open question; decision in `SPEC_FULL.md` §11).
    fn raise_capped(&mut self, tier: Strength) {
        let capped = tier.min(Strength::Enhanced);
        if capped > self.strength {
            self.strength = capped;
        }
    }

    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declaration = Some(declaration);
        self.raise(Strength::Basic);
        self
    }

    pub fn with_presence(mut self, record: PresenceRecord) -> Self {
        self.presence = Some(record);
        self.raise(Strength::Standard);
        self
    }

    pub fn with_keystroke(mut self, record: KeystrokeRecord) -> Self {
        self.keystroke = Some(record);
        self.raise(Strength::Standard);
        self
    }

    pub fn with_hardware(mut self, provider: &dyn HardwareAttestationProvider) -> Self {
        let bound_checkpoints = self
            .checkpoints
            .iter()
            .filter(|c| c.attestation_binding.is_some())
            .count() as u64;
        let summary = HardwareSummary {
            manufacturer: provider.manufacturer().to_string(),
            firmware_version: provider.firmware_version(),
            device_id: provider.device_id().ok().map(hex::encode).unwrap_or_default(),
            bound_checkpoints,
        };
        self.hardware = Some(summary);
        self.raise(Strength::Enhanced);
        self
    }

    pub fn with_behavioral(mut self, record: BehavioralRecord) -> Self {
        self.behavioral = Some(record);
        self.raise(Strength::Maximum);
        self
    }

    pub fn with_contexts(mut self, record: ContextRecord) -> Self {
        self.contexts = Some(record);
        self
    }

    /// Sets the unified external-anchor list (spec §9: implementers SHOULD
    /// emit only the unified form).
    pub fn with_external_anchors(mut self, proofs: Vec<Proof>) -> Self {
        self.external = Some(ExternalAnchors { proofs });
        self.raise(Strength::Maximum);
        self
    }

    /// Legacy two-list input, folded into the unified list without
    /// attempting to cross-map timestamp proofs to blockchain anchors.
    pub fn with_anchors(self, timestamps: Vec<Proof>, blockchain_anchors: Vec<Proof>) -> Self {
        let mut proofs = timestamps;
        proofs.extend(blockchain_anchors);
        self.with_external_anchors(proofs)
    }

    pub fn with_provenance(mut self, record: ProvenanceRecord) -> Self {
        self.provenance = Some(record);
        self.raise_capped(Strength::Enhanced);
        self
    }

    pub fn with_key_hierarchy(mut self, hierarchy: KeyHierarchy) -> Self {
        self.key_hierarchy = Some(hierarchy);
        self.raise_capped(Strength::Enhanced);
        self
    }

    pub fn build(mut self) -> WitnessResult<Packet> {
        let declaration = match self.declaration.take() {
            Some(d) => d,
            None => return Err(WitnessError::MissingField("declaration")),
        };

        if !declaration.verify() {
            self.errors.push(WitnessError::SignatureInvalid("declaration"));
        }
        if let Err(e) = verify_checkpoints(&self.checkpoints, &self.vdf_params) {
            self.errors.push(e);
        }
        if let Some(p) = &self.presence {
            if let Err(e) = p.self_check() {
                self.errors.push(e);
            }
        }
        if let Some(k) = &self.keystroke {
            if let Err(e) = k.self_check() {
                self.errors.push(e);
            }
        }
        if let Some(b) = &self.behavioral {
            if let Err(e) = b.self_check() {
                self.errors.push(e);
            }
        }
        if let Some(kh) = &self.key_hierarchy {
            if let Err(e) = kh.verify() {
                self.errors.push(e);
            }
        }

        self.errors.finish()?;

        let (claims, limitations) = derive_claims_and_limitations(&self, &declaration);

        let final_checkpoint = self.checkpoints.last();
        let document = DocumentInfo {
            title: self.title.clone(),
            path: self.document_path.clone(),
            final_hash: final_checkpoint
                .map(|c| hex::encode(c.content_hash))
                .unwrap_or_else(|| hex::encode(crate::hash::sha256_empty())),
            final_size: final_checkpoint.map(|c| c.content_size).unwrap_or(0),
        };

        log::info!(
            "built evidence packet for '{}' at strength {:?} ({} checkpoint(s))",
            self.title,
            self.strength,
            self.checkpoints.len()
        );

        Ok(Packet {
            version: PACKET_VERSION,
            exported_at: Utc::now(),
            strength: self.strength,
            document,
            checkpoints: self.checkpoints.iter().map(CheckpointProof::from_checkpoint).collect(),
            vdf_params: self.vdf_params,
            chain_hash: hex::encode(self.chain_hash),
            declaration,
            claims,
            limitations,
            presence: self.presence,
            hardware: self.hardware,
            keystroke: self.keystroke,
            behavioral: self.behavioral,
            contexts: self.contexts,
            external: self.external,
            key_hierarchy: self.key_hierarchy,
            provenance: self.provenance,
        })
    }
}

fn derive_claims_and_limitations(builder: &PacketBuilder, declaration: &Declaration) -> (Vec<Claim>, Vec<String>) {
    let mut claims = vec![
        Claim {
            claim_type: "chain_integrity".to_string(),
            description: "Checkpoint chain verifies: hash linkage intact, VDF delay proofs valid".to_string(),
            confidence: Confidence::Cryptographic,
        },
        Claim {
            claim_type: "process_declared".to_string(),
            description: "Author signed a process declaration binding document and chain hashes".to_string(),
            confidence: Confidence::Cryptographic,
        },
    ];

    if builder.presence.is_some() {
        claims.push(Claim {
            claim_type: "human_presence".to_string(),
            description: "Author responded to a presence challenge during the capture session".to_string(),
            confidence: Confidence::Attestation,
        });
    }
    if builder.keystroke.is_some() {
        claims.push(Claim {
            claim_type: "keystroke_pattern".to_string(),
            description: "Keystroke timing is consistent with human typing jitter".to_string(),
            confidence: Confidence::Statistical,
        });
    }
    if builder.hardware.is_some() {
        claims.push(Claim {
            claim_type: "hardware_attestation".to_string(),
            description: "One or more checkpoints are bound to a hardware attestor quote".to_string(),
            confidence: Confidence::Attestation,
        });
    }
    if builder.behavioral.is_some() {
        claims.push(Claim {
            claim_type: "behavioral_pattern".to_string(),
            description: "Session behavior is consistent with declared authorship activity".to_string(),
            confidence: Confidence::Statistical,
        });
    }
    if builder.external.as_ref().is_some_and(|e| !e.proofs.is_empty()) {
        claims.push(Claim {
            claim_type: "external_anchor".to_string(),
            description: "One or more third-party timestamp anchors confirm the chain head predates an external time".to_string(),
            confidence: Confidence::Cryptographic,
        });
    }
    if builder.provenance.is_some() {
        claims.push(Claim {
            claim_type: "provenance".to_string(),
            description: "A provenance note describes prior external handling of this content".to_string(),
            confidence: Confidence::Statistical,
        });
    }
    if builder.key_hierarchy.is_some() {
        claims.push(Claim {
            claim_type: "key_hierarchy".to_string(),
            description: "Author key rotation history verifies as an unbroken signature chain".to_string(),
            confidence: Confidence::Cryptographic,
        });
    }

    let mut limitations = Vec::new();
    if builder.hardware.is_none() {
        limitations.push("No hardware attestation — software-only security".to_string());
    }
    if declaration.ai_tools.is_empty() {
        limitations.push("No AI tool usage declared — reliance is on the author's unverified statement alone".to_string());
    } else {
        limitations.push("Author declares AI tool usage — verify institutional policy compliance".to_string());
    }
    limitations.push("This evidence does not prove the origin of ideas.".to_string());
    limitations.push("This evidence does not prove the absence of AI involvement in cognition.".to_string());

    (claims, limitations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{DeclarationBuilder, ModalityType};
    use ed25519_dalek::Keypair;
    use rand::rngs::OsRng;

    fn signed_declaration(chain: &Chain, keypair: &Keypair) -> Declaration {
        DeclarationBuilder::new(chain.checkpoints()[0].content_hash, chain.head_hash(), "My Essay")
            .add_modality(ModalityType::Keyboard, 100.0, "")
            .with_statement("I wrote this by hand")
            .sign(keypair)
            .unwrap()
    }

    #[test]
    fn minimum_viable_packet_is_basic_with_expected_claims_and_limitations() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);

        let packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .build()
            .unwrap();

        assert_eq!(packet.strength, Strength::Basic);
        assert_eq!(packet.checkpoints.len(), 1);
        assert!(packet.claims.iter().any(|c| c.claim_type == "chain_integrity"));
        assert!(packet.claims.iter().any(|c| c.claim_type == "process_declared"));
        assert_eq!(packet.limitations.len(), 4);
        assert!(packet.verify(&chain.vdf_params).is_ok());
    }

    #[test]
    fn signature_tamper_fails_verification_on_declaration() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);

        let mut packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .build()
            .unwrap();
        packet.declaration.signature[0] ^= 0xFF;

        match packet.verify(&chain.vdf_params) {
            Err(WitnessError::SignatureInvalid(field)) => assert_eq!(field, "declaration"),
            other => panic!("expected declaration signature error, got {:?}", other),
        }
    }

    #[test]
    fn chain_break_fails_verification_at_its_index() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256(b"a"), 1, None, None, None).unwrap();
        chain.append(crate::hash::sha256(b"ab"), 2, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);

        let mut packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .build()
            .unwrap();
        packet.checkpoints[1].previous_hash = hex::encode(crate::hash::ZERO_HASH);

        match packet.verify(&chain.vdf_params) {
            Err(WitnessError::ChainLinkageBroken { index }) => assert_eq!(index, 1),
            other => panic!("expected ChainLinkageBroken at index 1, got {:?}", other),
        }
    }

    #[test]
    fn build_fails_without_declaration() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let result = PacketBuilder::new(&chain, "My Essay").build();
        assert!(matches!(result, Err(WitnessError::MissingField("declaration"))));
    }

    #[test]
    fn encode_decode_round_trip_preserves_verification() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);
        let packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .build()
            .unwrap();

        let json = packet.encode().unwrap();
        let decoded = Packet::decode(&json).unwrap();
        assert!(decoded.verify(&chain.vdf_params).is_ok());
    }

    #[test]
    fn decode_accepts_the_unknown_strength_tier() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);
        let packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .build()
            .unwrap();

        let mut value: serde_json::Value = serde_json::from_str(&packet.encode().unwrap()).unwrap();
        value["strength"] = serde_json::json!("unknown");
        let decoded: Packet = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.strength, Strength::Unknown);
        assert!(decoded.verify(&chain.vdf_params).is_ok());
    }

    #[test]
    fn legacy_external_anchor_layout_decodes_into_unified_list() {
        let legacy = serde_json::json!({
            "timestamps": [],
            "blockchain_anchors": [],
        });
        let anchors: ExternalAnchors = serde_json::from_value(legacy).unwrap();
        assert!(anchors.proofs.is_empty());
    }

    #[test]
    fn external_anchor_proofs_are_armored_as_hex_and_base64_not_numeric_arrays() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);

        let proof = crate::anchor::Proof {
            provider: "opentimestamps".to_string(),
            hash: [9u8; 32],
            status: crate::anchor::ProofStatus::Confirmed,
            body: vec![0xDE, 0xAD, 0xBE, 0xEF],
            verification_url: None,
            blockchain_anchor: None,
            timestamp: Utc::now(),
        };

        let packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .with_external_anchors(vec![proof.clone()])
            .build()
            .unwrap();

        let json = packet.encode().unwrap();
        assert!(json.contains(&hex::encode(proof.hash)));
        assert!(json.contains(&base64::encode(&proof.body)));
        assert!(!json.contains("222, 173, 190, 239"));

        let decoded = Packet::decode(&json).unwrap();
        let external = decoded.external.unwrap();
        assert_eq!(external.proofs[0].hash, proof.hash);
        assert_eq!(external.proofs[0].body, proof.body);
        assert!(decoded.verify(&chain.vdf_params).is_ok());
    }

    #[test]
    fn adding_a_layer_raises_strength_to_its_floor() {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = signed_declaration(&chain, &keypair);

        let packet = PacketBuilder::new(&chain, "My Essay")
            .with_declaration(declaration)
            .with_presence(PresenceRecord {
                challenge_id: "c1".to_string(),
                responded_at: Utc::now(),
                response_latency_ms: 500,
            })
            .build()
            .unwrap();
        assert_eq!(packet.strength, Strength::Standard);
    }
}
