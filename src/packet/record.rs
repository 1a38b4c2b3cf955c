//! ASCII-armored supplemental export (`SPEC_FULL.md` §10): additive sugar
//! over [`Packet`] for terminals and plain-text archives.
//!
//! Grounded on the reference `writerslogic-witnessd` WAR-block format (a
//! PGP-style armored block wrapping a signed statement) and the teacher's
//! `HashChainHeader`-over-`ChainStorage` layering: an internal algorithmic
//! type plus a separate, human-readable interchange wrapper. Never changes
//! the canonical packet encoding or strength-tier rules — `Record::verify`
//! delegates to [`Packet::verify`] and adds only a seal-consistency check
//! over the rendered text itself.

use super::Packet;
use crate::error::{WitnessError, WitnessResult};
use crate::hash::{domain_hash, Hash32};
use crate::vdf::VdfParams;

const BEGIN_MARKER: &str = "-----BEGIN WITNESS RECORD-----";
const END_MARKER: &str = "-----END WITNESS RECORD-----";
const RECORD_SEAL_DOMAIN: &[u8] = b"witnessd-record-seal-v1";
const DECLARATION_DIGEST_DOMAIN: &[u8] = b"witnessd-declaration-digest-v1";
const WRAP_COLUMNS: usize = 64;

fn declaration_digest(packet: &Packet) -> Hash32 {
    domain_hash(DECLARATION_DIGEST_DOMAIN, &[&packet.declaration.canonical_payload()])
}

/// `H(seal-domain || document_hash || chain_hash || declaration_digest)`: the
/// seal binding the three headline hashes shown in the armored block.
fn seal_hash(packet: &Packet) -> WitnessResult<Hash32> {
    let document_hash = hex::decode(&packet.document.final_hash)
        .map_err(|e| WitnessError::MalformedEncoding(format!("document.final_hash: {e}")))?;
    let chain_hash = hex::decode(&packet.chain_hash)
        .map_err(|e| WitnessError::MalformedEncoding(format!("chain_hash: {e}")))?;
    let declaration_hash = declaration_digest(packet);
    Ok(domain_hash(RECORD_SEAL_DOMAIN, &[&document_hash, &chain_hash, &declaration_hash]))
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn extract_field<'a>(armored: &'a str, label: &str) -> Option<&'a str> {
    let prefix = format!("{label}: ");
    armored
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(prefix.as_str()))
}

fn render(packet: &Packet, seal: Hash32) -> String {
    let mut out = String::new();
    out.push_str(BEGIN_MARKER);
    out.push('\n');
    out.push_str(&format!("Version: {}\n", packet.version));
    out.push_str(&format!("Author-Fingerprint: {}\n", hex::encode(&packet.declaration.author_public_key)));
    out.push_str(&format!("Document: {}\n", packet.document.title));
    out.push_str(&format!("Exported-At: {}\n", packet.exported_at.to_rfc3339()));
    out.push('\n');
    for line in wrap_text(&packet.declaration.statement, WRAP_COLUMNS) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str("document-hash: ");
    out.push_str(&packet.document.final_hash);
    out.push('\n');
    out.push_str("chain-hash: ");
    out.push_str(&packet.chain_hash);
    out.push('\n');
    out.push_str("declaration-hash: ");
    out.push_str(&hex::encode(declaration_digest(packet)));
    out.push('\n');
    out.push_str("seal: ");
    out.push_str(&hex::encode(seal));
    out.push('\n');
    out.push_str(END_MARKER);
    out.push('\n');
    out
}

/// A PGP-style ASCII-armored rendering of a [`Packet`]. Purely additive:
/// constructing one never mutates, re-derives, or raises the strength of the
/// underlying packet.
#[derive(Debug, Clone)]
pub struct Record {
    packet: Packet,
    armored: String,
}

impl Record {
    /// Render a fresh armored block from a packet.
    pub fn new(packet: Packet) -> WitnessResult<Self> {
        let seal = seal_hash(&packet)?;
        let armored = render(&packet, seal);
        Ok(Self { packet, armored })
    }

    /// Pair previously rendered armored text with the packet it claims to
    /// represent — e.g. after reading both back from an archive. The seal
    /// line embedded in `armored` is checked against one freshly recomputed
    /// from `packet` so a hand-edited or desynced rendering is rejected.
    pub fn from_armored(armored: impl Into<String>, packet: Packet) -> WitnessResult<Self> {
        let record = Self { packet, armored: armored.into() };
        record.check_seal()?;
        Ok(record)
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn armored(&self) -> &str {
        &self.armored
    }

    fn check_seal(&self) -> WitnessResult<()> {
        let expected = hex::encode(seal_hash(&self.packet)?);
        let found = extract_field(&self.armored, "seal")
            .ok_or_else(|| WitnessError::MalformedEncoding("record is missing a seal field".to_string()))?;
        if found != expected {
            return Err(WitnessError::MalformedEncoding(
                "record seal does not match the packet it accompanies".to_string(),
            ));
        }
        Ok(())
    }

    /// Delegates to [`Packet::verify`] (spec §4.6), then checks that this
    /// record's armored rendering is still in sync with its packet.
    pub fn verify(&self, vdf_params: &VdfParams) -> WitnessResult<()> {
        self.packet.verify(vdf_params)?;
        self.check_seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::declaration::{DeclarationBuilder, ModalityType};
    use crate::packet::PacketBuilder;
    use crate::vdf::VdfParams;
    use ed25519_dalek::Keypair;
    use rand::rngs::OsRng;

    fn sample_packet() -> Packet {
        let mut chain = Chain::new("doc-1", "/tmp/doc-1.md", VdfParams::new(10, 1000));
        chain.append(crate::hash::sha256_empty(), 0, None, None, None).unwrap();
        let keypair = Keypair::generate(&mut OsRng);
        let declaration = DeclarationBuilder::new(chain.checkpoints()[0].content_hash, chain.head_hash(), "My Essay")
            .add_modality(ModalityType::Keyboard, 100.0, "")
            .with_statement("I wrote every word of this essay by hand, over several long evenings, with no outside tools")
            .sign(&keypair)
            .unwrap();
        PacketBuilder::new(&chain, "My Essay").with_declaration(declaration).build().unwrap()
    }

    #[test]
    fn renders_expected_markers_and_fields() {
        let packet = sample_packet();
        let vdf_params = packet.vdf_params;
        let record = Record::new(packet).unwrap();
        assert!(record.armored().starts_with(BEGIN_MARKER));
        assert!(record.armored().trim_end().ends_with(END_MARKER));
        assert!(record.verify(&vdf_params).is_ok());
    }

    #[test]
    fn word_wrap_never_exceeds_width_for_a_single_word() {
        let lines = wrap_text("hello world this is a short statement", WRAP_COLUMNS);
        for line in &lines {
            assert!(line.len() <= WRAP_COLUMNS || !line.contains(' '));
        }
    }

    #[test]
    fn tampered_seal_line_fails_verification() {
        let packet = sample_packet();
        let vdf_params = packet.vdf_params;
        let record = Record::new(packet.clone()).unwrap();
        let tampered = record.armored().replace(
            &format!("seal: {}", hex::encode(seal_hash(&packet).unwrap())),
            "seal: 0000000000000000000000000000000000000000000000000000000000000000",
        );
        let result = Record::from_armored(tampered, packet);
        assert!(result.is_err());
        let _ = vdf_params;
    }

    #[test]
    fn from_armored_accepts_a_consistent_pair() {
        let packet = sample_packet();
        let vdf_params = packet.vdf_params;
        let record = Record::new(packet.clone()).unwrap();
        let reparsed = Record::from_armored(record.armored().to_string(), packet).unwrap();
        assert!(reparsed.verify(&vdf_params).is_ok());
    }
}
