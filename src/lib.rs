//! `witnessd-core`: tamper-evident authorship evidence.
//!
//! A self-contained, cryptographically signed packet attesting that a
//! specific sequence of document states was produced by a specific author on
//! a specific device over a specific (provable) span of wall-clock time,
//! annotated with a signed declaration of creative process.
//!
//! The evidence stack is eight components layered bottom-up:
//!
//! - [`vdf`] (C1) — the Verifiable Delay Function engine proving minimum
//!   elapsed time between checkpoints.
//! - [`attestation`] (C2) — the hardware-attestation provider abstraction
//!   (hardware, software-simulator, or unavailable).
//! - [`chain`] (C3) — the append-only, hash-linked checkpoint sequence.
//! - [`declaration`] (C4) — the author-signed process declaration.
//! - [`layers`] (C5) — presence/keystroke/behavioral/context/provenance/
//!   key-hierarchy adapters the core accepts as optional evidence.
//! - [`anchor`] (C6) — the external timestamp-anchor registry.
//! - [`packet`] (C7) — the evidence-packet assembler/verifier.
//! - [`integrity`] (C8) — the runtime integrity enforcer and reliability
//!   classifier.
//!
//! Control flow: content edits drive [`chain::Chain::append`], which runs the
//! VDF and optionally binds an attestation quote; [`declaration`] is signed
//! once per export; [`anchor::AnchorRegistry`] may anchor the chain head;
//! [`packet::PacketBuilder`] assembles everything into a [`packet::Packet`];
//! [`integrity::IntegrityEnforcer`] may classify the session separately.
//! Verification inverts the flow: [`packet::Packet::verify`] delegates chain
//! and VDF checks to [`chain`]/[`vdf`], the declaration check to
//! [`declaration`], and the key-hierarchy check to [`layers`].

pub mod anchor;
pub mod attestation;
pub mod chain;
pub mod config;
pub mod declaration;
pub mod error;
pub mod hash;
pub mod integrity;
pub mod layers;
pub mod packet;
pub mod telemetry;
pub mod vdf;

pub use config::WitnessConfig;
pub use error::{WitnessError, WitnessResult};

#[cfg(test)]
mod tests {
    use super::*;
    use attestation::SoftwareAttestationSimulator;
    use chain::Chain;
    use declaration::{DeclarationBuilder, ModalityType};
    use ed25519_dalek::Keypair;
    use packet::PacketBuilder;
    use rand::rngs::OsRng;

    /// End-to-end smoke test exercising the whole stack: a chain with a
    /// hardware-bound checkpoint, a signed declaration, and an assembled
    /// packet that verifies.
    #[test]
    fn full_stack_builds_and_verifies_an_enhanced_packet() {
        let config = WitnessConfig::new().with_vdf_params(vdf::VdfParams::new(10, 1000));

        let simulator = SoftwareAttestationSimulator::new([42u8; 32]);
        simulator.open().unwrap();

        let mut chain = Chain::new("essay-1", "/tmp/essay-1.md", config.vdf_params);
        let author = Keypair::generate(&mut OsRng);
        chain
            .append(
                hash::sha256(b"it was a dark and stormy night"),
                30,
                Some("first draft".to_string()),
                Some(&simulator),
                Some(&author),
            )
            .unwrap();
        assert!(chain.verify().is_ok());

        let declaration = DeclarationBuilder::new(chain.head().unwrap().content_hash, chain.head_hash(), "Dark and Stormy")
            .add_modality(ModalityType::Keyboard, 100.0, "")
            .with_statement("I wrote this by hand over one evening")
            .sign(&author)
            .unwrap();

        let packet = PacketBuilder::new(&chain, "Dark and Stormy")
            .with_declaration(declaration)
            .with_hardware(&simulator)
            .build()
            .unwrap();

        assert_eq!(packet.strength, packet::Strength::Enhanced);
        assert!(packet.verify(&config.vdf_params).is_ok());

        let record = packet::record::Record::new(packet.clone()).unwrap();
        assert!(record.verify(&config.vdf_params).is_ok());

        let encoded = packet.encode().unwrap();
        let decoded = packet::Packet::decode(&encoded).unwrap();
        assert!(decoded.verify(&config.vdf_params).is_ok());
    }
}
