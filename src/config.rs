//! Deployment-tunable configuration.
//!
//! The teacher hardcodes its consensus parameters as crate-level `const`s
//! (`core::types::{GLOBAL_ROOT_ITERATIONS, ...}`) because a storage-continuity
//! prover's parameters are network-wide consensus and must not vary per
//! instance. An authorship-evidence chain has no such network to agree with:
//! VDF difficulty and which anchor providers are enabled are legitimately
//! per-deployment, so they live in a `WitnessConfig` value instead.

use crate::vdf::VdfParams;

/// Current declaration schema version emitted by this crate.
pub const DECLARATION_SCHEMA_VERSION: u32 = 2;

/// Top-level configuration threaded through chain creation and packet export.
#[derive(Debug, Clone)]
pub struct WitnessConfig {
    /// VDF difficulty for newly created chains.
    pub vdf_params: VdfParams,
    /// Declaration schema version to stamp on newly signed declarations.
    pub declaration_schema_version: u32,
    /// Names of external anchor providers to enable by default.
    pub enabled_anchor_providers: Vec<String>,
    /// Logging verbosity for [`crate::telemetry::init_logger`].
    pub log_level: crate::telemetry::LogLevel,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            vdf_params: VdfParams::default(),
            declaration_schema_version: DECLARATION_SCHEMA_VERSION,
            enabled_anchor_providers: Vec::new(),
            log_level: crate::telemetry::LogLevel::Info,
        }
    }
}

impl WitnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vdf_params(mut self, params: VdfParams) -> Self {
        self.vdf_params = params;
        self
    }

    pub fn with_anchor_provider(mut self, name: impl Into<String>) -> Self {
        self.enabled_anchor_providers.push(name.into());
        self
    }

    pub fn with_log_level(mut self, level: crate::telemetry::LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
