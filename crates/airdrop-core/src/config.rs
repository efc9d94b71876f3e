//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default so an empty document is a valid configuration:
//!
//! ```toml
//! simulation = "never"
//! commitment = "confirmed"
//!
//! [limits]
//! max_transaction_size = 1232
//!
//! [metadata]
//! name_prefix = "Spring Drop"
//! uri = "https://example.org/drop.json"
//!
//! [tree]
//! max_depth = 14
//! max_buffer_size = 64
//! ```

use std::path::Path;
use std::time::Duration;

use chain_sol::bubblegum::{
    TreeShape, MAX_BASIS_POINTS, MAX_NAME_LENGTH, MAX_SYMBOL_LENGTH, MAX_URI_LENGTH,
};
use chain_sol::transaction::{MAX_TX_ACCOUNT_LOCKS, PACKET_DATA_SIZE};
use serde::{Deserialize, Serialize};

use crate::client::Commitment;
use crate::error::AirdropError;

/// Whether envelopes are dry-run against the chain before being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPolicy {
    #[default]
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLimits {
    #[serde(default = "default_max_transaction_size")]
    pub max_transaction_size: usize,
    #[serde(default = "default_max_account_locks")]
    pub max_account_locks: usize,
}

impl Default for TransactionLimits {
    fn default() -> Self {
        Self {
            max_transaction_size: default_max_transaction_size(),
            max_account_locks: default_max_account_locks(),
        }
    }
}

/// Fields shared by every minted leaf and by the uploaded metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTemplate {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default = "default_description")]
    pub description: String,
    /// Added to each item's sequence index when naming it.
    #[serde(default)]
    pub base_index: u32,
    #[serde(default = "default_royalty_bps")]
    pub default_royalty_bps: u16,
    #[serde(default = "default_true")]
    pub is_mutable: bool,
}

impl Default for MetadataTemplate {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            symbol: default_symbol(),
            uri: String::new(),
            description: default_description(),
            base_index: 0,
            default_royalty_bps: default_royalty_bps(),
            is_mutable: true,
        }
    }
}

/// Shape of Merkle trees created for new airdrops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSettings {
    /// 14 holds 16 384 leaves.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: u32,
    #[serde(default)]
    pub canopy_depth: u32,
    /// Let anyone mint into the tree. Unset keeps the program default.
    #[serde(default)]
    pub public: Option<bool>,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_buffer_size: default_max_buffer_size(),
            canopy_depth: 0,
            public: None,
        }
    }
}

impl TreeSettings {
    pub fn shape(&self) -> Result<TreeShape, AirdropError> {
        TreeShape::new(self.max_depth, self.max_buffer_size)
            .and_then(|shape| shape.with_canopy(self.canopy_depth))
            .map_err(|e| AirdropError::Config(format!("tree: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub limits: TransactionLimits,
    #[serde(default)]
    pub metadata: MetadataTemplate,
    #[serde(default)]
    pub tree: TreeSettings,
    #[serde(default)]
    pub simulation: SimulationPolicy,
    /// Commitment used when fetching the slot for a new compaction table.
    #[serde(default)]
    pub commitment: Commitment,
    /// Upper bound on each chain client call; `None` leaves it to the client.
    #[serde(default)]
    pub client_timeout_ms: Option<u64>,
}

fn default_max_transaction_size() -> usize { PACKET_DATA_SIZE }
fn default_max_account_locks() -> usize { MAX_TX_ACCOUNT_LOCKS }
fn default_name_prefix() -> String { "Compressed NFT Airdrop".into() }
fn default_symbol() -> String { "CNFT".into() }
fn default_description() -> String { "Compressed NFT using Metaplex Bubblegum on Solana.".into() }
fn default_royalty_bps() -> u16 { 500 }
fn default_true() -> bool { true }
fn default_max_depth() -> u32 { 14 }
fn default_max_buffer_size() -> u32 { 64 }

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, AirdropError> {
        let config: PipelineConfig =
            toml::from_str(content).map_err(|e| AirdropError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AirdropError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AirdropError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn client_timeout(&self) -> Option<Duration> {
        self.client_timeout_ms.map(Duration::from_millis)
    }

    /// Reject limits the protocol could never honor and a template that no
    /// item could be minted with.
    pub fn validate(&self) -> Result<(), AirdropError> {
        let limits = &self.limits;
        if limits.max_transaction_size == 0 || limits.max_transaction_size > PACKET_DATA_SIZE {
            return Err(AirdropError::Config(format!(
                "max_transaction_size must be in 1..={PACKET_DATA_SIZE}, got {}",
                limits.max_transaction_size
            )));
        }
        if limits.max_account_locks == 0 || limits.max_account_locks > MAX_TX_ACCOUNT_LOCKS {
            return Err(AirdropError::Config(format!(
                "max_account_locks must be in 1..={MAX_TX_ACCOUNT_LOCKS}, got {}",
                limits.max_account_locks
            )));
        }

        let meta = &self.metadata;
        if meta.name_prefix.trim().is_empty() {
            return Err(AirdropError::Config("metadata.name_prefix is empty".into()));
        }
        // Each item appends at least " #0".
        if meta.name_prefix.len() + 3 > MAX_NAME_LENGTH {
            return Err(AirdropError::Config(format!(
                "metadata.name_prefix exceeds {MAX_NAME_LENGTH} bytes"
            )));
        }
        if meta.symbol.len() > MAX_SYMBOL_LENGTH {
            return Err(AirdropError::Config(format!(
                "metadata.symbol exceeds {MAX_SYMBOL_LENGTH} bytes"
            )));
        }
        if meta.uri.len() > MAX_URI_LENGTH {
            return Err(AirdropError::Config(format!(
                "metadata.uri exceeds {MAX_URI_LENGTH} bytes"
            )));
        }
        if meta.default_royalty_bps > MAX_BASIS_POINTS {
            return Err(AirdropError::Config(format!(
                "metadata.default_royalty_bps exceeds {MAX_BASIS_POINTS}"
            )));
        }
        self.tree.shape()?;
        if self.client_timeout_ms == Some(0) {
            return Err(AirdropError::Config("client_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
