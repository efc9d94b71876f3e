//! Batch orchestration: descriptors in, encoded envelopes and rejections out.

use std::sync::Arc;

use chain_sol::address::{address_to_bytes, bytes_to_address};
use chain_sol::bubblegum::{
    create_tree_config, tree_config_address, SPL_ACCOUNT_COMPRESSION_PROGRAM_ID,
};
use chain_sol::system::{create_account, rent_exempt_minimum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{BatchAssembler, Envelope};
use crate::client::{bounded, ExternalChainClient};
use crate::compiler::{OperationCompiler, ResolvedTarget};
use crate::config::{PipelineConfig, SimulationPolicy};
use crate::encoder::{EncodedEnvelope, TransactionEncoder};
use crate::error::AirdropError;
use crate::registry::{table_candidates, CompactionTable, CompactionTableBuilder};
use crate::signer::AuthorityKeypair;
use crate::types::{Batch, ItemStatus, MintTarget, OperationDescriptor, Rejection};

pub const NO_WALLETS_MESSAGE: &str = "No wallets provided for airdrop.";

/// A mint request as it arrives at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintBatchRequest {
    #[serde(rename = "fromPubKey")]
    pub payer: String,
    pub merkle_tree: String,
    #[serde(rename = "collectionMintPubKey")]
    pub collection_mint: String,
    /// Defaults to the payer.
    #[serde(default)]
    pub collection_authority: Option<String>,
    #[serde(rename = "wallets")]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub royalty_bps: Option<u16>,
    /// Existing compaction table to compile against.
    #[serde(default)]
    pub lookup_table: Option<String>,
}

impl MintBatchRequest {
    pub fn target(&self) -> MintTarget {
        MintTarget {
            merkle_tree: self.merkle_tree.clone(),
            payer: self.payer.clone(),
        }
    }

    pub fn descriptors(&self, default_royalty_bps: u16) -> Vec<OperationDescriptor> {
        let authority = self
            .collection_authority
            .clone()
            .unwrap_or_else(|| self.payer.clone());
        self.recipients
            .iter()
            .enumerate()
            .map(|(i, recipient)| OperationDescriptor {
                collection_mint: self.collection_mint.clone(),
                recipient: recipient.clone(),
                royalty_bps: self.royalty_bps.unwrap_or(default_royalty_bps),
                collection_authority: authority.clone(),
                sequence_index: i as u32,
            })
            .collect()
    }
}

/// An envelope that was assembled but produced no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeFailure {
    pub envelope: usize,
    pub items: Vec<usize>,
    pub error: String,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub batch_id: String,
    pub envelopes: Vec<EncodedEnvelope>,
    pub rejections: Vec<Rejection>,
    pub failed_envelopes: Vec<EnvelopeFailure>,
    /// Items whose envelope was never encoded because the chain went away.
    pub unresolved_items: Vec<usize>,
    pub interrupted: Option<String>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_envelopes.is_empty() && self.interrupted.is_none()
    }
}

/// Transactions that create a compaction table and fill it for a batch.
///
/// They must land in order, so none of them is simulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePlan {
    pub table: String,
    pub slot: u64,
    pub addresses: Vec<String>,
    pub transactions: Vec<EncodedEnvelope>,
}

/// A transaction that allocates and initializes a fresh Merkle tree.
///
/// Already signed by the generated tree key, which is then dropped; only
/// the payer's slot is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePlan {
    pub merkle_tree: String,
    pub tree_config: String,
    pub max_depth: u32,
    pub max_buffer_size: u32,
    /// Leaves the tree can hold.
    pub capacity: u64,
    pub account_size: usize,
    pub lamports: u64,
    pub transaction: EncodedEnvelope,
}

pub struct AirdropPipeline {
    client: Arc<dyn ExternalChainClient>,
    config: PipelineConfig,
    compiler: OperationCompiler,
    co_signer: Option<Arc<AuthorityKeypair>>,
}

impl AirdropPipeline {
    pub fn new(
        client: Arc<dyn ExternalChainClient>,
        config: PipelineConfig,
    ) -> Result<Self, AirdropError> {
        config.validate()?;
        Ok(Self {
            client,
            compiler: OperationCompiler::new(config.metadata.clone()),
            config,
            co_signer: None,
        })
    }

    pub fn with_co_signer(mut self, co_signer: AuthorityKeypair) -> Self {
        info!(authority = %bytes_to_address(&co_signer.pubkey()), "co-signing enabled");
        self.co_signer = Some(Arc::new(co_signer));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn encoder(&self) -> TransactionEncoder {
        TransactionEncoder::new(self.client.clone(), self.config.simulation)
            .with_co_signer(self.co_signer.clone())
            .with_timeout(self.config.client_timeout())
    }

    /// Fetch the caller-supplied table. A missing table is never created
    /// implicitly.
    pub async fn resolve_table(&self, address: &str) -> Result<CompactionTable, AirdropError> {
        let key = address_to_bytes(address)
            .map_err(|e| AirdropError::InvalidRequest(format!("lookupTable: {e}")))?;
        bounded(self.config.client_timeout(), self.client.get_account_table(&key))
            .await?
            .ok_or_else(|| AirdropError::TableNotFound(address.trim().to_string()))
    }

    pub async fn run(&self, request: &MintBatchRequest) -> Result<BatchOutcome, AirdropError> {
        if request.recipients.is_empty() {
            return Err(AirdropError::InvalidRequest(NO_WALLETS_MESSAGE.into()));
        }
        let target = request.target();
        let resolved = ResolvedTarget::resolve(&target)?;
        let table = match &request.lookup_table {
            Some(address) => Some(self.resolve_table(address).await?),
            None => None,
        };

        let mut batch = Batch::new(request.descriptors(self.config.metadata.default_royalty_bps));
        let table_label = table
            .as_ref()
            .map(|t| bytes_to_address(t.address()))
            .unwrap_or_else(|| "none".into());
        info!(
            batch_id = %batch.id(),
            items = batch.len(),
            table = %table_label,
            "processing batch"
        );

        let compiled = self.compiler.compile(&target, &mut batch)?;
        let assembly =
            BatchAssembler::new(self.config.limits.clone(), resolved.payer, table).assemble(compiled);

        for rejection in &assembly.rejections {
            if let Some(item) = batch.item_mut(rejection.index) {
                item.reject(rejection.kind, rejection.reason.clone());
            }
        }
        for envelope in &assembly.envelopes {
            for &index in &envelope.items {
                if let Some(item) = batch.item_mut(index) {
                    item.advance(ItemStatus::Assigned {
                        envelope: envelope.index,
                    })?;
                }
            }
        }

        let mut outcome = BatchOutcome {
            batch_id: batch.id().to_string(),
            rejections: batch.rejections(),
            ..BatchOutcome::default()
        };
        self.encode_all(&assembly.envelopes, &mut outcome).await;

        info!(
            batch_id = %outcome.batch_id,
            envelopes = outcome.envelopes.len(),
            rejected = outcome.rejections.len(),
            failed = outcome.failed_envelopes.len(),
            unresolved = outcome.unresolved_items.len(),
            "batch finished"
        );
        Ok(outcome)
    }

    async fn encode_all(&self, envelopes: &[Envelope], outcome: &mut BatchOutcome) {
        let encoder = self.encoder();
        for (position, envelope) in envelopes.iter().enumerate() {
            match encoder.encode(envelope).await {
                Ok(encoded) => outcome.envelopes.push(encoded),
                Err(AirdropError::SimulationFailed {
                    envelope: index,
                    error,
                    logs,
                }) => outcome.failed_envelopes.push(EnvelopeFailure {
                    envelope: index,
                    items: envelope.items.clone(),
                    error,
                    logs,
                }),
                Err(AirdropError::ChainUnavailable(reason)) => {
                    warn!(
                        batch_id = %outcome.batch_id,
                        envelope = envelope.index,
                        %reason,
                        "chain unavailable, stopping"
                    );
                    outcome.unresolved_items = envelopes[position..]
                        .iter()
                        .flat_map(|e| e.items.iter().copied())
                        .collect();
                    outcome.interrupted = Some(reason);
                    break;
                }
                Err(other) => outcome.failed_envelopes.push(EnvelopeFailure {
                    envelope: envelope.index,
                    items: envelope.items.clone(),
                    error: other.to_string(),
                    logs: Vec::new(),
                }),
            }
        }
    }

    /// Build the transactions that create a table holding every loadable
    /// account of `request`'s batch. The payer is the table authority.
    pub async fn prepare_table(&self, request: &MintBatchRequest) -> Result<TablePlan, AirdropError> {
        if request.recipients.is_empty() {
            return Err(AirdropError::InvalidRequest(NO_WALLETS_MESSAGE.into()));
        }
        let target = request.target();
        let resolved = ResolvedTarget::resolve(&target)?;

        let mut batch = Batch::new(request.descriptors(self.config.metadata.default_royalty_bps));
        let compiled = self.compiler.compile(&target, &mut batch)?;
        let instructions: Vec<_> = compiled.into_iter().map(|c| c.instruction).collect();
        let candidates = table_candidates(&instructions);

        let builder = CompactionTableBuilder::new(self.client.clone(), self.config.commitment)
            .with_timeout(self.config.client_timeout());
        let creation = builder.create_table(&resolved.payer, &resolved.payer).await?;
        let extension =
            CompactionTableBuilder::extend_table(&creation.table, &resolved.payer, &candidates)?;

        let mut groups = Vec::with_capacity(extension.instructions.len().max(1));
        let mut extends = extension.instructions.into_iter();
        let mut first = vec![creation.instruction];
        first.extend(extends.next());
        groups.push(first);
        groups.extend(extends.map(|ix| vec![ix]));

        let encoder = self.encoder();
        let mut transactions = Vec::with_capacity(groups.len());
        for (index, instructions) in groups.into_iter().enumerate() {
            let envelope = Envelope {
                index,
                fee_payer: resolved.payer,
                instructions,
                items: Vec::new(),
                table: None,
                serialized_size: 0,
                account_count: 0,
            };
            transactions.push(encoder.encode_with(&envelope, SimulationPolicy::Never).await?);
        }

        let table = bytes_to_address(extension.table.address());
        info!(
            batch_id = %batch.id(),
            %table,
            addresses = extension.table.len(),
            transactions = transactions.len(),
            "prepared compaction table"
        );

        Ok(TablePlan {
            table,
            slot: creation.slot,
            addresses: extension.table.addresses().iter().map(bytes_to_address).collect(),
            transactions,
        })
    }

    /// Build the transaction creating a Merkle tree for `payer`, who funds
    /// the account and becomes the tree creator.
    pub async fn prepare_tree(&self, payer: &str) -> Result<TreePlan, AirdropError> {
        let payer = address_to_bytes(payer)
            .map_err(|e| AirdropError::InvalidRequest(format!("fromPubKey: {e}")))?;
        let shape = self.config.tree.shape()?;

        let tree_key = AuthorityKeypair::generate();
        let merkle_tree = tree_key.pubkey();
        let account_size = shape.account_size();
        let lamports = rent_exempt_minimum(account_size);

        let allocate = create_account(
            &payer,
            &merkle_tree,
            lamports,
            account_size as u64,
            &SPL_ACCOUNT_COMPRESSION_PROGRAM_ID,
        )?;
        let initialize =
            create_tree_config(&merkle_tree, &payer, &payer, &shape, self.config.tree.public)?;

        let envelope = Envelope {
            index: 0,
            fee_payer: payer,
            instructions: vec![allocate, initialize],
            items: Vec::new(),
            table: None,
            serialized_size: 0,
            account_count: 0,
        };
        let encoder = TransactionEncoder::new(self.client.clone(), self.config.simulation)
            .with_co_signer(Some(Arc::new(tree_key)))
            .with_timeout(self.config.client_timeout());
        let transaction = encoder.encode(&envelope).await?;

        let merkle_tree_address = bytes_to_address(&merkle_tree);
        info!(
            merkle_tree = %merkle_tree_address,
            max_depth = shape.max_depth,
            max_buffer_size = shape.max_buffer_size,
            account_size,
            lamports,
            "prepared merkle tree"
        );

        Ok(TreePlan {
            merkle_tree: merkle_tree_address,
            tree_config: bytes_to_address(&tree_config_address(&merkle_tree)?),
            max_depth: shape.max_depth,
            max_buffer_size: shape.max_buffer_size,
            capacity: shape.capacity(),
            account_size,
            lamports,
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_boundary_field_names() {
        let request: MintBatchRequest = serde_json::from_value(serde_json::json!({
            "fromPubKey": "payer",
            "merkleTree": "tree",
            "collectionMintPubKey": "mint",
            "wallets": ["a", "b"],
        }))
        .unwrap();

        assert_eq!(request.payer, "payer");
        assert_eq!(request.recipients, vec!["a", "b"]);
        assert!(request.lookup_table.is_none());
        assert!(request.royalty_bps.is_none());
    }

    #[test]
    fn descriptors_default_authority_and_royalty() {
        let request = MintBatchRequest {
            payer: "payer".into(),
            merkle_tree: "tree".into(),
            collection_mint: "mint".into(),
            collection_authority: None,
            recipients: vec!["a".into(), "b".into(), "c".into()],
            royalty_bps: None,
            lookup_table: None,
        };
        let descriptors = request.descriptors(250);

        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[2].sequence_index, 2);
        assert_eq!(descriptors[2].recipient, "c");
        assert!(descriptors
            .iter()
            .all(|d| d.collection_authority == "payer" && d.royalty_bps == 250));
    }

    #[test]
    fn outcome_completeness() {
        let mut outcome = BatchOutcome::default();
        assert!(outcome.is_complete());
        outcome.interrupted = Some("rpc down".into());
        assert!(!outcome.is_complete());
    }
}
