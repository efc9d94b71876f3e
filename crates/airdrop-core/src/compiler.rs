//! Turns operation descriptors into Bubblegum mint instructions.
//!
//! Address or metadata problems reject the single item and compilation moves
//! on; only an unusable batch-wide [`MintTarget`] fails the whole batch.

use std::collections::HashMap;

use chain_sol::address::address_to_bytes;
use chain_sol::bubblegum::{
    mint_to_collection_v1, CollectionAccounts, Creator, MetadataArgs, MintSigners,
};
use chain_sol::transaction::SolInstruction;
use tracing::{debug, warn};

use crate::config::MetadataTemplate;
use crate::error::AirdropError;
use crate::types::{Batch, ItemStatus, MintTarget, OperationDescriptor, RejectionKind};

/// An item that compiled to exactly one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledItem {
    pub index: usize,
    pub instruction: SolInstruction,
}

/// Why one descriptor could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFault {
    pub kind: RejectionKind,
    pub reason: String,
}

impl ItemFault {
    fn address(field: &str, err: impl std::fmt::Display) -> Self {
        Self {
            kind: RejectionKind::InvalidAddress,
            reason: format!("{field}: {err}"),
        }
    }

    fn operation(err: impl std::fmt::Display) -> Self {
        Self {
            kind: RejectionKind::InvalidOperation,
            reason: err.to_string(),
        }
    }
}

/// Decoded batch-wide accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub merkle_tree: [u8; 32],
    pub payer: [u8; 32],
}

impl ResolvedTarget {
    pub fn resolve(target: &MintTarget) -> Result<Self, AirdropError> {
        let merkle_tree = address_to_bytes(&target.merkle_tree)
            .map_err(|e| AirdropError::InvalidRequest(format!("merkleTree: {e}")))?;
        let payer = address_to_bytes(&target.payer)
            .map_err(|e| AirdropError::InvalidRequest(format!("fromPubKey: {e}")))?;
        Ok(Self { merkle_tree, payer })
    }
}

#[derive(Debug, Clone)]
pub struct OperationCompiler {
    template: MetadataTemplate,
}

impl OperationCompiler {
    pub fn new(template: MetadataTemplate) -> Self {
        Self { template }
    }

    /// `"{prefix} #{base_index + sequence_index}"`.
    pub fn item_name(&self, sequence_index: u32) -> String {
        let number = u64::from(self.template.base_index) + u64::from(sequence_index);
        format!("{} #{number}", self.template.name_prefix)
    }

    pub fn metadata_for(
        &self,
        descriptor: &OperationDescriptor,
        collection_mint: [u8; 32],
        collection_authority: [u8; 32],
    ) -> MetadataArgs {
        MetadataArgs {
            name: self.item_name(descriptor.sequence_index),
            symbol: self.template.symbol.clone(),
            uri: self.template.uri.clone(),
            seller_fee_basis_points: descriptor.royalty_bps,
            primary_sale_happened: false,
            is_mutable: self.template.is_mutable,
            edition_nonce: None,
            collection: Some((collection_mint, false)),
            creators: vec![Creator {
                address: collection_authority,
                verified: true,
                share: 100,
            }],
        }
    }

    /// Compile a single descriptor against pre-derived collection accounts.
    ///
    /// Pure: the output depends only on the arguments and the template.
    pub fn compile_descriptor(
        &self,
        descriptor: &OperationDescriptor,
        accounts: &CollectionAccounts,
        payer: &[u8; 32],
    ) -> Result<SolInstruction, ItemFault> {
        let recipient = address_to_bytes(&descriptor.recipient)
            .map_err(|e| ItemFault::address("recipient", e))?;
        let authority = address_to_bytes(&descriptor.collection_authority)
            .map_err(|e| ItemFault::address("collectionAuthority", e))?;

        let metadata = self.metadata_for(descriptor, accounts.collection_mint, authority);
        metadata.validate().map_err(ItemFault::operation)?;

        let signers = MintSigners {
            payer: *payer,
            tree_delegate: authority,
            collection_authority: authority,
        };
        mint_to_collection_v1(accounts, &signers, &recipient, &metadata)
            .map_err(ItemFault::operation)
    }

    /// Compile every pending item of `batch`, recording rejections on the
    /// batch. Returns the compiled items in batch order.
    pub fn compile(
        &self,
        target: &MintTarget,
        batch: &mut Batch,
    ) -> Result<Vec<CompiledItem>, AirdropError> {
        let target = ResolvedTarget::resolve(target)?;
        let mut collections: HashMap<[u8; 32], CollectionAccounts> = HashMap::new();
        let mut compiled = Vec::with_capacity(batch.len());
        let batch_id = batch.id().to_string();

        for index in 0..batch.len() {
            let Some(item) = batch.item_mut(index) else {
                continue;
            };
            if item.status() != ItemStatus::Pending {
                continue;
            }

            let outcome = self
                .validate_item(&item.descriptor)
                .and_then(|mint| {
                    item.advance(ItemStatus::Validated)
                        .map_err(ItemFault::operation)?;
                    let accounts = match collections.get(&mint) {
                        Some(accounts) => accounts.clone(),
                        None => {
                            let derived = CollectionAccounts::derive(&target.merkle_tree, &mint)
                                .map_err(ItemFault::operation)?;
                            collections.insert(mint, derived.clone());
                            derived
                        }
                    };
                    self.compile_descriptor(&item.descriptor, &accounts, &target.payer)
                });

            match outcome {
                Ok(instruction) => {
                    item.advance(ItemStatus::Compiled)?;
                    compiled.push(CompiledItem { index, instruction });
                }
                Err(fault) => {
                    warn!(
                        batch_id = %batch_id,
                        index,
                        kind = ?fault.kind,
                        reason = %fault.reason,
                        "item rejected"
                    );
                    if let Some(item) = batch.item_mut(index) {
                        item.reject(fault.kind, fault.reason);
                    }
                }
            }
        }

        debug!(
            batch_id = %batch_id,
            compiled = compiled.len(),
            collections = collections.len(),
            "compiled batch"
        );
        Ok(compiled)
    }

    /// Address and metadata checks that decide `Pending -> Validated`.
    /// Returns the decoded collection mint.
    fn validate_item(&self, descriptor: &OperationDescriptor) -> Result<[u8; 32], ItemFault> {
        address_to_bytes(&descriptor.recipient).map_err(|e| ItemFault::address("recipient", e))?;
        address_to_bytes(&descriptor.collection_authority)
            .map_err(|e| ItemFault::address("collectionAuthority", e))?;
        let mint = address_to_bytes(&descriptor.collection_mint)
            .map_err(|e| ItemFault::address("collectionMint", e))?;

        self.metadata_for(descriptor, mint, [0u8; 32])
            .validate()
            .map_err(ItemFault::operation)?;
        Ok(mint)
    }
}
