//! Account deduplication and compaction (lookup) table management.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chain_sol::address::bytes_to_address;
use chain_sol::lookup_table::{
    create_lookup_table, decode_lookup_table, extend_lookup_table, AddressLookupTableAccount,
    LOOKUP_TABLE_MAX_ADDRESSES,
};
use chain_sol::transaction::SolInstruction;
use tracing::{debug, info};

use crate::client::{bounded, Commitment, ExternalChainClient};
use crate::error::AirdropError;

/// Addresses per `ExtendLookupTable` instruction, small enough that one
/// extension fits in a legacy transaction alongside the create instruction.
pub const EXTEND_CHUNK: usize = 20;

/// First-seen-wins index over 32-byte addresses.
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    addresses: Vec<[u8; 32]>,
    positions: HashMap<[u8; 32], usize>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `addresses`, returning the index assigned to each input in
    /// order. Repeated addresses reuse the index of their first occurrence.
    pub fn register<I>(&mut self, addresses: I) -> Vec<usize>
    where
        I: IntoIterator<Item = [u8; 32]>,
    {
        addresses
            .into_iter()
            .map(|address| self.register_one(address))
            .collect()
    }

    pub fn register_one(&mut self, address: [u8; 32]) -> usize {
        if let Some(&index) = self.positions.get(&address) {
            return index;
        }
        let index = self.addresses.len();
        self.addresses.push(address);
        self.positions.insert(address, index);
        index
    }

    pub fn index_of(&self, address: &[u8; 32]) -> Option<usize> {
        self.positions.get(address).copied()
    }

    pub fn contains(&self, address: &[u8; 32]) -> bool {
        self.positions.contains_key(address)
    }

    pub fn addresses(&self) -> &[[u8; 32]] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn into_addresses(self) -> Vec<[u8; 32]> {
        self.addresses
    }
}

/// Immutable snapshot of an on-ledger lookup table.
///
/// Extending a table produces a new snapshot; the old one is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionTable {
    address: [u8; 32],
    /// `None` once the table is frozen.
    authority: Option<[u8; 32]>,
    addresses: Vec<[u8; 32]>,
    capacity: usize,
}

impl CompactionTable {
    pub fn new(address: [u8; 32], authority: [u8; 32]) -> Self {
        Self {
            address,
            authority: Some(authority),
            addresses: Vec::new(),
            capacity: LOOKUP_TABLE_MAX_ADDRESSES,
        }
    }

    /// Snapshot of a table whose contents were read from the ledger.
    pub fn from_addresses(
        address: [u8; 32],
        authority: Option<[u8; 32]>,
        addresses: Vec<[u8; 32]>,
    ) -> Result<Self, AirdropError> {
        if addresses.len() > LOOKUP_TABLE_MAX_ADDRESSES {
            return Err(AirdropError::TableCapacityExceeded {
                table: bytes_to_address(&address),
                requested: addresses.len(),
                capacity: LOOKUP_TABLE_MAX_ADDRESSES,
            });
        }
        Ok(Self {
            address,
            authority,
            addresses,
            capacity: LOOKUP_TABLE_MAX_ADDRESSES,
        })
    }

    /// Decode raw lookup table account data fetched for `address`.
    ///
    /// A table that is being deactivated is refused.
    pub fn from_account_data(address: [u8; 32], data: &[u8]) -> Result<Self, AirdropError> {
        let state = decode_lookup_table(data)?;
        if !state.is_active() {
            return Err(AirdropError::InvalidRequest(format!(
                "lookup table {} is deactivated (slot {})",
                bytes_to_address(&address),
                state.deactivation_slot
            )));
        }
        Self::from_addresses(address, state.authority, state.addresses)
    }

    pub fn address(&self) -> &[u8; 32] {
        &self.address
    }

    pub fn authority(&self) -> Option<&[u8; 32]> {
        self.authority.as_ref()
    }

    pub fn addresses(&self) -> &[[u8; 32]] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.addresses.len()
    }

    pub fn contains(&self, address: &[u8; 32]) -> bool {
        self.addresses.contains(address)
    }

    /// The view a v0 message compiler resolves indices against.
    pub fn to_lookup_account(&self) -> AddressLookupTableAccount {
        AddressLookupTableAccount {
            key: self.address,
            addresses: self.addresses.clone(),
        }
    }
}

/// A freshly derived table and the instruction that creates it.
#[derive(Debug, Clone)]
pub struct TableCreation {
    pub table: CompactionTable,
    pub instruction: SolInstruction,
    pub slot: u64,
}

/// The instructions that grow a table and the snapshot they lead to.
#[derive(Debug, Clone)]
pub struct TableExtension {
    pub table: CompactionTable,
    pub instructions: Vec<SolInstruction>,
    /// Addresses actually appended, in order.
    pub added: Vec<[u8; 32]>,
}

pub struct CompactionTableBuilder {
    client: Arc<dyn ExternalChainClient>,
    commitment: Commitment,
    timeout: Option<Duration>,
}

impl CompactionTableBuilder {
    pub fn new(client: Arc<dyn ExternalChainClient>, commitment: Commitment) -> Self {
        Self {
            client,
            commitment,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Derive a new table for `authority` at the current slot.
    pub async fn create_table(
        &self,
        authority: &[u8; 32],
        payer: &[u8; 32],
    ) -> Result<TableCreation, AirdropError> {
        let slot = bounded(self.timeout, self.client.get_slot(self.commitment)).await?;
        let (instruction, address) = create_lookup_table(authority, payer, slot)?;

        info!(
            table = %bytes_to_address(&address),
            slot,
            "derived compaction table"
        );

        Ok(TableCreation {
            table: CompactionTable::new(address, *authority),
            instruction,
            slot,
        })
    }

    /// Append the addresses `table` does not hold yet.
    ///
    /// Already-present and repeated addresses are skipped, so extending twice
    /// with the same list yields no instructions the second time. If the new
    /// total would exceed capacity nothing is appended.
    pub fn extend_table(
        table: &CompactionTable,
        payer: &[u8; 32],
        addresses: &[[u8; 32]],
    ) -> Result<TableExtension, AirdropError> {
        let mut fresh = AddressRegistry::new();
        for address in addresses {
            if !table.contains(address) {
                fresh.register_one(*address);
            }
        }
        let added = fresh.into_addresses();

        if added.is_empty() {
            return Ok(TableExtension {
                table: table.clone(),
                instructions: Vec::new(),
                added,
            });
        }

        let requested = table.len() + added.len();
        if requested > table.capacity() {
            return Err(AirdropError::TableCapacityExceeded {
                table: bytes_to_address(table.address()),
                requested,
                capacity: table.capacity(),
            });
        }

        let authority = table.authority().ok_or_else(|| {
            AirdropError::InvalidRequest(format!(
                "compaction table {} is frozen",
                bytes_to_address(table.address())
            ))
        })?;

        let instructions = added
            .chunks(EXTEND_CHUNK)
            .map(|chunk| extend_lookup_table(table.address(), authority, payer, chunk))
            .collect::<Result<Vec<_>, _>>()?;

        let mut next = table.clone();
        next.addresses.extend_from_slice(&added);

        debug!(
            table = %bytes_to_address(table.address()),
            added = added.len(),
            total = next.len(),
            instructions = instructions.len(),
            "extended compaction table"
        );

        Ok(TableExtension {
            table: next,
            instructions,
            added,
        })
    }
}

/// Accounts of `instructions` that may be loaded from a table: everything
/// except signers and invoked programs, deduplicated in first-seen order.
pub fn table_candidates(instructions: &[SolInstruction]) -> Vec<[u8; 32]> {
    let mut pinned = AddressRegistry::new();
    for ix in instructions {
        pinned.register_one(ix.program_id);
        for meta in ix.accounts.iter().filter(|m| m.is_signer) {
            pinned.register_one(meta.pubkey);
        }
    }

    let mut candidates = AddressRegistry::new();
    for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
        if !pinned.contains(&meta.pubkey) {
            candidates.register_one(meta.pubkey);
        }
    }
    candidates.into_addresses()
}
