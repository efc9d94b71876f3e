//! Solana wire-level building blocks for compressed NFT airdrops.
//!
//! This crate handles Solana addresses and PDAs, the legacy and v0 message
//! wire formats, Address Lookup Table instructions and the Bubblegum
//! tree setup and `mint_to_collection_v1` instructions, all without pulling in `solana-sdk`
//! and its 200+ transitive dependencies.
//!
//! Instead we implement Solana's compact binary wire format by hand, using
//! `ed25519-dalek` for Ed25519 signing and `bs58` for Base58 encoding.

pub mod address;
pub mod bubblegum;
pub mod error;
pub mod lookup_table;
pub mod system;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, find_program_address, validate_address};
pub use bubblegum::{
    create_tree_config, mint_to_collection_v1, CollectionAccounts, Creator, MetadataArgs,
    MintSigners, TreeShape, BUBBLEGUM_PROGRAM_ID,
};
pub use error::SolError;
pub use lookup_table::{
    create_lookup_table, decode_lookup_table, extend_lookup_table, AddressLookupTableAccount,
    LookupTableState, ADDRESS_LOOKUP_TABLE_PROGRAM_ID, LOOKUP_TABLE_MAX_ADDRESSES,
};
pub use system::{create_account, rent_exempt_minimum};
pub use transaction::{
    compile_legacy_message, compile_v0_message, decode_compact_u16, deserialize_message,
    deserialize_transaction, encode_compact_u16, serialize_message, serialize_transaction,
    CompiledInstruction, MessageAddressTableLookup, MessageHeader, MessageVersion,
    SolAccountMeta, SolInstruction, SolMessage, SolTransaction, MAX_TX_ACCOUNT_LOCKS,
    PACKET_DATA_SIZE, SYSTEM_PROGRAM_ID,
};
