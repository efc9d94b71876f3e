//! Address Lookup Table program support.
//!
//! A lookup table is an on-chain account holding up to 256 addresses. A v0
//! message may reference table entries by one-byte index instead of carrying
//! the full 32-byte key. This module builds the `CreateLookupTable` and
//! `ExtendLookupTable` instructions and decodes table account data.
//!
//! Instruction data uses bincode layout: a little-endian `u32` variant tag,
//! then the variant fields (`Vec` lengths are `u64`).

use crate::address::find_program_address;
use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

/// Address Lookup Table Program ID: `AddressLookupTab1e1111111111111111111111111`
pub const ADDRESS_LOOKUP_TABLE_PROGRAM_ID: [u8; 32] = [
    0x02, 0x77, 0xa6, 0xaf, 0x97, 0x33, 0x9b, 0x7a, 0xc8, 0x8d, 0x18, 0x92, 0xc9, 0x04, 0x46,
    0xf5, 0x00, 0x02, 0x30, 0x92, 0x66, 0xf6, 0x2e, 0x53, 0xc1, 0x18, 0x24, 0x49, 0x82, 0x00,
    0x00, 0x00,
];

/// Maximum number of addresses a single table can hold.
pub const LOOKUP_TABLE_MAX_ADDRESSES: usize = 256;

/// Size of the table metadata header preceding the address list.
pub const LOOKUP_TABLE_META_SIZE: usize = 56;

const CREATE_LOOKUP_TABLE_TAG: u32 = 0;
const EXTEND_LOOKUP_TABLE_TAG: u32 = 2;
const LOOKUP_TABLE_STATE_TAG: u32 = 1;

/// The subset of a table's state a message compiler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressLookupTableAccount {
    pub key: [u8; 32],
    pub addresses: Vec<[u8; 32]>,
}

impl AddressLookupTableAccount {
    /// Index of `address` inside the table, if present and addressable.
    pub fn index_of(&self, address: &[u8; 32]) -> Option<u8> {
        self.addresses
            .iter()
            .position(|a| a == address)
            .and_then(|i| u8::try_from(i).ok())
    }
}

/// Deactivation slot of a table that has never been deactivated.
pub const ACTIVE_DEACTIVATION_SLOT: u64 = u64::MAX;

/// Decoded on-chain table account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTableState {
    pub deactivation_slot: u64,
    pub last_extended_slot: u64,
    /// `None` once the table has been frozen.
    pub authority: Option<[u8; 32]>,
    pub addresses: Vec<[u8; 32]>,
}

impl LookupTableState {
    /// False once deactivation has started; such a table stops resolving
    /// after the cooldown and must not be compiled against.
    pub fn is_active(&self) -> bool {
        self.deactivation_slot == ACTIVE_DEACTIVATION_SLOT
    }
}

/// Derive the table address for `authority` created at `recent_slot`.
pub fn derive_lookup_table_address(
    authority: &[u8; 32],
    recent_slot: u64,
) -> Result<([u8; 32], u8), SolError> {
    find_program_address(
        &[authority.as_ref(), &recent_slot.to_le_bytes()],
        &ADDRESS_LOOKUP_TABLE_PROGRAM_ID,
    )
}

/// Build a `CreateLookupTable` instruction.
///
/// Returns the instruction and the address of the table it creates.
pub fn create_lookup_table(
    authority: &[u8; 32],
    payer: &[u8; 32],
    recent_slot: u64,
) -> Result<(SolInstruction, [u8; 32]), SolError> {
    let (table, bump) = derive_lookup_table_address(authority, recent_slot)?;

    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&CREATE_LOOKUP_TABLE_TAG.to_le_bytes());
    data.extend_from_slice(&recent_slot.to_le_bytes());
    data.push(bump);

    let ix = SolInstruction {
        program_id: ADDRESS_LOOKUP_TABLE_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(table, false),
            SolAccountMeta::readonly(*authority, true),
            SolAccountMeta::writable(*payer, true),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    };

    Ok((ix, table))
}

/// Build an `ExtendLookupTable` instruction appending `new_addresses`.
pub fn extend_lookup_table(
    table: &[u8; 32],
    authority: &[u8; 32],
    payer: &[u8; 32],
    new_addresses: &[[u8; 32]],
) -> Result<SolInstruction, SolError> {
    if new_addresses.is_empty() {
        return Err(SolError::InstructionBuildError(
            "extend requires at least one address".into(),
        ));
    }
    if new_addresses.len() > LOOKUP_TABLE_MAX_ADDRESSES {
        return Err(SolError::LookupTableFull {
            requested: new_addresses.len(),
            capacity: LOOKUP_TABLE_MAX_ADDRESSES,
        });
    }

    let mut data = Vec::with_capacity(12 + 32 * new_addresses.len());
    data.extend_from_slice(&EXTEND_LOOKUP_TABLE_TAG.to_le_bytes());
    data.extend_from_slice(&(new_addresses.len() as u64).to_le_bytes());
    for address in new_addresses {
        data.extend_from_slice(address);
    }

    Ok(SolInstruction {
        program_id: ADDRESS_LOOKUP_TABLE_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*table, false),
            SolAccountMeta::readonly(*authority, true),
            SolAccountMeta::writable(*payer, true),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

/// Decode raw table account data.
pub fn decode_lookup_table(data: &[u8]) -> Result<LookupTableState, SolError> {
    if data.len() < LOOKUP_TABLE_META_SIZE {
        return Err(SolError::SerializationError(format!(
            "lookup table account is {} bytes, header needs {LOOKUP_TABLE_META_SIZE}",
            data.len()
        )));
    }

    let u64_at = |offset: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&data[offset..offset + 8]);
        u64::from_le_bytes(b)
    };

    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[0..4]);
    if u32::from_le_bytes(tag) != LOOKUP_TABLE_STATE_TAG {
        return Err(SolError::SerializationError(
            "account is not an initialized lookup table".into(),
        ));
    }

    let deactivation_slot = u64_at(4);
    let last_extended_slot = u64_at(12);
    // data[20] is last_extended_slot_start_index.
    let authority = match data[21] {
        0 => None,
        1 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&data[22..54]);
            Some(key)
        }
        other => {
            return Err(SolError::SerializationError(format!(
                "invalid authority option tag {other}"
            )))
        }
    };

    let body = &data[LOOKUP_TABLE_META_SIZE..];
    if body.len() % 32 != 0 {
        return Err(SolError::SerializationError(format!(
            "lookup table body of {} bytes is not a multiple of 32",
            body.len()
        )));
    }
    let addresses = body
        .chunks_exact(32)
        .map(|c| {
            let mut key = [0u8; 32];
            key.copy_from_slice(c);
            key
        })
        .collect();

    Ok(LookupTableState {
        deactivation_slot,
        last_extended_slot,
        authority,
        addresses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address;

    #[test]
    fn program_id_roundtrip() {
        assert_eq!(
            address::bytes_to_address(&ADDRESS_LOOKUP_TABLE_PROGRAM_ID),
            "AddressLookupTab1e1111111111111111111111111"
        );
    }

    #[test]
    fn create_instruction_layout() {
        let authority = [0xAAu8; 32];
        let payer = [0xBBu8; 32];
        let (ix, table) = create_lookup_table(&authority, &payer, 123_456).unwrap();

        assert_eq!(ix.program_id, ADDRESS_LOOKUP_TABLE_PROGRAM_ID);
        assert_eq!(ix.data.len(), 13);
        assert_eq!(&ix.data[..4], &[0, 0, 0, 0]);
        assert_eq!(&ix.data[4..12], &123_456u64.to_le_bytes());
        assert_eq!(ix.accounts[0].pubkey, table);
        assert!(ix.accounts[1].is_signer);
        assert!(ix.accounts[2].is_writable && ix.accounts[2].is_signer);

        let (expected, bump) = derive_lookup_table_address(&authority, 123_456).unwrap();
        assert_eq!(table, expected);
        assert_eq!(ix.data[12], bump);
    }

    #[test]
    fn table_address_depends_on_slot() {
        let authority = [0xAAu8; 32];
        let (a, _) = derive_lookup_table_address(&authority, 1).unwrap();
        let (b, _) = derive_lookup_table_address(&authority, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn extend_instruction_layout() {
        let addrs = [[1u8; 32], [2u8; 32]];
        let ix = extend_lookup_table(&[9u8; 32], &[8u8; 32], &[7u8; 32], &addrs).unwrap();

        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..12], &2u64.to_le_bytes());
        assert_eq!(&ix.data[12..44], &[1u8; 32]);
        assert_eq!(&ix.data[44..76], &[2u8; 32]);
    }

    #[test]
    fn extend_rejects_empty_and_oversized_lists() {
        assert!(extend_lookup_table(&[9u8; 32], &[8u8; 32], &[7u8; 32], &[]).is_err());
        let too_many = vec![[1u8; 32]; LOOKUP_TABLE_MAX_ADDRESSES + 1];
        let err = extend_lookup_table(&[9u8; 32], &[8u8; 32], &[7u8; 32], &too_many).unwrap_err();
        assert!(matches!(err, SolError::LookupTableFull { .. }));
    }

    #[test]
    fn decode_table_account() {
        let mut data = vec![0u8; LOOKUP_TABLE_META_SIZE];
        data[0] = 1;
        data[4..12].copy_from_slice(&u64::MAX.to_le_bytes());
        data[12..20].copy_from_slice(&77u64.to_le_bytes());
        data[21] = 1;
        data[22..54].copy_from_slice(&[0xAB; 32]);
        data.extend_from_slice(&[3u8; 32]);
        data.extend_from_slice(&[4u8; 32]);

        let state = decode_lookup_table(&data).unwrap();
        assert_eq!(state.deactivation_slot, u64::MAX);
        assert!(state.is_active());
        assert_eq!(state.last_extended_slot, 77);
        assert_eq!(state.authority, Some([0xAB; 32]));
        assert_eq!(state.addresses, vec![[3u8; 32], [4u8; 32]]);
    }

    #[test]
    fn decode_rejects_short_or_uninitialized_accounts() {
        assert!(decode_lookup_table(&[0u8; 10]).is_err());
        assert!(decode_lookup_table(&[0u8; LOOKUP_TABLE_META_SIZE]).is_err());
    }

    #[test]
    fn index_of_finds_position() {
        let table = AddressLookupTableAccount {
            key: [0u8; 32],
            addresses: vec![[1u8; 32], [2u8; 32]],
        };
        assert_eq!(table.index_of(&[2u8; 32]), Some(1));
        assert_eq!(table.index_of(&[3u8; 32]), None);
    }
}
