//! Bubblegum compressed NFT minting.
//!
//! Builds the `mint_to_collection_v1` instruction of the Metaplex Bubblegum
//! program by hand: the 16-account list in the program's fixed order and a
//! Borsh-encoded `MetadataArgs` payload behind the Anchor discriminator.
//! The leaf is appended to a concurrent Merkle tree owned by the SPL account
//! compression program instead of creating a token account per NFT.
//!
//! Trees themselves are set up with `create_tree_config`, after a system
//! `CreateAccount` has allocated the tree account at [`TreeShape::account_size`].

use crate::address::find_program_address;
use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// Bubblegum Program ID: `BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY`
pub const BUBBLEGUM_PROGRAM_ID: [u8; 32] = [
    0x98, 0x8b, 0x80, 0xeb, 0x79, 0x35, 0x28, 0x69, 0xb2, 0x24, 0x74, 0x5f, 0x59, 0xdd, 0xbf,
    0x8a, 0x26, 0x58, 0xca, 0x13, 0xdc, 0x68, 0x81, 0x21, 0x26, 0x35, 0x1c, 0xae, 0x07, 0xc1,
    0xa5, 0xa5,
];

/// SPL Account Compression Program ID: `cmtDvXumGCrqC1Age74AVPhSRVXJMd8PJS91L8KbNCK`
pub const SPL_ACCOUNT_COMPRESSION_PROGRAM_ID: [u8; 32] = [
    0x09, 0x2a, 0x13, 0xee, 0x95, 0xc4, 0x1c, 0xba, 0x08, 0xa6, 0x7f, 0x5a, 0xc6, 0x7e, 0x8d,
    0xf7, 0xe1, 0xda, 0x11, 0x62, 0x5e, 0x1d, 0x64, 0x13, 0x7f, 0x8f, 0x4f, 0x23, 0x83, 0x03,
    0x7f, 0x14,
];

/// SPL Noop Program ID (log wrapper): `noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV`
pub const SPL_NOOP_PROGRAM_ID: [u8; 32] = [
    0x0b, 0xbc, 0x0f, 0xc0, 0xbb, 0x47, 0xca, 0x2f, 0x74, 0xc4, 0x11, 0x2e, 0x94, 0xab, 0x13,
    0xcf, 0xa3, 0xc6, 0x34, 0xe5, 0xdc, 0x17, 0xea, 0xcb, 0x03, 0xcd, 0x1a, 0x23, 0xcd, 0x7e,
    0x78, 0x7c,
];

/// Token Metadata Program ID: `metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s`
pub const TOKEN_METADATA_PROGRAM_ID: [u8; 32] = [
    0x0b, 0x70, 0x65, 0xb1, 0xe3, 0xd1, 0x7c, 0x45, 0x38, 0x9d, 0x52, 0x7f, 0x6b, 0x04, 0xc3,
    0xcd, 0x58, 0xb8, 0x6c, 0x73, 0x1a, 0xa0, 0xfd, 0xb5, 0x49, 0xb6, 0xd1, 0xbc, 0x03, 0xf8,
    0x29, 0x46,
];

/// `sha256("global:mint_to_collection_v1")[..8]`
const MINT_TO_COLLECTION_V1_DISCRIMINATOR: [u8; 8] = [153, 18, 178, 47, 197, 158, 86, 15];

/// `sha256("global:create_tree")[..8]`
const CREATE_TREE_CONFIG_DISCRIMINATOR: [u8; 8] = [165, 83, 136, 142, 89, 202, 47, 220];

// Token Metadata field limits.
pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_SYMBOL_LENGTH: usize = 10;
pub const MAX_URI_LENGTH: usize = 200;
pub const MAX_CREATOR_LIMIT: usize = 5;
pub const MAX_BASIS_POINTS: u16 = 10_000;

const TOKEN_STANDARD_NON_FUNGIBLE: u8 = 0;
const TOKEN_PROGRAM_VERSION_ORIGINAL: u8 = 0;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub address: [u8; 32],
    pub verified: bool,
    /// Percentage of royalties, all creators must sum to 100.
    pub share: u8,
}

/// Leaf metadata, mirroring Bubblegum's `MetadataArgs`.
///
/// Token standard is always non-fungible and the token program version
/// always `Original`; `uses` is never set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub primary_sale_happened: bool,
    pub is_mutable: bool,
    pub edition_nonce: Option<u8>,
    /// `(key, verified)` of the collection the leaf belongs to.
    pub collection: Option<([u8; 32], bool)>,
    pub creators: Vec<Creator>,
}

impl MetadataArgs {
    /// Check the Token Metadata field limits.
    pub fn validate(&self) -> Result<(), SolError> {
        let check_len = |field: &str, value: &str, max: usize| {
            if value.len() > max {
                Err(SolError::InstructionBuildError(format!(
                    "{field} is {} bytes, max {max}",
                    value.len()
                )))
            } else {
                Ok(())
            }
        };

        check_len("name", &self.name, MAX_NAME_LENGTH)?;
        check_len("symbol", &self.symbol, MAX_SYMBOL_LENGTH)?;
        check_len("uri", &self.uri, MAX_URI_LENGTH)?;

        if self.seller_fee_basis_points > MAX_BASIS_POINTS {
            return Err(SolError::InstructionBuildError(format!(
                "seller fee of {} bps exceeds {MAX_BASIS_POINTS}",
                self.seller_fee_basis_points
            )));
        }

        if self.creators.len() > MAX_CREATOR_LIMIT {
            return Err(SolError::InstructionBuildError(format!(
                "{} creators, max {MAX_CREATOR_LIMIT}",
                self.creators.len()
            )));
        }
        if !self.creators.is_empty() {
            let total: u32 = self.creators.iter().map(|c| c.share as u32).sum();
            if total != 100 {
                return Err(SolError::InstructionBuildError(format!(
                    "creator shares sum to {total}, expected 100"
                )));
            }
        }

        Ok(())
    }

    /// Borsh encoding of the args.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            64 + self.name.len() + self.symbol.len() + self.uri.len() + 34 * self.creators.len(),
        );

        put_string(&mut buf, &self.name);
        put_string(&mut buf, &self.symbol);
        put_string(&mut buf, &self.uri);
        buf.extend_from_slice(&self.seller_fee_basis_points.to_le_bytes());
        buf.push(self.primary_sale_happened as u8);
        buf.push(self.is_mutable as u8);

        match self.edition_nonce {
            Some(nonce) => buf.extend_from_slice(&[1, nonce]),
            None => buf.push(0),
        }

        buf.extend_from_slice(&[1, TOKEN_STANDARD_NON_FUNGIBLE]);

        match &self.collection {
            Some((key, verified)) => {
                buf.push(1);
                buf.push(*verified as u8);
                buf.extend_from_slice(key);
            }
            None => buf.push(0),
        }

        // uses: None
        buf.push(0);
        buf.push(TOKEN_PROGRAM_VERSION_ORIGINAL);

        buf.extend_from_slice(&(self.creators.len() as u32).to_le_bytes());
        for creator in &self.creators {
            buf.extend_from_slice(&creator.address);
            buf.push(creator.verified as u8);
            buf.push(creator.share);
        }

        buf
    }
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Accounts shared by every mint into one tree and collection.
///
/// Deriving the PDAs costs several SHA-256 rounds each, so derive once per
/// batch and reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionAccounts {
    pub merkle_tree: [u8; 32],
    pub tree_config: [u8; 32],
    pub collection_mint: [u8; 32],
    pub collection_metadata: [u8; 32],
    pub collection_edition: [u8; 32],
    pub bubblegum_signer: [u8; 32],
}

impl CollectionAccounts {
    pub fn derive(merkle_tree: &[u8; 32], collection_mint: &[u8; 32]) -> Result<Self, SolError> {
        Ok(Self {
            merkle_tree: *merkle_tree,
            tree_config: tree_config_address(merkle_tree)?,
            collection_mint: *collection_mint,
            collection_metadata: metadata_address(collection_mint)?,
            collection_edition: master_edition_address(collection_mint)?,
            bubblegum_signer: bubblegum_signer_address()?,
        })
    }
}

/// Signers of a mint: who pays, who may append to the tree, who may
/// verify into the collection. Often all three are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintSigners {
    pub payer: [u8; 32],
    pub tree_delegate: [u8; 32],
    pub collection_authority: [u8; 32],
}

/// Tree config PDA: `[merkle_tree]` under Bubblegum.
pub fn tree_config_address(merkle_tree: &[u8; 32]) -> Result<[u8; 32], SolError> {
    find_program_address(&[merkle_tree.as_ref()], &BUBBLEGUM_PROGRAM_ID).map(|(a, _)| a)
}

/// Metadata PDA: `["metadata", token_metadata_program, mint]`.
pub fn metadata_address(mint: &[u8; 32]) -> Result<[u8; 32], SolError> {
    find_program_address(
        &[b"metadata", &TOKEN_METADATA_PROGRAM_ID, mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(a, _)| a)
}

/// Master edition PDA: `["metadata", token_metadata_program, mint, "edition"]`.
pub fn master_edition_address(mint: &[u8; 32]) -> Result<[u8; 32], SolError> {
    find_program_address(
        &[b"metadata", &TOKEN_METADATA_PROGRAM_ID, mint.as_ref(), b"edition"],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(a, _)| a)
}

/// Bubblegum's collection CPI signer PDA: `["collection_cpi"]`.
pub fn bubblegum_signer_address() -> Result<[u8; 32], SolError> {
    find_program_address(&[b"collection_cpi"], &BUBBLEGUM_PROGRAM_ID).map(|(a, _)| a)
}

// ---------------------------------------------------------------------------
// Instruction
// ---------------------------------------------------------------------------

/// Build a `mint_to_collection_v1` instruction minting one leaf to `leaf_owner`.
///
/// The leaf delegate is the owner and no collection authority record is
/// used (the program ID stands in for the absent optional account).
pub fn mint_to_collection_v1(
    accounts: &CollectionAccounts,
    signers: &MintSigners,
    leaf_owner: &[u8; 32],
    metadata: &MetadataArgs,
) -> Result<SolInstruction, SolError> {
    metadata.validate()?;

    let args = metadata.encode();
    let mut data = Vec::with_capacity(8 + args.len());
    data.extend_from_slice(&MINT_TO_COLLECTION_V1_DISCRIMINATOR);
    data.extend_from_slice(&args);

    Ok(SolInstruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(accounts.tree_config, false),
            SolAccountMeta::readonly(*leaf_owner, false),
            SolAccountMeta::readonly(*leaf_owner, false),
            SolAccountMeta::writable(accounts.merkle_tree, false),
            SolAccountMeta::writable(signers.payer, true),
            SolAccountMeta::readonly(signers.tree_delegate, true),
            SolAccountMeta::readonly(signers.collection_authority, true),
            SolAccountMeta::readonly(BUBBLEGUM_PROGRAM_ID, false),
            SolAccountMeta::readonly(accounts.collection_mint, false),
            SolAccountMeta::writable(accounts.collection_metadata, false),
            SolAccountMeta::readonly(accounts.collection_edition, false),
            SolAccountMeta::readonly(accounts.bubblegum_signer, false),
            SolAccountMeta::readonly(SPL_NOOP_PROGRAM_ID, false),
            SolAccountMeta::readonly(SPL_ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            SolAccountMeta::readonly(TOKEN_METADATA_PROGRAM_ID, false),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

// ---------------------------------------------------------------------------
// Tree setup
// ---------------------------------------------------------------------------

/// `(max_depth, max_buffer_size)` pairs the account compression program accepts.
pub const VALID_TREE_SHAPES: &[(u32, u32)] = &[
    (3, 8),
    (5, 8),
    (6, 16),
    (7, 16),
    (8, 16),
    (9, 16),
    (10, 32),
    (11, 32),
    (12, 32),
    (13, 32),
    (14, 64),
    (14, 256),
    (14, 1024),
    (14, 2048),
    (15, 64),
    (16, 64),
    (17, 64),
    (18, 64),
    (19, 64),
    (20, 64),
    (20, 256),
    (20, 1024),
    (20, 2048),
    (24, 64),
    (24, 256),
    (24, 512),
    (24, 1024),
    (24, 2048),
    (26, 512),
    (26, 1024),
    (26, 2048),
    (30, 512),
    (30, 1024),
    (30, 2048),
];

// account type (1) + header version (1) + max_buffer_size (4) + max_depth (4)
// + authority (32) + creation_slot (8) + padding (6)
const TREE_HEADER_SIZE: usize = 56;
// sequence_number + active_index + buffer_size
const TREE_COUNTERS_SIZE: usize = 24;
const NODE_SIZE: usize = 32;

/// Shape of a concurrent Merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
}

impl TreeShape {
    pub fn new(max_depth: u32, max_buffer_size: u32) -> Result<Self, SolError> {
        if !VALID_TREE_SHAPES.contains(&(max_depth, max_buffer_size)) {
            return Err(SolError::InstructionBuildError(format!(
                "unsupported tree shape: depth {max_depth}, buffer {max_buffer_size}"
            )));
        }
        Ok(Self {
            max_depth,
            max_buffer_size,
            canopy_depth: 0,
        })
    }

    pub fn with_canopy(mut self, canopy_depth: u32) -> Result<Self, SolError> {
        if canopy_depth >= self.max_depth {
            return Err(SolError::InstructionBuildError(format!(
                "canopy depth {canopy_depth} must be below tree depth {}",
                self.max_depth
            )));
        }
        self.canopy_depth = canopy_depth;
        Ok(self)
    }

    /// Number of leaves the tree can hold.
    pub fn capacity(&self) -> u64 {
        1u64 << self.max_depth
    }

    /// Bytes the tree account needs.
    pub fn account_size(&self) -> usize {
        let depth = self.max_depth as usize;
        // root + path + index (4) + padding (4)
        let change_log = NODE_SIZE + depth * NODE_SIZE + 8;
        // proof + leaf + index (4) + padding (4)
        let rightmost_path = depth * NODE_SIZE + NODE_SIZE + 8;
        let tree = TREE_COUNTERS_SIZE + self.max_buffer_size as usize * change_log + rightmost_path;
        let canopy = ((1usize << (self.canopy_depth + 1)) - 2) * NODE_SIZE;
        TREE_HEADER_SIZE + tree + canopy
    }
}

/// Build a `create_tree_config` instruction for a freshly allocated tree.
///
/// `public` lets anyone mint into the tree; `None` keeps the program default.
pub fn create_tree_config(
    merkle_tree: &[u8; 32],
    payer: &[u8; 32],
    tree_creator: &[u8; 32],
    shape: &TreeShape,
    public: Option<bool>,
) -> Result<SolInstruction, SolError> {
    let mut data = Vec::with_capacity(8 + 4 + 4 + 2);
    data.extend_from_slice(&CREATE_TREE_CONFIG_DISCRIMINATOR);
    data.extend_from_slice(&shape.max_depth.to_le_bytes());
    data.extend_from_slice(&shape.max_buffer_size.to_le_bytes());
    match public {
        Some(flag) => data.extend_from_slice(&[1, flag as u8]),
        None => data.push(0),
    }

    Ok(SolInstruction {
        program_id: BUBBLEGUM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(tree_config_address(merkle_tree)?, false),
            SolAccountMeta::writable(*merkle_tree, false),
            SolAccountMeta::writable(*payer, true),
            SolAccountMeta::readonly(*tree_creator, true),
            SolAccountMeta::readonly(SPL_NOOP_PROGRAM_ID, false),
            SolAccountMeta::readonly(SPL_ACCOUNT_COMPRESSION_PROGRAM_ID, false),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{bytes_to_address, is_on_curve};

    fn sample_metadata() -> MetadataArgs {
        MetadataArgs {
            name: "Drop #1".into(),
            symbol: "DRP".into(),
            uri: "https://example.com/meta.json".into(),
            seller_fee_basis_points: 500,
            primary_sale_happened: false,
            is_mutable: true,
            edition_nonce: None,
            collection: Some(([0xCC; 32], true)),
            creators: vec![Creator {
                address: [0xDD; 32],
                verified: true,
                share: 100,
            }],
        }
    }

    fn sample_signers() -> MintSigners {
        MintSigners {
            payer: [1u8; 32],
            tree_delegate: [1u8; 32],
            collection_authority: [1u8; 32],
        }
    }

    #[test]
    fn program_ids_roundtrip() {
        assert_eq!(
            bytes_to_address(&BUBBLEGUM_PROGRAM_ID),
            "BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY"
        );
        assert_eq!(
            bytes_to_address(&SPL_ACCOUNT_COMPRESSION_PROGRAM_ID),
            "cmtDvXumGCrqC1Age74AVPhSRVXJMd8PJS91L8KbNCK"
        );
        assert_eq!(
            bytes_to_address(&SPL_NOOP_PROGRAM_ID),
            "noopb9bkMVfRPU8AsbpTUg8AQkHtKwMYZiFUjNRtMmV"
        );
        assert_eq!(
            bytes_to_address(&TOKEN_METADATA_PROGRAM_ID),
            "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s"
        );
    }

    #[test]
    fn metadata_encoding_layout() {
        let encoded = sample_metadata().encode();

        assert_eq!(&encoded[..4], &7u32.to_le_bytes());
        assert_eq!(&encoded[4..11], b"Drop #1");
        assert_eq!(&encoded[11..15], &3u32.to_le_bytes());
        assert_eq!(&encoded[15..18], b"DRP");

        // name(11) + symbol(7) + uri(4 + 29) + fee(2) + 2 bools + nonce(1)
        // + token standard(2) + collection(34) + uses(1) + version(1)
        // + creators(4 + 34)
        assert_eq!(encoded.len(), 11 + 7 + 33 + 2 + 2 + 1 + 2 + 34 + 1 + 1 + 38);

        let fee_at = 11 + 7 + 33;
        assert_eq!(&encoded[fee_at..fee_at + 2], &500u16.to_le_bytes());
    }

    #[test]
    fn validate_rejects_long_name() {
        let mut m = sample_metadata();
        m.name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_excess_royalty() {
        let mut m = sample_metadata();
        m.seller_fee_basis_points = 10_001;
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_creator_shares() {
        let mut m = sample_metadata();
        m.creators[0].share = 90;
        assert!(m.validate().is_err());
    }

    #[test]
    fn derived_accounts_are_pdas() {
        let accounts = CollectionAccounts::derive(&[0x10; 32], &[0x20; 32]).unwrap();
        for pda in [
            accounts.tree_config,
            accounts.collection_metadata,
            accounts.collection_edition,
            accounts.bubblegum_signer,
        ] {
            assert!(!is_on_curve(&pda));
        }
        assert_ne!(accounts.collection_metadata, accounts.collection_edition);
    }

    #[test]
    fn mint_instruction_account_order() {
        let accounts = CollectionAccounts::derive(&[0x10; 32], &[0x20; 32]).unwrap();
        let owner = [0x77u8; 32];
        let ix =
            mint_to_collection_v1(&accounts, &sample_signers(), &owner, &sample_metadata()).unwrap();

        assert_eq!(ix.program_id, BUBBLEGUM_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 16);
        assert_eq!(ix.accounts[0].pubkey, accounts.tree_config);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, owner);
        assert_eq!(ix.accounts[2].pubkey, owner);
        assert_eq!(ix.accounts[3].pubkey, accounts.merkle_tree);
        assert!(ix.accounts[4].is_signer && ix.accounts[4].is_writable);
        assert!(ix.accounts[6].is_signer && !ix.accounts[6].is_writable);
        assert_eq!(ix.accounts[9].pubkey, accounts.collection_metadata);
        assert!(ix.accounts[9].is_writable);
        assert_eq!(ix.accounts[15].pubkey, SYSTEM_PROGRAM_ID);
        assert_eq!(&ix.data[..8], &MINT_TO_COLLECTION_V1_DISCRIMINATOR);
    }

    #[test]
    fn mint_instruction_rejects_invalid_metadata() {
        let accounts = CollectionAccounts::derive(&[0x10; 32], &[0x20; 32]).unwrap();
        let mut m = sample_metadata();
        m.symbol = "TOO-LONG-SYMBOL".into();
        assert!(mint_to_collection_v1(&accounts, &sample_signers(), &[0x77; 32], &m).is_err());
    }

    #[test]
    fn tree_account_size_matches_compression_program() {
        let shape = TreeShape::new(14, 64).unwrap();
        assert_eq!(shape.account_size(), 31_800);
        assert_eq!(shape.capacity(), 16_384);

        let small = TreeShape::new(3, 8).unwrap();
        assert_eq!(small.account_size(), 56 + 24 + 8 * 136 + 136);

        let with_canopy = TreeShape::new(14, 64).unwrap().with_canopy(2).unwrap();
        assert_eq!(with_canopy.account_size(), 31_800 + 6 * 32);
    }

    #[test]
    fn tree_shape_rejects_unsupported_pairs() {
        assert!(TreeShape::new(14, 63).is_err());
        assert!(TreeShape::new(31, 2048).is_err());
        assert!(TreeShape::new(5, 8).unwrap().with_canopy(5).is_err());
    }

    #[test]
    fn create_tree_config_layout() {
        let tree = [0x10u8; 32];
        let payer = [0x01u8; 32];
        let shape = TreeShape::new(14, 64).unwrap();
        let ix = create_tree_config(&tree, &payer, &payer, &shape, None).unwrap();

        assert_eq!(ix.program_id, BUBBLEGUM_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 7);
        assert_eq!(ix.accounts[0].pubkey, tree_config_address(&tree).unwrap());
        assert!(ix.accounts[0].is_writable && !ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[1].pubkey, tree);
        assert!(ix.accounts[1].is_writable && !ix.accounts[1].is_signer);
        assert!(ix.accounts[2].is_signer && ix.accounts[2].is_writable);
        assert!(ix.accounts[3].is_signer && !ix.accounts[3].is_writable);
        assert_eq!(ix.accounts[4].pubkey, SPL_NOOP_PROGRAM_ID);
        assert_eq!(ix.accounts[5].pubkey, SPL_ACCOUNT_COMPRESSION_PROGRAM_ID);
        assert_eq!(ix.accounts[6].pubkey, SYSTEM_PROGRAM_ID);

        assert_eq!(&ix.data[..8], &CREATE_TREE_CONFIG_DISCRIMINATOR);
        assert_eq!(&ix.data[8..12], &14u32.to_le_bytes());
        assert_eq!(&ix.data[12..16], &64u32.to_le_bytes());
        assert_eq!(&ix.data[16..], &[0]);

        let public = create_tree_config(&tree, &payer, &payer, &shape, Some(true)).unwrap();
        assert_eq!(&public.data[16..], &[1, 1]);
    }
}
