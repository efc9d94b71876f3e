//! Solana transaction wire format: legacy and v0 messages.
//!
//! We build Solana transactions entirely by hand, no `solana-sdk` dependency.
//! The wire format is a compact binary layout documented here:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     [version prefix]      u8, 0x80 | version (v0 only, absent for legacy)
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!     [num_lookups          compact-u16]          (v0 only)
//!     [lookups[]]                                 (v0 only)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//!
//! Address table lookup:
//!   table_address           32 bytes
//!   num_writable            compact-u16
//!   writable_indexes        u8 * num_writable
//!   num_readonly            compact-u16
//!   readonly_indexes        u8 * num_readonly
//! ```
//!
//! Instruction account indices in a v0 message address the concatenation
//! `static keys ++ writable loaded keys ++ readonly loaded keys`.

use ed25519_dalek::Signer;
use zeroize::Zeroize;

use crate::error::SolError;
use crate::lookup_table::AddressLookupTableAccount;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// The Solana System Program public key: 32 zero bytes.
/// Base58: `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Maximum serialized transaction size (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

/// Maximum number of accounts a single transaction may lock.
pub const MAX_TX_ACCOUNT_LOCKS: usize = 64;

/// Upper bound on instruction payload length. Nothing larger can ever fit
/// inside a packet.
pub const MAX_INSTRUCTION_DATA_LEN: usize = PACKET_DATA_SIZE;

/// Ed25519 signature width.
pub const SIGNATURE_LEN: usize = 64;

/// High bit set on the first message byte marks a versioned message.
pub const MESSAGE_VERSION_PREFIX: u8 = 0x80;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let Some(&byte) = data.get(consumed) else {
            return Err(SolError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            ));
        };
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            // A zero continuation is an alias of a shorter encoding.
            if consumed > 1 && byte == 0 {
                return Err(SolError::SerializationError(
                    "non-minimal compact-u16 encoding".into(),
                ));
            }
            break;
        }
        if consumed >= 3 {
            return Err(SolError::SerializationError(
                "compact-u16 longer than 3 bytes".into(),
            ));
        }
    }

    if value > u16::MAX as u32 {
        return Err(SolError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

fn push_compact_len(buf: &mut Vec<u8>, len: usize, what: &str) -> Result<(), SolError> {
    let len = u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("too many {what}: {len}")))?;
    buf.extend_from_slice(&encode_compact_u16(len));
    Ok(())
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn writable(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A Solana instruction (before it is compiled into a message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// Which message layout a transaction uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V0,
}

/// The three-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing static accounts are read-only.
    pub num_readonly_unsigned: u8,
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the message's account list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index into `account_keys` for the program to invoke.
    pub program_id_index: u8,
    /// Indices for each account the instruction reads/writes.
    pub account_indices: Vec<u8>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

/// Accounts a v0 message loads from one address lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAddressTableLookup {
    pub account_key: [u8; 32],
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

/// A compiled message, legacy or v0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolMessage {
    pub version: MessageVersion,
    pub header: MessageHeader,
    /// Static account keys, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<[u8; 32]>,
    /// Recency anchor (recent blockhash).
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
    /// Always empty for legacy messages.
    pub address_table_lookups: Vec<MessageAddressTableLookup>,
}

impl SolMessage {
    /// The accounts whose signatures this message requires, in slot order.
    pub fn signer_keys(&self) -> &[[u8; 32]] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    /// Number of accounts loaded from lookup tables.
    pub fn loaded_account_count(&self) -> usize {
        self.address_table_lookups
            .iter()
            .map(|l| l.writable_indexes.len() + l.readonly_indexes.len())
            .sum()
    }

    /// Static plus table-loaded accounts; what the runtime locks.
    pub fn total_account_count(&self) -> usize {
        self.account_keys.len() + self.loaded_account_count()
    }
}

/// A complete Solana transaction (unsigned or partially signed).
///
/// An all-zero signature marks an open signer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
    pub message: SolMessage,
}

impl SolTransaction {
    /// Wrap a message with one empty signature slot per required signer.
    pub fn new_unsigned(message: SolMessage) -> Self {
        let slots = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![[0u8; SIGNATURE_LEN]; slots],
            message,
        }
    }

    /// Signer accounts whose slot is still empty.
    pub fn open_signers(&self) -> Vec<[u8; 32]> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.iter().all(|b| *b == 0))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Sign with the given Ed25519 seed, writing into the slot that belongs
    /// to the derived public key. Other slots are left untouched.
    pub fn sign_partial(&mut self, private_key: &[u8; 32]) -> Result<[u8; 32], SolError> {
        let mut seed = *private_key;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        let our_pubkey = signing_key.verifying_key().to_bytes();

        let slot = self
            .message
            .signer_keys()
            .iter()
            .position(|k| *k == our_pubkey)
            .ok_or_else(|| {
                SolError::SigningError("signing key not found in transaction signers".into())
            })?;

        if self.signatures.len() != self.message.header.num_required_signatures as usize {
            return Err(SolError::SigningError(format!(
                "transaction has {} signature slots, message requires {}",
                self.signatures.len(),
                self.message.header.num_required_signatures
            )));
        }

        let message_bytes = serialize_message(&self.message)?;
        let signature = signing_key.sign(&message_bytes);
        self.signatures[slot] = signature.to_bytes();

        Ok(our_pubkey)
    }
}

// ---------------------------------------------------------------------------
// Message compilation
// ---------------------------------------------------------------------------

struct AccountEntry {
    pubkey: [u8; 32],
    is_signer: bool,
    is_writable: bool,
    is_invoked: bool,
}

impl AccountEntry {
    fn rank(&self) -> u8 {
        match (self.is_signer, self.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
}

/// Collect unique account keys with merged permission bits, fee payer first.
fn collect_entries(instructions: &[SolInstruction], fee_payer: &[u8; 32]) -> Vec<AccountEntry> {
    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool, invoked: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
            entry.is_invoked |= invoked;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
                is_invoked: invoked,
            });
        }
    };

    upsert(*fee_payer, true, true, false);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable, false);
        }
        upsert(ix.program_id, false, false, true);
    }

    entries
}

fn count_where(
    entries: &[AccountEntry],
    pred: impl Fn(&AccountEntry) -> bool,
) -> Result<u8, SolError> {
    u8::try_from(entries.iter().filter(|e| pred(e)).count())
        .map_err(|_| SolError::MessageCompileError("header count exceeds 255".into()))
}

fn header_for(entries: &[AccountEntry]) -> Result<MessageHeader, SolError> {
    Ok(MessageHeader {
        num_required_signatures: count_where(entries, |e| e.is_signer)?,
        num_readonly_signed: count_where(entries, |e| e.is_signer && !e.is_writable)?,
        num_readonly_unsigned: count_where(entries, |e| !e.is_signer && !e.is_writable)?,
    })
}

fn compile_instructions(
    instructions: &[SolInstruction],
    keys: &[[u8; 32]],
) -> Result<Vec<CompiledInstruction>, SolError> {
    let index_of = |key: &[u8; 32]| -> Result<u8, SolError> {
        let pos = keys.iter().position(|k| k == key).ok_or_else(|| {
            SolError::MessageCompileError("account not in message keys".into())
        })?;
        u8::try_from(pos).map_err(|_| {
            SolError::MessageCompileError(format!("account index {pos} exceeds 255"))
        })
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        if ix.data.len() > MAX_INSTRUCTION_DATA_LEN {
            return Err(SolError::MessageCompileError(format!(
                "instruction data of {} bytes exceeds {MAX_INSTRUCTION_DATA_LEN}",
                ix.data.len()
            )));
        }

        let program_id_index = index_of(&ix.program_id)?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey))
            .collect::<Result<Vec<_>, _>>()?;

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(compiled)
}

/// Compile a legacy message from a set of instructions with a single fee payer.
///
/// The fee payer is always the first signer and is placed at index 0 in the
/// account keys.
pub fn compile_legacy_message(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<SolMessage, SolError> {
    let mut entries = collect_entries(instructions, fee_payer);
    // Stable: within a category insertion order is kept, so the fee payer
    // stays at index 0.
    entries.sort_by_key(AccountEntry::rank);

    let header = header_for(&entries)?;
    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();
    let compiled = compile_instructions(instructions, &account_keys)?;

    Ok(SolMessage {
        version: MessageVersion::Legacy,
        header,
        account_keys,
        recent_blockhash: *recent_blockhash,
        instructions: compiled,
        address_table_lookups: Vec::new(),
    })
}

/// Compile a v0 message, loading eligible accounts from lookup tables.
///
/// Signers and invoked programs always stay static. Every other account
/// present in a table is loaded through the first table that contains it.
/// Tables that end up contributing nothing are omitted.
pub fn compile_v0_message(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
    lookup_tables: &[AddressLookupTableAccount],
) -> Result<SolMessage, SolError> {
    let mut entries = collect_entries(instructions, fee_payer);

    let mut lookups = Vec::new();
    let mut loaded_writable = Vec::new();
    let mut loaded_readonly = Vec::new();

    for table in lookup_tables {
        let mut writable_indexes = Vec::new();
        let mut readonly_indexes = Vec::new();

        entries.retain(|e| {
            if e.is_signer || e.is_invoked {
                return true;
            }
            let Some(index) = table.index_of(&e.pubkey) else {
                return true;
            };
            if e.is_writable {
                writable_indexes.push(index);
                loaded_writable.push(e.pubkey);
            } else {
                readonly_indexes.push(index);
                loaded_readonly.push(e.pubkey);
            }
            false
        });

        if !writable_indexes.is_empty() || !readonly_indexes.is_empty() {
            lookups.push(MessageAddressTableLookup {
                account_key: table.key,
                writable_indexes,
                readonly_indexes,
            });
        }
    }

    entries.sort_by_key(AccountEntry::rank);

    let header = header_for(&entries)?;
    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();

    let mut all_keys = account_keys.clone();
    all_keys.extend(loaded_writable);
    all_keys.extend(loaded_readonly);
    let compiled = compile_instructions(instructions, &all_keys)?;

    Ok(SolMessage {
        version: MessageVersion::V0,
        header,
        account_keys,
        recent_blockhash: *recent_blockhash,
        instructions: compiled,
        address_table_lookups: lookups,
    })
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize the message (the bytes that get signed).
pub fn serialize_message(msg: &SolMessage) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(512);

    match msg.version {
        MessageVersion::Legacy => {
            if !msg.address_table_lookups.is_empty() {
                return Err(SolError::SerializationError(
                    "legacy message cannot carry address table lookups".into(),
                ));
            }
        }
        MessageVersion::V0 => buf.push(MESSAGE_VERSION_PREFIX),
    }

    buf.push(msg.header.num_required_signatures);
    buf.push(msg.header.num_readonly_signed);
    buf.push(msg.header.num_readonly_unsigned);

    push_compact_len(&mut buf, msg.account_keys.len(), "account keys")?;
    for key in &msg.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&msg.recent_blockhash);

    push_compact_len(&mut buf, msg.instructions.len(), "instructions")?;
    for ix in &msg.instructions {
        buf.push(ix.program_id_index);

        push_compact_len(&mut buf, ix.account_indices.len(), "instruction accounts")?;
        buf.extend_from_slice(&ix.account_indices);

        push_compact_len(&mut buf, ix.data.len(), "instruction data bytes")?;
        buf.extend_from_slice(&ix.data);
    }

    if msg.version == MessageVersion::V0 {
        push_compact_len(&mut buf, msg.address_table_lookups.len(), "table lookups")?;
        for lookup in &msg.address_table_lookups {
            buf.extend_from_slice(&lookup.account_key);
            push_compact_len(&mut buf, lookup.writable_indexes.len(), "writable indexes")?;
            buf.extend_from_slice(&lookup.writable_indexes);
            push_compact_len(&mut buf, lookup.readonly_indexes.len(), "readonly indexes")?;
            buf.extend_from_slice(&lookup.readonly_indexes);
        }
    }

    Ok(buf)
}

/// Serialize a transaction into its wire format.
pub fn serialize_transaction(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let message_bytes = serialize_message(&tx.message)?;

    let mut wire = Vec::with_capacity(3 + tx.signatures.len() * SIGNATURE_LEN + message_bytes.len());
    push_compact_len(&mut wire, tx.signatures.len(), "signatures")?;
    for sig in &tx.signatures {
        wire.extend_from_slice(sig);
    }
    wire.extend_from_slice(&message_bytes);

    Ok(wire)
}

/// Cursor over a wire buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek_u8(&self) -> Result<u8, SolError> {
        self.data.get(self.pos).copied().ok_or_else(|| {
            SolError::SerializationError("unexpected end of data".into())
        })
    }

    fn read_u8(&mut self) -> Result<u8, SolError> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    fn read_compact_u16(&mut self) -> Result<usize, SolError> {
        let (value, consumed) = decode_compact_u16(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value as usize)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], SolError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(SolError::SerializationError(format!(
                "need {len} bytes at offset {}, only {} left",
                self.pos,
                self.data.len() - self.pos
            )));
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_index_list(&mut self) -> Result<Vec<u8>, SolError> {
        let len = self.read_compact_u16()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn read_message(r: &mut Reader<'_>) -> Result<SolMessage, SolError> {
    let first = r.peek_u8()?;
    let version = if first & MESSAGE_VERSION_PREFIX != 0 {
        r.read_u8()?;
        let v = first & !MESSAGE_VERSION_PREFIX;
        if v != 0 {
            return Err(SolError::SerializationError(format!(
                "unsupported message version {v}"
            )));
        }
        MessageVersion::V0
    } else {
        MessageVersion::Legacy
    };

    let header = MessageHeader {
        num_required_signatures: r.read_u8()?,
        num_readonly_signed: r.read_u8()?,
        num_readonly_unsigned: r.read_u8()?,
    };

    let num_keys = r.read_compact_u16()?;
    let mut account_keys = Vec::with_capacity(num_keys);
    for _ in 0..num_keys {
        account_keys.push(r.read_array::<32>()?);
    }

    let recent_blockhash = r.read_array::<32>()?;

    let num_ixs = r.read_compact_u16()?;
    let mut instructions = Vec::with_capacity(num_ixs);
    for _ in 0..num_ixs {
        let program_id_index = r.read_u8()?;
        let account_indices = r.read_index_list()?;
        let data_len = r.read_compact_u16()?;
        let data = r.read_bytes(data_len)?.to_vec();
        instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    let mut address_table_lookups = Vec::new();
    if version == MessageVersion::V0 {
        let num_lookups = r.read_compact_u16()?;
        for _ in 0..num_lookups {
            address_table_lookups.push(MessageAddressTableLookup {
                account_key: r.read_array::<32>()?,
                writable_indexes: r.read_index_list()?,
                readonly_indexes: r.read_index_list()?,
            });
        }
    }

    Ok(SolMessage {
        version,
        header,
        account_keys,
        recent_blockhash,
        instructions,
        address_table_lookups,
    })
}

/// Parse message bytes as produced by [`serialize_message`].
pub fn deserialize_message(data: &[u8]) -> Result<SolMessage, SolError> {
    let mut r = Reader::new(data);
    let msg = read_message(&mut r)?;
    if r.remaining() != 0 {
        return Err(SolError::SerializationError(format!(
            "{} trailing bytes after message",
            r.remaining()
        )));
    }
    Ok(msg)
}

/// Parse wire bytes as produced by [`serialize_transaction`].
pub fn deserialize_transaction(data: &[u8]) -> Result<SolTransaction, SolError> {
    let mut r = Reader::new(data);

    let num_sigs = r.read_compact_u16()?;
    let mut signatures = Vec::with_capacity(num_sigs);
    for _ in 0..num_sigs {
        signatures.push(r.read_array::<SIGNATURE_LEN>()?);
    }

    let message = read_message(&mut r)?;
    if r.remaining() != 0 {
        return Err(SolError::SerializationError(format!(
            "{} trailing bytes after transaction",
            r.remaining()
        )));
    }
    if signatures.len() != message.header.num_required_signatures as usize {
        return Err(SolError::SerializationError(format!(
            "{} signatures for {} required signers",
            signatures.len(),
            message.header.num_required_signatures
        )));
    }

    Ok(SolTransaction {
        signatures,
        message,
    })
}
