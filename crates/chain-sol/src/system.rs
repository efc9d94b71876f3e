//! System program instructions and rent.

use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

const SYSTEM_CREATE_ACCOUNT_IX_INDEX: u32 = 0;

/// Bytes of account metadata the runtime charges rent for on top of the data.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Default cluster rent: lamports per byte-year and the exemption threshold
/// in years.
pub const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
pub const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Minimum balance that keeps an account of `data_len` bytes rent exempt.
pub fn rent_exempt_minimum(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

/// Build a System Program `CreateAccount` instruction.
///
/// Both `from` and `new_account` must sign.
pub fn create_account(
    from: &[u8; 32],
    new_account: &[u8; 32],
    lamports: u64,
    space: u64,
    owner: &[u8; 32],
) -> Result<SolInstruction, SolError> {
    if from == new_account {
        return Err(SolError::InstructionBuildError(
            "new account must differ from the funding account".into(),
        ));
    }

    // 4 (index) + 8 (lamports) + 8 (space) + 32 (owner)
    let mut data = Vec::with_capacity(52);
    data.extend_from_slice(&SYSTEM_CREATE_ACCOUNT_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner);

    Ok(SolInstruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*from, true),
            SolAccountMeta::writable(*new_account, true),
        ],
        data,
    })
}
