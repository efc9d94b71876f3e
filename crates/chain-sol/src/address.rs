//! Solana address encoding and program-derived addresses.
//!
//! Addresses are Base58-encoded 32-byte values. Wallet addresses are Ed25519
//! public keys; program-derived addresses (PDAs) are SHA-256 outputs that are
//! deliberately *off* the Ed25519 curve so no private key can exist for them.

use sha2::{Digest, Sha256};

use crate::error::SolError;

/// Width in bytes of every account address on the wire.
pub const ADDRESS_LEN: usize = 32;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum length of a single PDA seed.
pub const MAX_SEED_LEN: usize = 32;

/// Decode a Solana address string to its 32-byte representation.
///
/// Returns an error if the address is not valid Base58 or does not decode
/// to exactly 32 bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })?;

    Ok(arr)
}

/// Encode 32 bytes as a Solana address (Base58 string).
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Validate a Solana address string.
pub fn validate_address(address: &str) -> Result<(), SolError> {
    address_to_bytes(address).map(|_| ())
}

/// Find a valid Program Derived Address (PDA) for the given seeds and program.
///
/// Iterates bump seeds from 255 down to 0, computing
/// `SHA-256(seed_0 || seed_1 || ... || bump || program_id || "ProgramDerivedAddress")`
/// and returning the first result that is NOT a valid Ed25519 point.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &[u8; 32],
) -> Result<([u8; 32], u8), SolError> {
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(SolError::InvalidAddress(format!(
            "PDA seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }

    for bump in (0u8..=255).rev() {
        if let Some(address) = try_create_program_address(seeds, &[bump], program_id) {
            return Ok((address, bump));
        }
    }

    Err(SolError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Attempt to create a PDA from seeds + bump + program_id.
///
/// Returns `None` if the derived point falls on the curve.
fn try_create_program_address(
    seeds: &[&[u8]],
    bump_seed: &[u8],
    program_id: &[u8; 32],
) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();

    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(bump_seed);
    hasher.update(program_id);
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }

    Some(hash)
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The System Program address is 32 zero bytes, which encodes to
    /// "11111111111111111111111111111111" in Base58.
    #[test]
    fn system_program_address() {
        let zeros = [0u8; 32];
        assert_eq!(bytes_to_address(&zeros), "11111111111111111111111111111111");
    }

    #[test]
    fn roundtrip_encode_decode() {
        let address = "BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY";
        let bytes = address_to_bytes(address).unwrap();
        assert_eq!(bytes_to_address(&bytes), address);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let bytes = address_to_bytes("  11111111111111111111111111111111\n").unwrap();
        assert_eq!(bytes, [0u8; 32]);
    }

    #[test]
    fn validate_garbage_returns_error() {
        assert!(validate_address("not-a-valid-address!!!").is_err());
    }

    #[test]
    fn validate_too_short_returns_error() {
        // "1" decodes to a single zero byte.
        let err = validate_address("1").unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes"));
    }

    #[test]
    fn validate_zero_char_is_rejected() {
        // '0' is not part of the Base58 alphabet.
        assert!(validate_address("0000000000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn pda_is_not_on_curve() {
        let program = [0x11u8; 32];
        let (pda, _bump) = find_program_address(&[b"seed", &[0xAA; 32]], &program).unwrap();
        assert!(!is_on_curve(&pda));
    }

    #[test]
    fn pda_derivation_is_deterministic() {
        let program = [0x22u8; 32];
        let a = find_program_address(&[b"collection_cpi"], &program).unwrap();
        let b = find_program_address(&[b"collection_cpi"], &program).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pda_rejects_oversized_seed() {
        let program = [0x22u8; 32];
        assert!(find_program_address(&[&[0u8; 33]], &program).is_err());
    }

    #[test]
    fn is_on_curve_accepts_basepoint() {
        let basepoint: [u8; 32] = [
            0x58, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
            0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x66,
            0x66, 0x66, 0x66, 0x66,
        ];
        assert!(is_on_curve(&basepoint));
    }
}
