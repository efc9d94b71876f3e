//! The service-owned authority key used to co-sign envelopes.
//!
//! The seed lives in a [`SecretBox`] and is zeroized on drop. Only the fee
//! payer's slot is ever left for the caller to fill.

use std::fmt;
use std::path::Path;

use chain_sol::address::bytes_to_address;
use chain_sol::transaction::SolTransaction;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroize;

use crate::error::AirdropError;

pub struct AuthorityKeypair {
    seed: SecretBox<[u8; 32]>,
    pubkey: [u8; 32],
}

impl AuthorityKeypair {
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let pubkey = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        let secret = SecretBox::new(Box::new(seed));
        seed.zeroize();
        Self {
            seed: secret,
            pubkey,
        }
    }

    /// Fresh key from the OS RNG, used for accounts created by a
    /// transaction such as a new Merkle tree.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let keypair = Self::from_seed(seed);
        seed.zeroize();
        keypair
    }

    /// Accepts a 32-byte seed or the 64-byte `seed || pubkey` keypair layout
    /// used by Solana CLI key files.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AirdropError> {
        let mut seed = [0u8; 32];
        match bytes.len() {
            32 => seed.copy_from_slice(bytes),
            64 => seed.copy_from_slice(&bytes[..32]),
            n => {
                return Err(AirdropError::Config(format!(
                    "authority key must be 32 or 64 bytes, got {n}"
                )))
            }
        }

        let keypair = Self::from_seed(seed);
        seed.zeroize();

        if bytes.len() == 64 && bytes[32..] != keypair.pubkey {
            return Err(AirdropError::Config(
                "authority keypair public half does not match its seed".into(),
            ));
        }
        Ok(keypair)
    }

    pub fn from_base58(encoded: &str) -> Result<Self, AirdropError> {
        let mut bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| AirdropError::Config(format!("authority key is not base58: {e}")))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Load a Solana CLI keypair file (a JSON array of 64 bytes).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AirdropError> {
        let path = path.as_ref();
        let mut content = std::fs::read_to_string(path)
            .map_err(|e| AirdropError::Config(format!("{}: {e}", path.display())))?;
        let parsed: Result<Vec<u8>, _> = serde_json::from_str(&content);
        content.zeroize();

        let mut bytes =
            parsed.map_err(|e| AirdropError::Config(format!("{}: {e}", path.display())))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    pub fn pubkey(&self) -> [u8; 32] {
        self.pubkey
    }

    /// Sign `tx` if this key is one of its required signers.
    ///
    /// Returns `false` and leaves `tx` untouched otherwise.
    pub fn co_sign(&self, tx: &mut SolTransaction) -> Result<bool, AirdropError> {
        if !tx.message.signer_keys().contains(&self.pubkey) {
            return Ok(false);
        }
        tx.sign_partial(self.seed.expose_secret())?;
        Ok(true)
    }
}

impl fmt::Debug for AuthorityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeypair")
            .field("pubkey", &bytes_to_address(&self.pubkey))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::transaction::{compile_legacy_message, SolAccountMeta, SolInstruction};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn sample_tx(payer: [u8; 32], authority: [u8; 32]) -> SolTransaction {
        let ix = SolInstruction {
            program_id: [0x50; 32],
            accounts: vec![
                SolAccountMeta::writable(payer, true),
                SolAccountMeta::readonly(authority, true),
                SolAccountMeta::writable([0x61; 32], false),
            ],
            data: vec![1, 2, 3],
        };
        let msg = compile_legacy_message(&[ix], &payer, &[0x42; 32]).unwrap();
        SolTransaction::new_unsigned(msg)
    }

    #[test]
    fn co_sign_fills_only_authority_slot() {
        let authority = AuthorityKeypair::from_seed([7u8; 32]);
        let payer = [0xFA; 32];
        let mut tx = sample_tx(payer, authority.pubkey());

        assert!(authority.co_sign(&mut tx).unwrap());
        assert_eq!(tx.open_signers(), vec![payer]);

        let slot = tx
            .message
            .signer_keys()
            .iter()
            .position(|k| *k == authority.pubkey())
            .unwrap();
        let vk = VerifyingKey::from_bytes(&authority.pubkey()).unwrap();
        let msg = chain_sol::serialize_message(&tx.message).unwrap();
        let sig = Signature::from_bytes(&tx.signatures[slot]);
        assert!(vk.verify(&msg, &sig).is_ok());
    }

    #[test]
    fn co_sign_skips_foreign_transactions() {
        let authority = AuthorityKeypair::from_seed([7u8; 32]);
        let mut tx = sample_tx([0xFA; 32], [0xFB; 32]);
        let before = tx.clone();
        assert!(!authority.co_sign(&mut tx).unwrap());
        assert_eq!(tx, before);
    }

    #[test]
    fn keypair_bytes_must_match_seed() {
        let good = AuthorityKeypair::from_seed([9u8; 32]);
        let mut bytes = [9u8; 64];
        bytes[32..].copy_from_slice(&good.pubkey());
        assert_eq!(AuthorityKeypair::from_bytes(&bytes).unwrap().pubkey(), good.pubkey());

        bytes[63] ^= 1;
        assert!(AuthorityKeypair::from_bytes(&bytes).is_err());
        assert!(AuthorityKeypair::from_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn base58_keypair_parses() {
        let good = AuthorityKeypair::from_seed([3u8; 32]);
        let mut bytes = vec![3u8; 32];
        bytes.extend_from_slice(&good.pubkey());
        let encoded = bs58::encode(&bytes).into_string();
        assert_eq!(AuthorityKeypair::from_base58(&encoded).unwrap().pubkey(), good.pubkey());
    }

    #[test]
    fn generated_keys_are_distinct() {
        let a = AuthorityKeypair::generate();
        let b = AuthorityKeypair::generate();
        assert_ne!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn debug_does_not_print_seed() {
        let key = AuthorityKeypair::from_seed([5u8; 32]);
        let printed = format!("{key:?}");
        assert!(printed.contains(&bytes_to_address(&key.pubkey())));
        assert!(!printed.contains("seed"));
    }
}
