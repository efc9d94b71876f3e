//! Final compilation, optional simulation, co-signing and transport encoding.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chain_sol::address::bytes_to_address;
use chain_sol::transaction::{
    deserialize_transaction, serialize_transaction, MessageVersion, SolTransaction,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assembler::{BatchAssembler, Envelope};
use crate::client::{bounded, ExternalChainClient};
use crate::config::SimulationPolicy;
use crate::error::AirdropError;
use crate::signer::AuthorityKeypair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    Legacy,
    V0,
}

impl From<MessageVersion> for WireVersion {
    fn from(v: MessageVersion) -> Self {
        match v {
            MessageVersion::Legacy => WireVersion::Legacy,
            MessageVersion::V0 => WireVersion::V0,
        }
    }
}

/// A transaction ready for the caller to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedEnvelope {
    pub index: usize,
    pub items: Vec<usize>,
    /// Base64 of the serialized transaction.
    pub transaction: String,
    pub version: WireVersion,
    /// Signers whose slot is still empty, fee payer first.
    pub open_signers: Vec<String>,
    pub size: usize,
    pub simulated: bool,
    pub units_consumed: Option<u64>,
}

pub struct TransactionEncoder {
    client: Arc<dyn ExternalChainClient>,
    policy: SimulationPolicy,
    co_signer: Option<Arc<AuthorityKeypair>>,
    timeout: Option<Duration>,
}

impl TransactionEncoder {
    pub fn new(client: Arc<dyn ExternalChainClient>, policy: SimulationPolicy) -> Self {
        Self {
            client,
            policy,
            co_signer: None,
            timeout: None,
        }
    }

    pub fn with_co_signer(mut self, co_signer: Option<Arc<AuthorityKeypair>>) -> Self {
        self.co_signer = co_signer;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn encode(&self, envelope: &Envelope) -> Result<EncodedEnvelope, AirdropError> {
        self.encode_with(envelope, self.policy).await
    }

    /// Encode under an explicit policy. Used for transactions that depend on
    /// an earlier one landing first and so cannot be simulated up front.
    pub async fn encode_with(
        &self,
        envelope: &Envelope,
        policy: SimulationPolicy,
    ) -> Result<EncodedEnvelope, AirdropError> {
        let anchor = bounded(self.timeout, self.client.get_latest_anchor()).await?;
        let message = BatchAssembler::compile_message(
            &envelope.instructions,
            &envelope.fee_payer,
            envelope.table.as_ref(),
            &anchor,
        )?;
        let version = message.version;
        let mut tx = SolTransaction::new_unsigned(message);

        if let Some(signer) = &self.co_signer {
            signer.co_sign(&mut tx)?;
        }
        let bytes = serialize_transaction(&tx)?;

        let units_consumed = match policy {
            SimulationPolicy::Never => None,
            SimulationPolicy::Always => {
                let outcome = bounded(self.timeout, self.client.simulate(&bytes)).await?;
                if let Some(error) = outcome.err {
                    warn!(
                        envelope = envelope.index,
                        %error,
                        logs = outcome.logs.len(),
                        "simulation failed"
                    );
                    return Err(AirdropError::SimulationFailed {
                        envelope: envelope.index,
                        error,
                        logs: outcome.logs,
                    });
                }
                outcome.units_consumed
            }
        };

        info!(
            envelope = envelope.index,
            items = envelope.items.len(),
            size = bytes.len(),
            version = ?version,
            "encoded envelope"
        );

        Ok(EncodedEnvelope {
            index: envelope.index,
            items: envelope.items.clone(),
            transaction: BASE64_STANDARD.encode(&bytes),
            version: version.into(),
            open_signers: tx.open_signers().iter().map(bytes_to_address).collect(),
            size: bytes.len(),
            simulated: policy == SimulationPolicy::Always,
            units_consumed,
        })
    }
}

/// Decode a base64 transport payload back into a transaction.
pub fn decode_envelope(encoded: &str) -> Result<SolTransaction, AirdropError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| AirdropError::Encoding(format!("base64: {e}")))?;
    Ok(deserialize_transaction(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ClientResult, Commitment, SimulationOutcome};
    use crate::registry::CompactionTable;
    use async_trait::async_trait;
    use chain_sol::transaction::{SolAccountMeta, SolInstruction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeChain {
        fail_simulation: bool,
        anchor_down: bool,
        simulations: AtomicUsize,
    }

    impl FakeChain {
        fn healthy() -> Self {
            Self {
                fail_simulation: false,
                anchor_down: false,
                simulations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExternalChainClient for FakeChain {
        async fn get_latest_anchor(&self) -> ClientResult<[u8; 32]> {
            if self.anchor_down {
                return Err(ClientError::new("blockhash not available"));
            }
            Ok([0x42; 32])
        }

        async fn get_slot(&self, _commitment: Commitment) -> ClientResult<u64> {
            Ok(1)
        }

        async fn get_account_table(&self, _address: &[u8; 32]) -> ClientResult<Option<CompactionTable>> {
            Ok(None)
        }

        async fn simulate(&self, _transaction: &[u8]) -> ClientResult<SimulationOutcome> {
            self.simulations.fetch_add(1, Ordering::SeqCst);
            if self.fail_simulation {
                return Ok(SimulationOutcome {
                    err: Some("InstructionError(0, Custom(6001))".into()),
                    logs: vec!["Program log: tree full".into()],
                    units_consumed: None,
                });
            }
            Ok(SimulationOutcome {
                err: None,
                logs: vec![],
                units_consumed: Some(42_000),
            })
        }
    }

    fn envelope(authority: [u8; 32]) -> Envelope {
        let ix = SolInstruction {
            program_id: [0x50; 32],
            accounts: vec![
                SolAccountMeta::writable([0xFA; 32], true),
                SolAccountMeta::readonly(authority, true),
                SolAccountMeta::writable([0x61; 32], false),
            ],
            data: vec![9; 16],
        };
        Envelope {
            index: 3,
            fee_payer: [0xFA; 32],
            instructions: vec![ix],
            items: vec![4, 5],
            table: None,
            serialized_size: 0,
            account_count: 0,
        }
    }

    #[tokio::test]
    async fn encodes_and_decodes_back_to_identical_bytes() {
        let encoder = TransactionEncoder::new(Arc::new(FakeChain::healthy()), SimulationPolicy::Always);
        let encoded = encoder.encode(&envelope([0xAB; 32])).await.unwrap();

        assert_eq!(encoded.index, 3);
        assert_eq!(encoded.items, vec![4, 5]);
        assert_eq!(encoded.version, WireVersion::Legacy);
        assert!(encoded.simulated);
        assert_eq!(encoded.units_consumed, Some(42_000));

        let tx = decode_envelope(&encoded.transaction).unwrap();
        assert_eq!(tx.message.recent_blockhash, [0x42; 32]);
        let reencoded = BASE64_STANDARD.encode(serialize_transaction(&tx).unwrap());
        assert_eq!(reencoded, encoded.transaction);
        assert_eq!(encoded.size, serialize_transaction(&tx).unwrap().len());
    }

    #[tokio::test]
    async fn open_signers_list_fee_payer_first() {
        let encoder = TransactionEncoder::new(Arc::new(FakeChain::healthy()), SimulationPolicy::Never);
        let encoded = encoder.encode(&envelope([0xAB; 32])).await.unwrap();
        assert_eq!(
            encoded.open_signers,
            vec![bytes_to_address(&[0xFA; 32]), bytes_to_address(&[0xAB; 32])]
        );
    }

    #[tokio::test]
    async fn co_signer_leaves_only_fee_payer_open() {
        let authority = Arc::new(AuthorityKeypair::from_seed([7u8; 32]));
        let encoder = TransactionEncoder::new(Arc::new(FakeChain::healthy()), SimulationPolicy::Never)
            .with_co_signer(Some(authority.clone()));

        let encoded = encoder.encode(&envelope(authority.pubkey())).await.unwrap();
        assert_eq!(encoded.open_signers, vec![bytes_to_address(&[0xFA; 32])]);
    }

    #[tokio::test]
    async fn never_policy_skips_simulation() {
        let chain = Arc::new(FakeChain::healthy());
        let encoder = TransactionEncoder::new(chain.clone(), SimulationPolicy::Never);
        let encoded = encoder.encode(&envelope([0xAB; 32])).await.unwrap();
        assert!(!encoded.simulated);
        assert_eq!(chain.simulations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn simulation_error_carries_logs() {
        let chain = FakeChain {
            fail_simulation: true,
            ..FakeChain::healthy()
        };
        let encoder = TransactionEncoder::new(Arc::new(chain), SimulationPolicy::Always);
        let err = encoder.encode(&envelope([0xAB; 32])).await.unwrap_err();
        match err {
            AirdropError::SimulationFailed {
                envelope,
                error,
                logs,
            } => {
                assert_eq!(envelope, 3);
                assert!(error.contains("6001"));
                assert_eq!(logs, vec!["Program log: tree full".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_anchor_is_chain_unavailable() {
        let chain = FakeChain {
            anchor_down: true,
            ..FakeChain::healthy()
        };
        let encoder = TransactionEncoder::new(Arc::new(chain), SimulationPolicy::Never);
        let err = encoder.encode(&envelope([0xAB; 32])).await.unwrap_err();
        assert!(matches!(err, AirdropError::ChainUnavailable(_)));
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(matches!(
            decode_envelope("***"),
            Err(AirdropError::Encoding(_))
        ));
    }
}
