//! The chain collaborator: anchors, slots, table lookups and simulation.
//!
//! Implementations wrap an RPC transport; tests use in-memory fakes.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AirdropError;
use crate::registry::CompactionTable;

/// Failure reported by a collaborator implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

/// Result of dry-running a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    /// Simulator error, `None` on success.
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

#[async_trait]
pub trait ExternalChainClient: Send + Sync {
    /// Recent blockhash used as the envelope's replay anchor.
    async fn get_latest_anchor(&self) -> ClientResult<[u8; 32]>;

    async fn get_slot(&self, commitment: Commitment) -> ClientResult<u64>;

    /// Current snapshot of the lookup table at `address`, `None` if absent.
    async fn get_account_table(&self, address: &[u8; 32]) -> ClientResult<Option<CompactionTable>>;

    /// Dry-run a serialized transaction. Signatures are not verified.
    async fn simulate(&self, transaction: &[u8]) -> ClientResult<SimulationOutcome>;
}

/// Await a client call, mapping failures and an elapsed `timeout` to
/// [`AirdropError::ChainUnavailable`].
pub async fn bounded<T, F>(timeout: Option<Duration>, call: F) -> Result<T, AirdropError>
where
    F: Future<Output = ClientResult<T>>,
{
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            AirdropError::ChainUnavailable(format!("no response within {}ms", limit.as_millis()))
        })?,
        None => call.await,
    };
    result.map_err(AirdropError::from)
}
