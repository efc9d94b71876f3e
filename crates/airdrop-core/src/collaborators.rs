//! Off-chain collaborators injected into the request boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ClientResult;

/// Public object storage for images and metadata documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a key derived from `name` and return its public URL.
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> ClientResult<String>;
}

/// A payment request URL plus the reference key used to find its transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub url: String,
    pub reference: String,
}

#[async_trait]
pub trait PaymentUrlEncoder: Send + Sync {
    async fn encode(&self, amount: f64) -> ClientResult<PaymentRequest>;

    /// Signature of the transaction that paid `reference`, once confirmed.
    async fn find_signature(&self, reference: &str) -> ClientResult<Option<String>>;
}

#[async_trait]
pub trait QrRenderer: Send + Sync {
    /// Render `text` as a QR code, returned as a data URL.
    async fn render(&self, text: &str) -> ClientResult<String>;
}
