//! Request boundary: validates bodies, drives the pipeline and the off-chain
//! collaborators, and wraps every result in a [`ResponseEnvelope`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::collaborators::{BlobStore, PaymentUrlEncoder, QrRenderer};
use crate::error::AirdropError;
use crate::pipeline::{AirdropPipeline, BatchOutcome, MintBatchRequest, TablePlan, TreePlan};
use crate::validation::{OperationKind, RequestSchema};

/// `{data, message}` body plus the status the transport should use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope<T> {
    pub data: Option<T>,
    pub message: String,
    #[serde(skip)]
    pub status: u16,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            message: message.into(),
            status: 200,
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: message.into(),
            status: 200,
        }
    }

    /// Validation problems are reported as-is; anything else gets `prefix`.
    pub fn failure(err: &AirdropError, prefix: &str) -> Self {
        let message = match err {
            AirdropError::InvalidRequest(m) => m.clone(),
            other => format!("{prefix}: {other}"),
        };
        Self {
            data: None,
            message,
            status: err.status_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayUrlData {
    pub qr_code_data: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMetadata {
    pub image_url: String,
    pub metadata_url: String,
}

pub struct AirdropService {
    pipeline: AirdropPipeline,
    blobs: Arc<dyn BlobStore>,
    payments: Arc<dyn PaymentUrlEncoder>,
    qr: Arc<dyn QrRenderer>,
}

impl AirdropService {
    pub fn new(
        pipeline: AirdropPipeline,
        blobs: Arc<dyn BlobStore>,
        payments: Arc<dyn PaymentUrlEncoder>,
        qr: Arc<dyn QrRenderer>,
    ) -> Self {
        Self {
            pipeline,
            blobs,
            payments,
            qr,
        }
    }

    pub fn pipeline(&self) -> &AirdropPipeline {
        &self.pipeline
    }

    pub async fn mint_compressed(&self, body: &Value) -> ResponseEnvelope<BatchOutcome> {
        const PREFIX: &str = "Error processing the request";

        let request = match parse_request(OperationKind::MintCompressed, body) {
            Ok(r) => r,
            Err(e) => return ResponseEnvelope::failure(&e, PREFIX),
        };

        match self.pipeline.run(&request).await {
            Ok(outcome) if outcome.envelopes.is_empty() && outcome.interrupted.is_some() => {
                let reason = outcome.interrupted.clone().unwrap_or_default();
                let mut response =
                    ResponseEnvelope::failure(&AirdropError::ChainUnavailable(reason), PREFIX);
                response.data = Some(outcome);
                response
            }
            Ok(outcome) => ResponseEnvelope::ok(
                outcome,
                "Compressed NFTs minted and transaction generated successfully.",
            ),
            Err(e) => {
                error!(error = %e, "mint batch failed");
                ResponseEnvelope::failure(&e, PREFIX)
            }
        }
    }

    pub async fn prepare_table(&self, body: &Value) -> ResponseEnvelope<TablePlan> {
        const PREFIX: &str = "Error creating lookup table";

        let request = match parse_request(OperationKind::PrepareTable, body) {
            Ok(r) => r,
            Err(e) => return ResponseEnvelope::failure(&e, PREFIX),
        };
        match self.pipeline.prepare_table(&request).await {
            Ok(plan) => ResponseEnvelope::ok(plan, "Address lookup table transactions generated successfully."),
            Err(e) => {
                error!(error = %e, "table preparation failed");
                ResponseEnvelope::failure(&e, PREFIX)
            }
        }
    }

    pub async fn create_tree(&self, body: &Value) -> ResponseEnvelope<TreePlan> {
        const PREFIX: &str = "Error creating merkle tree";

        if let Err(e) = RequestSchema::for_operation(OperationKind::CreateTree).validate(body) {
            return ResponseEnvelope::failure(&e, PREFIX);
        }
        let payer = body["fromPubKey"].as_str().unwrap_or_default();

        match self.pipeline.prepare_tree(payer).await {
            Ok(plan) => ResponseEnvelope::ok(plan, "Merkle tree transaction generated successfully."),
            Err(e) => {
                error!(error = %e, "tree preparation failed");
                ResponseEnvelope::failure(&e, PREFIX)
            }
        }
    }

    /// Upload an image, then a metadata document pointing at it.
    pub async fn upload_metadata(
        &self,
        image: Vec<u8>,
        content_type: &str,
    ) -> ResponseEnvelope<UploadedMetadata> {
        const PREFIX: &str = "Error processing the request";

        if image.is_empty() {
            return ResponseEnvelope::failure(
                &AirdropError::InvalidRequest("No file provided.".into()),
                PREFIX,
            );
        }
        match self.upload_pair(image, content_type).await {
            Ok(uploaded) => {
                info!(metadata_url = %uploaded.metadata_url, "metadata uploaded");
                ResponseEnvelope::ok(uploaded, "File and metadata uploaded successfully.")
            }
            Err(e) => ResponseEnvelope::failure(&e, PREFIX),
        }
    }

    async fn upload_pair(
        &self,
        image: Vec<u8>,
        content_type: &str,
    ) -> Result<UploadedMetadata, AirdropError> {
        let image_url = self
            .blobs
            .upload("image", image, content_type)
            .await
            .map_err(|e| AirdropError::Upstream(e.to_string()))?;

        let template = &self.pipeline.config().metadata;
        let document = json!({
            "name": template.name_prefix,
            "symbol": template.symbol,
            "description": template.description,
            "image": image_url,
            "attributes": [
                { "trait_type": "Airdrop", "value": "Compressed NFT" },
            ],
        });
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| AirdropError::Encoding(e.to_string()))?;

        let metadata_url = self
            .blobs
            .upload("metadata.json", bytes, "application/json")
            .await
            .map_err(|e| AirdropError::Upstream(e.to_string()))?;

        Ok(UploadedMetadata {
            image_url,
            metadata_url,
        })
    }

    pub async fn create_pay_url(&self, body: &Value) -> ResponseEnvelope<PayUrlData> {
        const PREFIX: &str = "Error";

        if let Err(e) = RequestSchema::for_operation(OperationKind::CreatePayUrl).validate(body) {
            return ResponseEnvelope::failure(&e, PREFIX);
        }
        let amount = body["amount"].as_f64().unwrap_or_default();

        let result = async {
            let request = self
                .payments
                .encode(amount)
                .await
                .map_err(|e| AirdropError::Upstream(e.to_string()))?;
            let qr_code_data = self
                .qr
                .render(&request.url)
                .await
                .map_err(|e| AirdropError::Upstream(e.to_string()))?;
            Ok::<_, AirdropError>(PayUrlData {
                qr_code_data,
                reference: request.reference,
            })
        }
        .await;

        match result {
            Ok(data) => ResponseEnvelope::ok(
                data,
                "QR Code generated successfully. Please complete the payment.",
            ),
            Err(e) => ResponseEnvelope::failure(&e, PREFIX),
        }
    }

    pub async fn transaction_status(&self, body: &Value) -> ResponseEnvelope<String> {
        const PREFIX: &str = "Error";

        if let Err(e) = RequestSchema::for_operation(OperationKind::TransactionStatus).validate(body)
        {
            return ResponseEnvelope::failure(&e, PREFIX);
        }
        let reference = body["reference"].as_str().unwrap_or_default().trim();

        match self.payments.find_signature(reference).await {
            Ok(Some(signature)) => {
                ResponseEnvelope::ok(signature, "Transaction confirmed successfully.")
            }
            Ok(None) => ResponseEnvelope::empty("Transaction not confirmed yet. Please wait..."),
            Err(e) => ResponseEnvelope::failure(&AirdropError::Upstream(e.to_string()), PREFIX),
        }
    }
}

fn parse_request(kind: OperationKind, body: &Value) -> Result<MintBatchRequest, AirdropError> {
    RequestSchema::for_operation(kind).validate(body)?;
    serde_json::from_value(body.clone()).map_err(|e| AirdropError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_validation_message_verbatim() {
        let err = AirdropError::InvalidRequest("No wallets provided for airdrop.".into());
        let response: ResponseEnvelope<()> = ResponseEnvelope::failure(&err, "Error");
        assert_eq!(response.message, "No wallets provided for airdrop.");
        assert_eq!(response.status, 400);
        assert!(!response.is_success());
    }

    #[test]
    fn failure_prefixes_other_errors() {
        let err = AirdropError::TableNotFound("T4bLe".into());
        let response: ResponseEnvelope<()> =
            ResponseEnvelope::failure(&err, "Error processing the request");
        assert_eq!(
            response.message,
            "Error processing the request: compaction table not found: T4bLe"
        );
        assert_eq!(response.status, 404);
    }

    #[test]
    fn status_is_not_serialized() {
        let response = ResponseEnvelope::ok(1u8, "done");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"data": 1, "message": "done"}));
    }
}
