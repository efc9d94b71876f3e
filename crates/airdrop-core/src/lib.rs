//! Compressed NFT airdrop batching.
//!
//! A request names a payer, a Merkle tree, a collection and a list of
//! recipient wallets. The pipeline compiles one Bubblegum mint per
//! recipient, packs the instructions into as few transactions as the
//! protocol ceilings allow (optionally compacting accounts through a lookup
//! table), and returns each transaction base64-encoded for the payer to
//! sign. Bad recipients and oversized instructions are rejected one by one
//! without failing their neighbours.

pub mod assembler;
pub mod client;
pub mod collaborators;
pub mod compiler;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod signer;
pub mod telemetry;
pub mod types;
pub mod validation;

pub use assembler::{Assembly, BatchAssembler, Envelope};
pub use client::{ClientError, ClientResult, Commitment, ExternalChainClient, SimulationOutcome};
pub use collaborators::{BlobStore, PaymentRequest, PaymentUrlEncoder, QrRenderer};
pub use compiler::{CompiledItem, OperationCompiler};
pub use config::{
    MetadataTemplate, PipelineConfig, SimulationPolicy, TransactionLimits, TreeSettings,
};
pub use encoder::{decode_envelope, EncodedEnvelope, TransactionEncoder, WireVersion};
pub use error::AirdropError;
pub use pipeline::{
    AirdropPipeline, BatchOutcome, EnvelopeFailure, MintBatchRequest, TablePlan, TreePlan,
};
pub use registry::{AddressRegistry, CompactionTable, CompactionTableBuilder};
pub use service::{AirdropService, ResponseEnvelope};
pub use signer::AuthorityKeypair;
pub use types::{Batch, BatchItem, ItemStatus, OperationDescriptor, Rejection, RejectionKind};
