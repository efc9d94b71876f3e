use chain_sol::error::SolError;
use thiserror::Error;

use crate::client::ClientError;

/// Batch-, envelope- and request-level failures.
///
/// Per-item problems are not errors: they become [`crate::types::Rejection`]
/// records on the batch and never abort sibling items.
#[derive(Debug, Error)]
pub enum AirdropError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("compaction table {table} cannot hold {requested} addresses (capacity {capacity})")]
    TableCapacityExceeded {
        table: String,
        requested: usize,
        capacity: usize,
    },

    #[error("compaction table not found: {0}")]
    TableNotFound(String),

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("simulation failed for envelope {envelope}: {error}")]
    SimulationFailed {
        envelope: usize,
        error: String,
        logs: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("upstream service failed: {0}")]
    Upstream(String),

    /// An item was pushed through its lifecycle out of order.
    #[error("item {index} cannot move from {from} to {to}")]
    Lifecycle {
        index: usize,
        from: String,
        to: String,
    },
}

impl AirdropError {
    /// HTTP-style status the request boundary reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AirdropError::InvalidRequest(_) => 400,
            AirdropError::TableNotFound(_) => 404,
            AirdropError::TableCapacityExceeded { .. } | AirdropError::SimulationFailed { .. } => {
                422
            }
            AirdropError::ChainUnavailable(_) | AirdropError::Upstream(_) => 503,
            AirdropError::Config(_)
            | AirdropError::Encoding(_)
            | AirdropError::Lifecycle { .. } => 500,
        }
    }

    /// Whether resubmitting the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AirdropError::ChainUnavailable(_) | AirdropError::Upstream(_)
        )
    }
}

impl From<SolError> for AirdropError {
    fn from(e: SolError) -> Self {
        match e {
            SolError::LookupTableFull {
                requested,
                capacity,
            } => AirdropError::TableCapacityExceeded {
                table: String::new(),
                requested,
                capacity,
            },
            other => AirdropError::Encoding(format!("SOL: {other}")),
        }
    }
}

impl From<ClientError> for AirdropError {
    fn from(e: ClientError) -> Self {
        AirdropError::ChainUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_scope() {
        assert_eq!(AirdropError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(AirdropError::TableNotFound("t".into()).status_code(), 404);
        assert_eq!(AirdropError::ChainUnavailable("down".into()).status_code(), 503);
        assert_eq!(AirdropError::Encoding("bad".into()).status_code(), 500);
        let lifecycle = AirdropError::Lifecycle {
            index: 4,
            from: "Pending".into(),
            to: "Compiled".into(),
        };
        assert_eq!(lifecycle.status_code(), 500);
        assert_eq!(lifecycle.to_string(), "item 4 cannot move from Pending to Compiled");
    }

    #[test]
    fn only_chain_and_upstream_failures_are_transient() {
        assert!(AirdropError::ChainUnavailable("timeout".into()).is_transient());
        assert!(AirdropError::Upstream("s3".into()).is_transient());
        assert!(!AirdropError::InvalidRequest("x".into()).is_transient());
        assert!(!AirdropError::SimulationFailed {
            envelope: 0,
            error: "e".into(),
            logs: vec![],
        }
        .is_transient());
    }

    #[test]
    fn sol_error_maps_to_encoding() {
        let err: AirdropError = SolError::SerializationError("trailing bytes".into()).into();
        assert!(matches!(err, AirdropError::Encoding(ref m) if m.contains("trailing bytes")));
    }

    #[test]
    fn lookup_table_full_maps_to_capacity_error() {
        let err: AirdropError = SolError::LookupTableFull {
            requested: 300,
            capacity: 256,
        }
        .into();
        assert!(matches!(
            err,
            AirdropError::TableCapacityExceeded {
                requested: 300,
                capacity: 256,
                ..
            }
        ));
    }

    #[test]
    fn client_error_maps_to_chain_unavailable() {
        let err: AirdropError = ClientError::new("connection refused").into();
        assert_eq!(err.to_string(), "chain unavailable: connection refused");
    }
}
