use thiserror::Error;

/// Errors raised while building, encoding or decoding Solana wire data.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("instruction build error: {0}")]
    InstructionBuildError(String),

    #[error("message compile error: {0}")]
    MessageCompileError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("lookup table capacity exceeded: {requested} addresses requested, capacity {capacity}")]
    LookupTableFull { requested: usize, capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_address() {
        let err = SolError::InvalidAddress("bad decode".into());
        assert_eq!(err.to_string(), "invalid address: bad decode");
    }

    #[test]
    fn display_message_compile_error() {
        let err = SolError::MessageCompileError("too many accounts".into());
        assert_eq!(err.to_string(), "message compile error: too many accounts");
    }

    #[test]
    fn display_lookup_table_full() {
        let err = SolError::LookupTableFull {
            requested: 300,
            capacity: 256,
        };
        assert_eq!(
            err.to_string(),
            "lookup table capacity exceeded: 300 addresses requested, capacity 256"
        );
    }

    #[test]
    fn display_serialization_error() {
        let err = SolError::SerializationError("compact-u16 overflow".into());
        assert_eq!(err.to_string(), "serialization error: compact-u16 overflow");
    }

    #[test]
    fn debug_format_works() {
        let err = SolError::SigningError("fail".into());
        let debug = format!("{:?}", err);
        assert!(debug.contains("SigningError"));
    }
}
