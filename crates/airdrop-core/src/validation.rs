//! Declarative checks on incoming request bodies.
//!
//! Each operation has a schema listing its fields; one walker enforces them.
//! Individual recipient addresses are deliberately not checked here: a bad
//! wallet rejects its own item later instead of the whole request.

use chain_sol::address::validate_address;
use serde_json::Value;

use crate::error::AirdropError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Address,
    NonEmptyString,
    /// Non-empty array of strings.
    StringList,
    PositiveNumber,
    BasisPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Reported verbatim when the field is missing or empty.
    pub missing_message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    MintCompressed,
    PrepareTable,
    CreateTree,
    CreatePayUrl,
    TransactionStatus,
}

const MINT_RULES: &[FieldRule] = &[
    FieldRule {
        name: "fromPubKey",
        kind: FieldKind::Address,
        required: true,
        missing_message: "No wallet address provided.",
    },
    FieldRule {
        name: "merkleTree",
        kind: FieldKind::Address,
        required: true,
        missing_message: "No merkle tree provided.",
    },
    FieldRule {
        name: "collectionMintPubKey",
        kind: FieldKind::Address,
        required: true,
        missing_message: "No collection mint provided.",
    },
    FieldRule {
        name: "wallets",
        kind: FieldKind::StringList,
        required: true,
        missing_message: "No wallets provided for airdrop.",
    },
    FieldRule {
        name: "collectionAuthority",
        kind: FieldKind::Address,
        required: false,
        missing_message: "",
    },
    FieldRule {
        name: "lookupTable",
        kind: FieldKind::Address,
        required: false,
        missing_message: "",
    },
    FieldRule {
        name: "royaltyBps",
        kind: FieldKind::BasisPoints,
        required: false,
        missing_message: "",
    },
];

const TREE_RULES: &[FieldRule] = &[FieldRule {
    name: "fromPubKey",
    kind: FieldKind::Address,
    required: true,
    missing_message: "No wallet address provided.",
}];

const PAY_URL_RULES: &[FieldRule] = &[FieldRule {
    name: "amount",
    kind: FieldKind::PositiveNumber,
    required: true,
    missing_message: "No amount provided.",
}];

const STATUS_RULES: &[FieldRule] = &[FieldRule {
    name: "reference",
    kind: FieldKind::NonEmptyString,
    required: true,
    missing_message: "No reference provided.",
}];

#[derive(Debug, Clone, Copy)]
pub struct RequestSchema {
    pub kind: OperationKind,
    pub rules: &'static [FieldRule],
}

impl RequestSchema {
    pub fn for_operation(kind: OperationKind) -> Self {
        let rules = match kind {
            OperationKind::MintCompressed | OperationKind::PrepareTable => MINT_RULES,
            OperationKind::CreateTree => TREE_RULES,
            OperationKind::CreatePayUrl => PAY_URL_RULES,
            OperationKind::TransactionStatus => STATUS_RULES,
        };
        Self { kind, rules }
    }

    /// Check `body` against every rule, stopping at the first violation.
    pub fn validate(&self, body: &Value) -> Result<(), AirdropError> {
        let Some(object) = body.as_object() else {
            return Err(AirdropError::InvalidRequest(
                "request body must be a JSON object".into(),
            ));
        };

        for rule in self.rules {
            match object.get(rule.name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(AirdropError::InvalidRequest(rule.missing_message.into()))
                }
                None | Some(Value::Null) => {}
                Some(value) => check(rule, value)?,
            }
        }
        Ok(())
    }
}

fn check(rule: &FieldRule, value: &Value) -> Result<(), AirdropError> {
    let invalid = |detail: String| AirdropError::InvalidRequest(format!("{}: {detail}", rule.name));
    let missing = || {
        if rule.required {
            AirdropError::InvalidRequest(rule.missing_message.into())
        } else {
            AirdropError::InvalidRequest(format!("{}: must not be empty", rule.name))
        }
    };

    match rule.kind {
        FieldKind::Address => {
            let s = value.as_str().ok_or_else(|| invalid("expected a string".into()))?;
            if s.trim().is_empty() {
                return Err(missing());
            }
            validate_address(s).map_err(|e| invalid(e.to_string()))
        }
        FieldKind::NonEmptyString => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err(missing()),
            None => Err(invalid("expected a string".into())),
        },
        FieldKind::StringList => {
            let list = value.as_array().ok_or_else(|| invalid("expected an array".into()))?;
            if list.is_empty() {
                return Err(missing());
            }
            match list.iter().position(|v| !v.is_string()) {
                Some(i) => Err(invalid(format!("entry {i} is not a string"))),
                None => Ok(()),
            }
        }
        FieldKind::PositiveNumber => match value.as_f64() {
            Some(n) if n.is_finite() && n > 0.0 => Ok(()),
            Some(n) => Err(invalid(format!("{n} is not a positive amount"))),
            None => Err(invalid("expected a number".into())),
        },
        FieldKind::BasisPoints => match value.as_u64() {
            Some(n) if n <= 10_000 => Ok(()),
            _ => Err(invalid("expected an integer in 0..=10000".into())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::address::bytes_to_address;
    use serde_json::json;

    fn addr(n: u8) -> String {
        bytes_to_address(&[n; 32])
    }

    fn mint_body() -> Value {
        json!({
            "fromPubKey": addr(1),
            "merkleTree": addr(2),
            "collectionMintPubKey": addr(3),
            "wallets": [addr(4), "not-even-base58"],
        })
    }

    fn mint_schema() -> RequestSchema {
        RequestSchema::for_operation(OperationKind::MintCompressed)
    }

    #[test]
    fn valid_mint_request_passes_even_with_bad_wallet() {
        assert!(mint_schema().validate(&mint_body()).is_ok());
    }

    #[test]
    fn empty_wallet_list_uses_boundary_message() {
        let mut body = mint_body();
        body["wallets"] = json!([]);
        let err = mint_schema().validate(&body).unwrap_err();
        assert_eq!(err.to_string(), "invalid request: No wallets provided for airdrop.");
    }

    #[test]
    fn missing_payer_is_reported() {
        let mut body = mint_body();
        body.as_object_mut().unwrap().remove("fromPubKey");
        let err = mint_schema().validate(&body).unwrap_err();
        assert!(err.to_string().contains("No wallet address provided."));
    }

    #[test]
    fn malformed_tree_address_names_the_field() {
        let mut body = mint_body();
        body["merkleTree"] = json!("xyz");
        let err = mint_schema().validate(&body).unwrap_err();
        assert!(err.to_string().contains("merkleTree"));
    }

    #[test]
    fn optional_fields_are_checked_when_present() {
        let mut body = mint_body();
        body["royaltyBps"] = json!(20_000);
        assert!(mint_schema().validate(&body).is_err());

        let mut body = mint_body();
        body["lookupTable"] = Value::Null;
        assert!(mint_schema().validate(&body).is_ok());
    }

    #[test]
    fn pay_url_amount_must_be_positive() {
        let schema = RequestSchema::for_operation(OperationKind::CreatePayUrl);
        assert!(schema.validate(&json!({"amount": 0.001})).is_ok());
        assert!(schema.validate(&json!({"amount": 0})).is_err());
        assert!(schema.validate(&json!({"amount": "1"})).is_err());
        assert!(schema.validate(&json!({})).is_err());
    }

    #[test]
    fn tree_request_needs_only_the_payer() {
        let schema = RequestSchema::for_operation(OperationKind::CreateTree);
        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "invalid request: No wallet address provided.");
        assert!(schema.validate(&json!({"fromPubKey": "not-an-address"})).is_err());
        assert!(schema
            .validate(&json!({"fromPubKey": "11111111111111111111111111111111"}))
            .is_ok());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let schema = RequestSchema::for_operation(OperationKind::TransactionStatus);
        assert!(schema.validate(&json!(["reference"])).is_err());
        assert!(schema.validate(&json!({"reference": "  "})).is_err());
        assert!(schema.validate(&json!({"reference": "abc"})).is_ok());
    }
}
