//! Error taxonomy for the transaction engine.
//!
//! Every failure kind gets a structured variant here rather than a
//! stringly-typed catch-all, so callers can match on the kind of failure
//! instead of parsing messages.

use thiserror::Error;

use crate::token::TokenKey;
use crate::tx::OutPoint;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient balance: need {required}, have {available} for token {token}")]
    InsufficientBalance {
        token: TokenKey,
        required: String,
        available: String,
    },

    #[error("lock conflict: {0:?} is not AVAILABLE")]
    LockConflict(OutPoint),

    #[error("fee violation: {0}")]
    FeeViolation(#[from] FeeError),

    #[error("cross-chain mismatch: expected {expected}, got {got}")]
    CrossChain { expected: String, got: String },

    #[error("format invalid: {0}")]
    FormatInvalid(String),

    #[error("signature invalid for input {input_index}")]
    SignatureInvalid { input_index: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("dependency failure in {capability}: {message}")]
    DependencyFailure { capability: String, message: String },

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Fee-mechanism validation failures, subkinds per mechanism.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("fee {actual} below minimum {required} for token {token}")]
    BelowMinimum {
        token: TokenKey,
        required: String,
        actual: String,
    },

    #[error("proportional fee {actual} under required {required} for token {token}")]
    ProportionalUnderpaid {
        token: TokenKey,
        required: String,
        actual: String,
    },

    #[error("contract execution fee {actual} under required {required} for token {token}")]
    ContractFeeUnderpaid {
        token: TokenKey,
        required: String,
        actual: String,
    },

    #[error("priority fee {actual} under required {required} for token {token}")]
    PriorityUnderpaid {
        token: TokenKey,
        required: String,
        actual: String,
    },

    #[error("required fee token {token} missing from transaction fee bucket")]
    MissingFeeToken { token: TokenKey },
}

pub type CoreResult<T> = Result<T, CoreError>;
