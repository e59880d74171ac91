//! CanonicalHasher: the leaf identity service.
//!
//! Modeled on `Transaction::hash`/`signing_hash`
//! (`core/src/transaction.rs`, bincode-serialize then digest), kept in the
//! same shape but switched to SHA-256 and routed exclusively through this
//! trait — nothing outside this module may call `sha2` directly against a
//! transaction.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::tx::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDebugInfo {
    pub encoded_len: usize,
    pub encoded_hex_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    pub hash: [u8; 32],
    pub is_valid: bool,
    pub debug: Option<HashDebugInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateResult {
    pub is_valid: bool,
    pub computed_hash: [u8; 32],
}

#[async_trait]
pub trait CanonicalHasher: Send + Sync {
    async fn compute(&self, tx: &Transaction, include_debug_info: bool) -> Result<HashResult, CoreError>;

    async fn validate(&self, tx: &Transaction, expected_hash: [u8; 32]) -> Result<ValidateResult, CoreError> {
        let computed = self.compute(tx, false).await?;
        Ok(ValidateResult {
            is_valid: computed.hash == expected_hash,
            computed_hash: computed.hash,
        })
    }
}

/// Canonical byte encoding shared by hashing and wire persistence: derive
/// `Serialize`, encode with `bincode` (fixed field order, no
/// non-deterministic map iteration), identically for every platform.
fn encode_canonical(tx: &Transaction) -> Result<Vec<u8>, CoreError> {
    bincode::serialize(tx).map_err(|e| CoreError::Internal(format!("canonical encode failed: {e}")))
}

const PREVIEW_BYTES: usize = 16;

#[derive(Debug, Default)]
pub struct Sha256CanonicalHasher;

impl Sha256CanonicalHasher {
    pub fn new() -> Self {
        Sha256CanonicalHasher
    }
}

#[async_trait]
impl CanonicalHasher for Sha256CanonicalHasher {
    async fn compute(&self, tx: &Transaction, include_debug_info: bool) -> Result<HashResult, CoreError> {
        let encoded = encode_canonical(tx)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        let digest = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);

        let debug = include_debug_info.then(|| HashDebugInfo {
            encoded_len: encoded.len(),
            encoded_hex_preview: hex::encode(&encoded[..encoded.len().min(PREVIEW_BYTES)]),
        });

        Ok(HashResult {
            hash,
            is_valid: true,
            debug,
        })
    }
}
