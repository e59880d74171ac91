//! A small SHA-256 helper for content hashes that are *not* the
//! transaction's own canonical identity — resource `content_hash`, state
//! `state_id`/`execution_result_hash`. Those are structural payload fields
//! the assembler computes directly, distinct from the canonical tx hash
//! that is reserved exclusively for the `CanonicalHasher` capability.
//!
//! Mirrors a common habit of hashing payloads locally at the
//! point of use (`DeployerKey::from_hex`'s `Sha3_256` address derivation in
//! `enterprise/src/transaction/deployment.rs`), generalized to SHA-256 to
//! match this crate's wire hash.

use sha2::{Digest, Sha256};

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
