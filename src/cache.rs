//! PendingTxCache: namespaced, TTL'd key-value cache bridging
//! the unsigned/signed/multisig/status/fee_estimate/validation_result
//! lifecycles, backed by a `MemoryStore` capability.
//!
//! Mirrors `Mempool` (`node/src/mempool.rs`) for the
//! "indexed in-memory collection with save/load semantics" shape,
//! generalized from a single fee-ordered transaction set to arbitrary
//! TTL'd namespaces over an injected `MemoryStore`.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capabilities::MemoryStore;
use crate::config::CacheTtlConfig;
use crate::error::CoreError;
use crate::tx::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Unsigned,
    Signed,
    Multisig,
    Status,
    FeeEstimate,
    ValidationResult,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Unsigned => "unsigned:",
            Namespace::Signed => "signed:",
            Namespace::Multisig => "multisig:",
            Namespace::Status => "status:",
            Namespace::FeeEstimate => "fee_estimate:",
            Namespace::ValidationResult => "validation_result:",
        }
    }

    fn ttl(self, config: &CacheTtlConfig) -> Duration {
        let secs = match self {
            Namespace::Unsigned => config.unsigned_secs,
            Namespace::Signed => config.signed_secs,
            Namespace::Multisig => config.multisig_secs,
            Namespace::Status => config.status_confirmed_secs,
            Namespace::FeeEstimate => config.fee_estimate_secs,
            Namespace::ValidationResult => config.validation_result_secs,
        };
        Duration::from_secs(secs)
    }
}

fn key_for(namespace: Namespace, hash: [u8; 32]) -> String {
    format!("{}{}", namespace.prefix(), hex::encode(hash))
}

pub struct PendingTxCache {
    store: Arc<dyn MemoryStore>,
    ttls: CacheTtlConfig,
}

impl PendingTxCache {
    pub fn new(store: Arc<dyn MemoryStore>, ttls: CacheTtlConfig) -> Self {
        PendingTxCache { store, ttls }
    }

    pub async fn put(&self, namespace: Namespace, hash: [u8; 32], tx: &Transaction) -> Result<(), CoreError> {
        self.put_with_ttl(namespace, hash, tx, namespace.ttl(&self.ttls)).await
    }

    pub async fn get(&self, namespace: Namespace, hash: [u8; 32]) -> Result<Option<Transaction>, CoreError> {
        self.get_record(namespace, hash).await
    }

    /// Serializes any cacheable record (not just `Transaction`) under an
    /// explicit TTL, for namespaces like `Status`/`FeeEstimate`/
    /// `ValidationResult` whose TTL varies by the value being written
    /// rather than being fixed per-namespace.
    pub async fn put_with_ttl<T: Serialize>(
        &self,
        namespace: Namespace,
        hash: [u8; 32],
        value: &T,
        ttl: Duration,
    ) -> Result<(), CoreError> {
        let encoded = bincode::serialize(value).map_err(|e| CoreError::Internal(format!("cache encode: {e}")))?;
        self.store.set(&key_for(namespace, hash), encoded, ttl).await
    }

    pub async fn get_record<T: DeserializeOwned>(&self, namespace: Namespace, hash: [u8; 32]) -> Result<Option<T>, CoreError> {
        match self.store.get(&key_for(namespace, hash)).await? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| CoreError::Internal(format!("cache decode: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn delete(&self, namespace: Namespace, hash: [u8; 32]) -> Result<(), CoreError> {
        self.store.delete(&key_for(namespace, hash)).await
    }

    /// Atomic delete-then-insert across namespaces, used by the sign
    /// lifecycle adapter to move an entry from `unsigned:` to `signed:`
    /// under its new canonical hash.
    pub async fn update(
        &self,
        old_namespace: Namespace,
        new_namespace: Namespace,
        old_hash: [u8; 32],
        new_hash: [u8; 32],
        tx: &Transaction,
    ) -> Result<(), CoreError> {
        self.put(new_namespace, new_hash, tx).await?;
        self.delete(old_namespace, old_hash).await?;
        Ok(())
    }

    pub async fn count(&self, namespace: Namespace) -> Result<usize, CoreError> {
        self.store.count_by_pattern(namespace.prefix()).await
    }

    /// Periodic cleanup hook: touches every namespace so a `MemoryStore`
    /// that only prunes expired entries lazily (on `get`/`count`, as
    /// `InMemoryStore` does) is forced to evict them now, and returns the
    /// total number of live entries left across all namespaces.
    pub async fn cleanup(&self) -> Result<usize, CoreError> {
        let mut remaining = 0;
        for namespace in [
            Namespace::Unsigned,
            Namespace::Signed,
            Namespace::Multisig,
            Namespace::Status,
            Namespace::FeeEstimate,
            Namespace::ValidationResult,
        ] {
            remaining += self.store.count_by_pattern(namespace.prefix()).await?;
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::fee::FeeMechanism;
    use crate::token::TokenKey;
    use crate::capabilities::InMemoryStore;
    use crate::tx::{AssetContent, TxOutput};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput::asset(
                Address::from_bytes([1; 20]),
                AssetContent::NativeCoin { amount: "1".into() },
            )],
            nonce: 0,
            creation_timestamp: 1,
            chain_id: vec![1],
            fee_mechanism: FeeMechanism::MinimumFee {
                amount: "0".into(),
                token: TokenKey::native(),
            },
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default());
        let hash = [5u8; 32];
        cache.put(Namespace::Unsigned, hash, &sample_tx()).await.unwrap();
        let fetched = cache.get(Namespace::Unsigned, hash).await.unwrap();
        assert_eq!(fetched, Some(sample_tx()));
    }

    #[tokio::test]
    async fn update_moves_entry_across_namespaces() {
        let cache = PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default());
        let old_hash = [1u8; 32];
        let new_hash = [2u8; 32];
        cache.put(Namespace::Unsigned, old_hash, &sample_tx()).await.unwrap();

        cache
            .update(Namespace::Unsigned, Namespace::Signed, old_hash, new_hash, &sample_tx())
            .await
            .unwrap();

        assert_eq!(cache.get(Namespace::Unsigned, old_hash).await.unwrap(), None);
        assert!(cache.get(Namespace::Signed, new_hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn generic_record_round_trips_under_its_own_ttl() {
        let cache = PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default());
        let hash = [3u8; 32];
        cache
            .put_with_ttl(Namespace::ValidationResult, hash, &true, std::time::Duration::from_secs(60))
            .await
            .unwrap();
        let fetched: Option<bool> = cache.get_record(Namespace::ValidationResult, hash).await.unwrap();
        assert_eq!(fetched, Some(true));
    }
}
