//! External collaborator capabilities: each is represented as
//! one narrow `#[async_trait]` trait here, plus a minimal in-memory/no-op
//! stand-in so the crate's own tests (and any embedding binary) can run
//! without the real node subsystems. The stand-ins are intentionally not
//! feature-complete — they exist to exercise the core in isolation, the
//! role `Mempool`/`Database` test fixtures play for their own
//! crates (`node/src/mempool.rs`, `storage/src/db.rs`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::BlockchainConfig;
use crate::error::CoreError;
use crate::tx::Transaction;

#[async_trait]
pub trait KeyManager: Send + Sync {
    async fn derive_public_key(&self, priv_bytes: &[u8]) -> Result<Vec<u8>, CoreError>;
}

#[async_trait]
pub trait AddressManager: Send + Sync {
    async fn public_key_to_address(&self, pubkey: &[u8]) -> Result<crate::address::Address, CoreError>;
    fn address_to_bytes(&self, addr: &crate::address::Address) -> [u8; 20] {
        *addr.as_bytes()
    }
    fn string_to_address(&self, s: &str) -> Result<crate::address::Address, CoreError> {
        s.parse()
    }
    fn validate_address(&self, s: &str) -> bool {
        s.parse::<crate::address::Address>().is_ok()
    }
}

/// Per-algorithm signing/verification is out of the core body;
/// the core only needs to know whether a locking condition was satisfied.
#[async_trait]
pub trait SignatureManager: Send + Sync {
    async fn sign(&self, priv_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>, CoreError>;
    async fn verify(&self, pubkey: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub content_hash: [u8; 32],
    pub mime_type: String,
    pub size: u64,
}

#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn store_resource_file(
        &self,
        path: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<[u8; 32], CoreError>;

    async fn get_resource_by_hash(&self, hash: [u8; 32]) -> Result<Option<ResourceInfo>, CoreError>;

    async fn list_resources_by_type(
        &self,
        resource_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ResourceInfo>, CoreError>;
}

/// In-process `ResourceManager`, grounded in the same indexed-map shape as
/// `InMemoryUtxoManager` (`utxo.rs`): content-addressed by the SHA-256 of
/// the stored bytes, since no real content-addressed store is wired in
/// tests or a bare embedding binary.
#[derive(Default)]
pub struct InMemoryResourceManager {
    resources: RwLock<HashMap<[u8; 32], ResourceInfo>>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        InMemoryResourceManager {
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn store_resource_file(
        &self,
        path: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<[u8; 32], CoreError> {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        let digest = hasher.finalize();
        let mut content_hash = [0u8; 32];
        content_hash.copy_from_slice(&digest);
        self.resources.write().await.insert(
            content_hash,
            ResourceInfo {
                content_hash,
                mime_type: "application/octet-stream".to_string(),
                size: 0,
            },
        );
        Ok(content_hash)
    }

    async fn get_resource_by_hash(&self, hash: [u8; 32]) -> Result<Option<ResourceInfo>, CoreError> {
        Ok(self.resources.read().await.get(&hash).cloned())
    }

    async fn list_resources_by_type(
        &self,
        _resource_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ResourceInfo>, CoreError> {
        let resources = self.resources.read().await;
        Ok(resources.values().cloned().skip(offset).take(limit).collect())
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionParams {
    pub resource_id: crate::address::Address,
    pub entry: String,
    pub payload: Vec<u8>,
    pub caller: crate::address::Address,
    pub chain_id: Vec<u8>,
    pub block_timestamp: u64,
    pub execution_fee_limit: num_bigint::BigUint,
    pub memory_limit: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub return_data: Vec<u8>,
    pub consumed: num_bigint::BigUint,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, engine_type: &str, params: ExecutionParams) -> Result<ExecutionResult, CoreError>;
}

/// A no-op engine used where the real WASM/AI executor hasn't been wired;
/// always reports a structurally-valid failure rather than panicking, so
/// assembler code exercising the failure branch can be tested in isolation.
pub struct NoopExecutionEngine;

#[async_trait]
impl ExecutionEngine for NoopExecutionEngine {
    async fn execute(&self, _engine_type: &str, params: ExecutionParams) -> Result<ExecutionResult, CoreError> {
        Ok(ExecutionResult {
            success: false,
            return_data: vec![],
            consumed: num_bigint::BigUint::from(0u32),
            metadata: HashMap::from([("error".to_string(), "execution engine not configured".to_string())]),
        })
    }
}

/// Backs `PendingTxCache`.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CoreError>;
    async fn delete(&self, key: &str) -> Result<(), CoreError>;
    async fn delete_by_pattern(&self, prefix: &str) -> Result<usize, CoreError>;
    async fn count(&self) -> Result<usize, CoreError>;
    async fn count_by_pattern(&self, prefix: &str) -> Result<usize, CoreError>;
}

struct StoredEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process `MemoryStore`, mirroring `Mempool`
/// (`node/src/mempool.rs`) indexed in-memory collection, generalized to
/// arbitrary TTL'd keys instead of one fee-ordered transaction set.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    async fn prune_expired(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        self.prune_expired().await;
        Ok(self.entries.read().await.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CoreError> {
        self.entries.write().await.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, prefix: &str) -> Result<usize, CoreError> {
        let mut entries = self.entries.write().await;
        let keys: Vec<String> = entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        for key in &keys {
            entries.remove(key);
        }
        Ok(keys.len())
    }

    async fn count(&self) -> Result<usize, CoreError> {
        self.prune_expired().await;
        Ok(self.entries.read().await.len())
    }

    async fn count_by_pattern(&self, prefix: &str) -> Result<usize, CoreError> {
        self.prune_expired().await;
        Ok(self.entries.read().await.keys().filter(|k| k.starts_with(prefix)).count())
    }
}

#[async_trait]
pub trait Mempool: Send + Sync {
    async fn submit(&self, tx: &Transaction) -> Result<[u8; 32], CoreError>;
    async fn get(&self, hash: [u8; 32]) -> Result<Option<Transaction>, CoreError>;
}

/// In-process `Mempool`, indexed by the same canonical hash the rest of the
/// crate uses for tx identity (it hashes through the injected
/// `CanonicalHasher` rather than reaching for `sha2` on its own, since
/// nothing outside `hasher.rs` computes a transaction's identity hash).
pub struct InMemoryMempool {
    entries: RwLock<HashMap<[u8; 32], Transaction>>,
    hasher: Arc<dyn crate::hasher::CanonicalHasher>,
}

impl InMemoryMempool {
    pub fn new(hasher: Arc<dyn crate::hasher::CanonicalHasher>) -> Self {
        InMemoryMempool {
            entries: RwLock::new(HashMap::new()),
            hasher,
        }
    }

    pub fn shared(hasher: Arc<dyn crate::hasher::CanonicalHasher>) -> Arc<Self> {
        Arc::new(Self::new(hasher))
    }
}

#[async_trait]
impl Mempool for InMemoryMempool {
    async fn submit(&self, tx: &Transaction) -> Result<[u8; 32], CoreError> {
        let hash = self.hasher.compute(tx, false).await?.hash;
        self.entries.write().await.insert(hash, tx.clone());
        Ok(hash)
    }

    async fn get(&self, hash: [u8; 32]) -> Result<Option<Transaction>, CoreError> {
        Ok(self.entries.read().await.get(&hash).cloned())
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_transaction(&self, hash: [u8; 32]) -> Result<Option<([u8; 32], u32, Transaction)>, CoreError>;
}

/// In-process confirmed-transaction store; real confirmation (block
/// inclusion) happens outside the core, so tests seed entries directly via
/// `confirm`.
#[derive(Default)]
pub struct InMemoryRepository {
    confirmed: RwLock<HashMap<[u8; 32], ([u8; 32], u32, Transaction)>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        InMemoryRepository {
            confirmed: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn confirm(&self, hash: [u8; 32], block_hash: [u8; 32], index: u32, tx: Transaction) {
        self.confirmed.write().await.insert(hash, (block_hash, index, tx));
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_transaction(&self, hash: [u8; 32]) -> Result<Option<([u8; 32], u32, Transaction)>, CoreError> {
        Ok(self.confirmed.read().await.get(&hash).cloned())
    }
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn publish(&self, topic: &str, bytes: &[u8]) -> Result<(), CoreError>;
    async fn call(&self, peer: &str, protocol: &str, bytes: &[u8]) -> Result<Vec<u8>, CoreError>;
}

/// A network stand-in that always succeeds, the default for tests that
/// aren't exercising the propagation-failure rollback path.
pub struct NoopNetwork;

#[async_trait]
impl Network for NoopNetwork {
    async fn publish(&self, _topic: &str, _bytes: &[u8]) -> Result<(), CoreError> {
        Ok(())
    }

    async fn call(&self, _peer: &str, _protocol: &str, _bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(vec![])
    }
}

/// A failure record for a transaction that never reached the mempool or was
/// rejected from it, backing the "failed-record store" stage of
/// `LifecycleAdapters::status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub reason: String,
}

#[async_trait]
pub trait FailedRecordStore: Send + Sync {
    async fn record_failure(&self, hash: [u8; 32], reason: String) -> Result<(), CoreError>;
    async fn get_failure(&self, hash: [u8; 32]) -> Result<Option<FailureRecord>, CoreError>;
}

#[derive(Default)]
pub struct InMemoryFailedRecordStore {
    records: RwLock<HashMap<[u8; 32], FailureRecord>>,
}

impl InMemoryFailedRecordStore {
    pub fn new() -> Self {
        InMemoryFailedRecordStore {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl FailedRecordStore for InMemoryFailedRecordStore {
    async fn record_failure(&self, hash: [u8; 32], reason: String) -> Result<(), CoreError> {
        self.records.write().await.insert(hash, FailureRecord { reason });
        Ok(())
    }

    async fn get_failure(&self, hash: [u8; 32]) -> Result<Option<FailureRecord>, CoreError> {
        Ok(self.records.read().await.get(&hash).cloned())
    }
}

#[async_trait]
pub trait KbucketManager: Send + Sync {
    async fn find_closest_peers(&self, key: &[u8], count: usize) -> Result<Vec<String>, CoreError>;
}

#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn get_blockchain(&self) -> Result<BlockchainConfig, CoreError>;
}

/// A provider that always returns the same in-memory config, for tests and
/// for binaries that have not wired a real config-loading backend.
pub struct StaticConfigProvider(BlockchainConfig);

impl StaticConfigProvider {
    pub fn new(config: BlockchainConfig) -> Self {
        StaticConfigProvider(config)
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn get_blockchain(&self) -> Result<BlockchainConfig, CoreError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryStore::new();
        store.set("unsigned:abc", vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("unsigned:abc").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.count_by_pattern("unsigned:").await.unwrap(), 1);
        store.delete("unsigned:abc").await.unwrap();
        assert_eq!(store.get("unsigned:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_pruned() {
        let store = InMemoryStore::new();
        store.set("signed:x", vec![9], Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("signed:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_by_pattern_removes_only_matching_namespace() {
        let store = InMemoryStore::new();
        store.set("unsigned:a", vec![1], Duration::from_secs(60)).await.unwrap();
        store.set("signed:a", vec![1], Duration::from_secs(60)).await.unwrap();
        let removed = store.delete_by_pattern("unsigned:").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
