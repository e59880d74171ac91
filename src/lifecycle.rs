//! Lifecycle adapters: sign-wrap, submit, status, query, fee
//! estimation and multisig-session state transitions sitting above the
//! leaf services and orchestrating them.
//!
//! Mirrors `Mempool::add_transaction`/`remove_transaction`
//! (`node/src/mempool.rs`) for the submit/rollback shape, generalized from a
//! single mempool-insert call to the full announce-then-propagate-then-
//! rollback-on-failure flow this module implements.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::cache::{Namespace, PendingTxCache};
use crate::capabilities::{FailedRecordStore, Mempool, Network, Repository};
use crate::config::CacheTtlConfig;
use crate::context::OpContext;
use crate::error::CoreError;
use crate::fee::{FeeEngine, FeeEstimate};
use crate::hasher::CanonicalHasher;
use crate::tx::{OutPoint, Transaction};
use crate::utxo::UtxoManager;

pub const GOSSIP_TOPIC: &str = "weisyn.blockchain.tx_announce.v1";
pub const DIRECT_STREAM_PROTOCOL: &str = "/weisyn/blockchain/tx_direct/1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
    Unknown,
}

pub struct LifecycleAdapters<'a> {
    pub hasher: &'a dyn CanonicalHasher,
    pub utxo_manager: &'a dyn UtxoManager,
    pub cache: &'a PendingTxCache,
    pub mempool: &'a dyn Mempool,
    pub repository: &'a dyn Repository,
    pub network: &'a dyn Network,
    pub neighbor_peers: &'a [String],
    pub failed_record_store: &'a dyn FailedRecordStore,
    pub cache_ttls: &'a CacheTtlConfig,
}

impl<'a> LifecycleAdapters<'a> {
    /// Sign: rebuild a signed version of the unsigned tx (nonce set by the
    /// caller, locking proofs already filled in by the caller's signer),
    /// recompute the canonical hash, and move the cache entry from
    /// `unsigned:` to `signed:`.
    pub async fn sign(&self, ctx: &OpContext, unsigned_hash: [u8; 32], signed_tx: Transaction) -> Result<[u8; 32], CoreError> {
        ctx.check()?;
        if !signed_tx.is_signed() {
            return Err(CoreError::InvalidInput("signed transaction must set a non-zero nonce".into()));
        }
        let computed = self.hasher.compute(&signed_tx, false).await?;
        self.cache
            .update(Namespace::Unsigned, Namespace::Signed, unsigned_hash, computed.hash, &signed_tx)
            .await?;
        Ok(computed.hash)
    }

    /// Submit: look up the signed tx, lock every ASSET UTXO it references,
    /// hand it to the mempool, then best-effort propagate. A failure locking
    /// UTXOs or getting into the mempool is recorded as `Failed` (the tx
    /// never reaches a state any peer can observe as pending); a
    /// propagation failure leaves the tx in the mempool, so it keeps
    /// reporting `Pending` via the mempool branch of `status` instead.
    pub async fn submit(&self, ctx: &OpContext, signed_hash: [u8; 32]) -> Result<[u8; 32], CoreError> {
        ctx.check()?;
        let tx = self
            .cache
            .get(Namespace::Signed, signed_hash)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("signed tx {}", hex::encode(signed_hash))))?;

        let mut locked: Vec<OutPoint> = Vec::new();
        for input in &tx.inputs {
            if input.is_reference_only {
                continue;
            }
            match self.utxo_manager.reference(&input.previous_output).await {
                Ok(()) => locked.push(input.previous_output),
                Err(err) => {
                    self.unlock_all(&locked).await;
                    self.record_failure(signed_hash, err.to_string()).await;
                    return Err(err);
                }
            }
        }

        let mempool_result = self.mempool.submit(&tx).await;
        let hash = match mempool_result {
            Ok(hash) => hash,
            Err(err) => {
                self.unlock_all(&locked).await;
                self.record_failure(signed_hash, err.to_string()).await;
                return Err(err);
            }
        };

        if let Err(err) = self.propagate(&tx).await {
            self.unlock_all(&locked).await;
            return Err(err);
        }

        self.cache
            .put_with_ttl(
                Namespace::Status,
                hash,
                &TxStatus::Pending,
                Duration::from_secs(self.cache_ttls.status_pending_secs),
            )
            .await?;

        Ok(hash)
    }

    async fn unlock_all(&self, locked: &[OutPoint]) {
        for outpoint in locked {
            let _ = self.utxo_manager.unreference(outpoint).await;
        }
    }

    /// Records a submit failure both in the `FailedRecordStore` (the
    /// durable source `status` falls back to) and as a `Failed` cache
    /// entry, so lookups shortly after the failure don't need to reach the
    /// failed-record store at all.
    async fn record_failure(&self, hash: [u8; 32], reason: String) {
        let _ = self.failed_record_store.record_failure(hash, reason).await;
        let _ = self
            .cache
            .put_with_ttl(
                Namespace::Status,
                hash,
                &TxStatus::Failed,
                Duration::from_secs(self.cache_ttls.status_failed_secs),
            )
            .await;
    }

    /// Best-effort gossip plus direct stream to 2-3 neighbors; at least one
    /// direct send must succeed or this is treated as a propagation failure.
    async fn propagate(&self, tx: &Transaction) -> Result<(), CoreError> {
        let encoded = bincode::serialize(tx).map_err(|e| CoreError::Internal(format!("encode for propagation: {e}")))?;
        let _ = self.network.publish(GOSSIP_TOPIC, &encoded).await;

        let mut any_succeeded = false;
        for peer in self.neighbor_peers.iter().take(3) {
            if self.network.call(peer, DIRECT_STREAM_PROTOCOL, &encoded).await.is_ok() {
                any_succeeded = true;
            }
        }
        if any_succeeded || self.neighbor_peers.is_empty() {
            Ok(())
        } else {
            Err(CoreError::DependencyFailure {
                capability: "Network".to_string(),
                message: "no neighbor accepted the direct propagation".to_string(),
            })
        }
    }

    /// Status: cache first (per-kind TTL already enforced by the cache),
    /// then mempool, then confirmed storage (caching the confirmation for
    /// future lookups), then the failed-record store.
    pub async fn status(&self, ctx: &OpContext, hash: [u8; 32]) -> Result<TxStatus, CoreError> {
        ctx.check()?;
        if let Some(status) = self.cache.get_record::<TxStatus>(Namespace::Status, hash).await? {
            return Ok(status);
        }
        if self.mempool.get(hash).await?.is_some() {
            return Ok(TxStatus::Pending);
        }
        if self.repository.get_transaction(hash).await?.is_some() {
            self.cache
                .put_with_ttl(
                    Namespace::Status,
                    hash,
                    &TxStatus::Confirmed,
                    Duration::from_secs(self.cache_ttls.status_confirmed_secs),
                )
                .await?;
            return Ok(TxStatus::Confirmed);
        }
        if self.failed_record_store.get_failure(hash).await?.is_some() {
            return Ok(TxStatus::Failed);
        }
        Ok(TxStatus::Unknown)
    }

    /// Query: cache -> mempool -> blockchain store, enriching with
    /// confirmation details when the transaction is found on-chain.
    pub async fn query(&self, ctx: &OpContext, hash: [u8; 32]) -> Result<Option<QueriedTransaction>, CoreError> {
        ctx.check()?;
        if let Some(tx) = self.cache.get(Namespace::Signed, hash).await? {
            return Ok(Some(QueriedTransaction {
                transaction: tx,
                confirmation: None,
            }));
        }
        if let Some(tx) = self.mempool.get(hash).await? {
            return Ok(Some(QueriedTransaction {
                transaction: tx,
                confirmation: None,
            }));
        }
        if let Some((block_hash, index, tx)) = self.repository.get_transaction(hash).await? {
            return Ok(Some(QueriedTransaction {
                transaction: tx,
                confirmation: Some(Confirmation { block_hash, index }),
            }));
        }
        Ok(None)
    }

    /// Fee estimation: cache lookup -> `FeeEngine::estimate` -> a
    /// size-proportional heuristic if the engine's UTXO lookups are
    /// unavailable.
    pub async fn estimate_fee(&self, ctx: &OpContext, tx: &Transaction) -> Result<BigUint, CoreError> {
        ctx.check()?;
        let hash = self.hasher.compute(tx, false).await?.hash;
        if let Some(cached) = self.cache.get_record::<FeeEstimate>(Namespace::FeeEstimate, hash).await? {
            return Ok(cached.standard);
        }

        match FeeEngine::estimate(tx, self.utxo_manager).await {
            Ok(estimate) => {
                self.cache
                    .put_with_ttl(
                        Namespace::FeeEstimate,
                        hash,
                        &estimate,
                        Duration::from_secs(self.cache_ttls.fee_estimate_secs),
                    )
                    .await?;
                Ok(estimate.standard)
            }
            Err(_) => {
                let encoded = bincode::serialize(tx).map_err(|e| CoreError::Internal(format!("encode for fee heuristic: {e}")))?;
                Ok(BigUint::from(encoded.len() as u64))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub block_hash: [u8; 32],
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueriedTransaction {
    pub transaction: Transaction,
    pub confirmation: Option<Confirmation>,
}

/// Multisig session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultisigSessionStatus {
    Active,
    Completed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct MultisigSession {
    pub session_id: String,
    pub required_signers: u32,
    pub current_signers: HashSet<crate::address::Address>,
    pub authorized_signers: HashSet<crate::address::Address>,
    pub expiry: u64,
    pub description: String,
    pub status: MultisigSessionStatus,
}

impl MultisigSession {
    pub fn new(
        session_id: String,
        required_signers: u32,
        authorized_signers: HashSet<crate::address::Address>,
        expiry: u64,
        description: String,
    ) -> Self {
        MultisigSession {
            session_id,
            required_signers,
            current_signers: HashSet::new(),
            authorized_signers,
            expiry,
            description,
            status: MultisigSessionStatus::Active,
        }
    }

    /// Collect a unique, non-duplicate signature from an authorized signer.
    pub fn add_signature(&mut self, signer: crate::address::Address) -> Result<(), CoreError> {
        if self.status != MultisigSessionStatus::Active {
            return Err(CoreError::InvalidInput("multisig session is not active".into()));
        }
        if !self.authorized_signers.contains(&signer) {
            return Err(CoreError::InvalidInput("signer is not authorized for this session".into()));
        }
        if !self.current_signers.insert(signer) {
            return Err(CoreError::InvalidInput("signer has already signed this session".into()));
        }
        Ok(())
    }

    pub fn is_ready_to_finalize(&self) -> bool {
        self.current_signers.len() as u32 >= self.required_signers
    }

    /// Finalize once `current >= required`, producing the final tx hash.
    pub async fn finalize(
        &mut self,
        ctx: &OpContext,
        signed_tx: &Transaction,
        hasher: &dyn CanonicalHasher,
    ) -> Result<[u8; 32], CoreError> {
        ctx.check()?;
        if !self.is_ready_to_finalize() {
            return Err(CoreError::InvalidInput("insufficient signatures to finalize multisig session".into()));
        }
        self.status = MultisigSessionStatus::Completed;
        Ok(hasher.compute(signed_tx, false).await?.hash)
    }
}

/// Session-id-level serialization guard preventing duplicate-signature
/// races across concurrent signing calls on the same session.
pub struct MultisigSessionStore {
    sessions: Mutex<std::collections::HashMap<String, Arc<Mutex<MultisigSession>>>>,
}

impl Default for MultisigSessionStore {
    fn default() -> Self {
        MultisigSessionStore {
            sessions: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl MultisigSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: MultisigSession) {
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), Arc::new(Mutex::new(session)));
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<MultisigSession>>> {
        self.sessions.lock().await.get(session_id).cloned()
    }
}

#[cfg(test)]
mod adapter_tests {
    use super::*;
    use crate::address::Address;
    use crate::capabilities::{InMemoryFailedRecordStore, InMemoryMempool, InMemoryRepository, NoopNetwork};
    use crate::fee::FeeMechanism;
    use crate::hasher::Sha256CanonicalHasher;
    use crate::tx::{AssetContent, OutPoint, TxInput, TxOutput};
    use crate::utxo::InMemoryUtxoManager;
    use async_trait::async_trait;

    struct FailingNetwork;

    #[async_trait]
    impl Network for FailingNetwork {
        async fn publish(&self, _topic: &str, _bytes: &[u8]) -> Result<(), CoreError> {
            Ok(())
        }

        async fn call(&self, _peer: &str, _protocol: &str, _bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
            Err(CoreError::DependencyFailure {
                capability: "Network".to_string(),
                message: "simulated direct-stream failure".to_string(),
            })
        }
    }

    fn signed_tx(outpoint: OutPoint) -> Transaction {
        Transaction {
            version: Transaction::CURRENT_VERSION,
            inputs: vec![TxInput::spending(outpoint)],
            outputs: vec![TxOutput::asset(Address::from_bytes([2; 20]), AssetContent::NativeCoin { amount: "1".into() })],
            nonce: 7,
            creation_timestamp: 1,
            chain_id: vec![1],
            fee_mechanism: FeeMechanism::None,
        }
    }

    async fn submit_success_harness(
        utxo_manager: &InMemoryUtxoManager,
        cache: &PendingTxCache,
        hasher: &Sha256CanonicalHasher,
        mempool: &InMemoryMempool,
        repository: &InMemoryRepository,
        failed_store: &InMemoryFailedRecordStore,
        network: &dyn Network,
    ) -> LifecycleAdapters<'_> {
        LifecycleAdapters {
            hasher,
            utxo_manager,
            cache,
            mempool,
            repository,
            network,
            neighbor_peers: &[],
            failed_record_store: failed_store,
            cache_ttls: &CacheTtlConfig::default(),
        }
    }

    #[tokio::test]
    async fn submit_success_caches_pending_status() {
        let utxo_manager = InMemoryUtxoManager::new();
        let outpoint = OutPoint::new([1; 32], 0);
        utxo_manager
            .seed_available(outpoint, TxOutput::asset(Address::from_bytes([1; 20]), AssetContent::NativeCoin { amount: "10".into() }), 0)
            .await;

        let hasher = Sha256CanonicalHasher::new();
        let cache = PendingTxCache::new(crate::capabilities::InMemoryStore::shared(), CacheTtlConfig::default());
        let mempool = InMemoryMempool::new(Arc::new(Sha256CanonicalHasher::new()));
        let repository = InMemoryRepository::new();
        let failed_store = InMemoryFailedRecordStore::new();
        let network = NoopNetwork;

        let tx = signed_tx(outpoint);
        let computed = hasher.compute(&tx, false).await.unwrap();
        cache.put(Namespace::Signed, computed.hash, &tx).await.unwrap();

        let adapters = submit_success_harness(&utxo_manager, &cache, &hasher, &mempool, &repository, &failed_store, &network).await;
        let ctx = OpContext::new();

        let hash = adapters.submit(&ctx, computed.hash).await.unwrap();
        assert_eq!(adapters.status(&ctx, hash).await.unwrap(), TxStatus::Pending);
    }

    #[tokio::test]
    async fn submit_failure_on_lock_conflict_is_recorded_as_failed() {
        let utxo_manager = InMemoryUtxoManager::new();
        let outpoint = OutPoint::new([3; 32], 0);
        utxo_manager
            .seed_available(outpoint, TxOutput::asset(Address::from_bytes([1; 20]), AssetContent::NativeCoin { amount: "10".into() }), 0)
            .await;
        // Pre-lock the outpoint so submit's own `reference` call fails.
        utxo_manager.reference(&outpoint).await.unwrap();

        let hasher = Sha256CanonicalHasher::new();
        let cache = PendingTxCache::new(crate::capabilities::InMemoryStore::shared(), CacheTtlConfig::default());
        let mempool = InMemoryMempool::new(Arc::new(Sha256CanonicalHasher::new()));
        let repository = InMemoryRepository::new();
        let failed_store = InMemoryFailedRecordStore::new();
        let network = NoopNetwork;

        let tx = signed_tx(outpoint);
        let computed = hasher.compute(&tx, false).await.unwrap();
        cache.put(Namespace::Signed, computed.hash, &tx).await.unwrap();

        let adapters = submit_success_harness(&utxo_manager, &cache, &hasher, &mempool, &repository, &failed_store, &network).await;
        let ctx = OpContext::new();

        let result = adapters.submit(&ctx, computed.hash).await;
        assert!(matches!(result, Err(CoreError::LockConflict(_))));
        assert_eq!(adapters.status(&ctx, computed.hash).await.unwrap(), TxStatus::Failed);
        assert!(failed_store.get_failure(computed.hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn submit_propagation_failure_leaves_tx_pending_via_mempool() {
        let utxo_manager = InMemoryUtxoManager::new();
        let outpoint = OutPoint::new([4; 32], 0);
        utxo_manager
            .seed_available(outpoint, TxOutput::asset(Address::from_bytes([1; 20]), AssetContent::NativeCoin { amount: "10".into() }), 0)
            .await;

        let hasher = Sha256CanonicalHasher::new();
        let cache = PendingTxCache::new(crate::capabilities::InMemoryStore::shared(), CacheTtlConfig::default());
        let mempool = InMemoryMempool::new(Arc::new(Sha256CanonicalHasher::new()));
        let repository = InMemoryRepository::new();
        let failed_store = InMemoryFailedRecordStore::new();
        let network = FailingNetwork;

        let tx = signed_tx(outpoint);
        let computed = hasher.compute(&tx, false).await.unwrap();
        cache.put(Namespace::Signed, computed.hash, &tx).await.unwrap();

        let adapters = LifecycleAdapters {
            hasher: &hasher,
            utxo_manager: &utxo_manager,
            cache: &cache,
            mempool: &mempool,
            repository: &repository,
            network: &network,
            neighbor_peers: &["peer-a".to_string()],
            failed_record_store: &failed_store,
            cache_ttls: &CacheTtlConfig::default(),
        };
        let ctx = OpContext::new();

        let result = adapters.submit(&ctx, computed.hash).await;
        assert!(result.is_err());
        // Propagation failure unwinds the UTXO locks but the tx is already
        // in the mempool, so it still reports Pending rather than Failed.
        assert_eq!(adapters.status(&ctx, computed.hash).await.unwrap(), TxStatus::Pending);
    }
}
