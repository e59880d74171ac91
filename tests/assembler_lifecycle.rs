//! Full assemble -> sign -> submit -> validate -> status round trip
//! exercised only through the public `weisyn_core` API, matching the
//! teacher's dual-layer test convention (unit tests in `#[cfg(test)]`
//! modules, integration tests here).

use async_trait::async_trait;
use num_bigint::BigUint;

use weisyn_core::address::Address;
use weisyn_core::assembler::asset_transfer::AssetTransferRequest;
use weisyn_core::assembler::AssemblerContext;
use weisyn_core::cache::{Namespace, PendingTxCache};
use weisyn_core::capabilities::{
    AddressManager, InMemoryFailedRecordStore, InMemoryMempool, InMemoryRepository,
    InMemoryResourceManager, InMemoryStore, NoopExecutionEngine, NoopNetwork, SignatureManager,
};
use weisyn_core::config::{
    AiModelConfig, CacheTtlConfig, ContractDeployConfig, StaticResourceConfig, TransactionConfig,
};
use weisyn_core::context::OpContext;
use weisyn_core::error::CoreError;
use weisyn_core::hasher::Sha256CanonicalHasher;
use weisyn_core::lifecycle::{LifecycleAdapters, TxStatus};
use weisyn_core::token::TokenKey;
use weisyn_core::tx::{AssetContent, OutPoint, Transaction, TxOutput};
use weisyn_core::utxo::InMemoryUtxoManager;
use weisyn_core::validation::ValidationManager;

struct StubAddressManager;

#[async_trait]
impl AddressManager for StubAddressManager {
    async fn public_key_to_address(&self, _pubkey: &[u8]) -> Result<Address, CoreError> {
        Ok(Address::from_bytes([0; 20]))
    }
}

struct AlwaysVerifies;

#[async_trait]
impl SignatureManager for AlwaysVerifies {
    async fn sign(&self, _priv_bytes: &[u8], _message: &[u8]) -> Result<Vec<u8>, CoreError> {
        Ok(vec![])
    }

    async fn verify(&self, _pubkey: &[u8], _message: &[u8], _signature: &[u8]) -> Result<bool, CoreError> {
        Ok(true)
    }
}

#[tokio::test]
async fn asset_transfer_round_trips_through_sign_submit_validate_status() {
    let sender = Address::from_bytes([1; 20]);
    let recipient = Address::from_bytes([2; 20]);

    let utxo_manager = InMemoryUtxoManager::new();
    utxo_manager
        .seed_available(
            OutPoint::new([7; 32], 0),
            TxOutput::asset(sender, AssetContent::NativeCoin { amount: "12000000000".into() }),
            0,
        )
        .await;

    let hasher = Sha256CanonicalHasher::new();
    let cache = PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default());
    let address_manager = StubAddressManager;
    let resource_manager = InMemoryResourceManager::new();
    let execution_engine = NoopExecutionEngine;
    let transaction_config = TransactionConfig::default();
    let contract_deploy_config = ContractDeployConfig::default();
    let static_resource_config = StaticResourceConfig::default();
    let ai_model_config = AiModelConfig::default();

    let assembler = AssemblerContext {
        address_manager: &address_manager,
        utxo_manager: &utxo_manager,
        hasher: &hasher,
        cache: &cache,
        resource_manager: &resource_manager,
        execution_engine: &execution_engine,
        transaction_config: &transaction_config,
        contract_deploy_config: &contract_deploy_config,
        static_resource_config: &static_resource_config,
        ai_model_config: &ai_model_config,
    };

    let ctx = OpContext::new();
    let (unsigned_hash, unsigned_tx) = assembler
        .assemble_asset_transfer(&ctx, AssetTransferRequest {
            sender,
            recipient,
            amount_base_units: BigUint::from(10_000_000_000u64),
            token: TokenKey::native(),
            chain_id: vec![1],
            timestamp: 1,
        })
        .await
        .unwrap();

    // Signing is simulated by setting a non-zero nonce; a real caller would
    // also fill in each input's locking proof via its own signer.
    let signed_tx = Transaction { nonce: 1, ..unsigned_tx.clone() };

    let mempool = InMemoryMempool::new(std::sync::Arc::new(Sha256CanonicalHasher::new()));
    let repository = InMemoryRepository::new();
    let failed_record_store = InMemoryFailedRecordStore::new();
    let network = NoopNetwork;
    let cache_ttls = CacheTtlConfig::default();

    let lifecycle = LifecycleAdapters {
        hasher: &hasher,
        utxo_manager: &utxo_manager,
        cache: &cache,
        mempool: &mempool,
        repository: &repository,
        network: &network,
        neighbor_peers: &[],
        failed_record_store: &failed_record_store,
        cache_ttls: &cache_ttls,
    };

    let signed_hash = lifecycle.sign(&ctx, unsigned_hash, signed_tx).await.unwrap();

    let local_chain_id = vec![1u8];
    let signature_manager = AlwaysVerifies;
    let validation = ValidationManager {
        hasher: &hasher,
        utxo_manager: &utxo_manager,
        signature_manager: &signature_manager,
        cache: &cache,
        local_chain_id: &local_chain_id,
        cache_ttls: &cache_ttls,
    };
    assert!(validation.validate(&ctx, signed_hash).await.unwrap());

    let submitted_hash = lifecycle.submit(&ctx, signed_hash).await.unwrap();
    assert_eq!(lifecycle.status(&ctx, submitted_hash).await.unwrap(), TxStatus::Pending);

    let fee = lifecycle.estimate_fee(&ctx, &unsigned_tx).await.unwrap();
    assert_eq!(fee, BigUint::from(0u32));
    let cached_estimate = cache
        .get_record::<weisyn_core::fee::FeeEstimate>(Namespace::FeeEstimate, unsigned_hash)
        .await
        .unwrap();
    assert!(cached_estimate.is_some());
}

#[tokio::test]
async fn submit_without_a_prior_sign_is_not_found() {
    let utxo_manager = InMemoryUtxoManager::new();
    let hasher = Sha256CanonicalHasher::new();
    let cache = PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default());
    let mempool = InMemoryMempool::new(std::sync::Arc::new(Sha256CanonicalHasher::new()));
    let repository = InMemoryRepository::new();
    let failed_record_store = InMemoryFailedRecordStore::new();
    let network = NoopNetwork;
    let cache_ttls = CacheTtlConfig::default();

    let lifecycle = LifecycleAdapters {
        hasher: &hasher,
        utxo_manager: &utxo_manager,
        cache: &cache,
        mempool: &mempool,
        repository: &repository,
        network: &network,
        neighbor_peers: &[],
        failed_record_store: &failed_record_store,
        cache_ttls: &cache_ttls,
    };

    let ctx = OpContext::new();
    let result = lifecycle.submit(&ctx, [9u8; 32]).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}
