//! TxAssemblers: one module per transaction flow, sharing a
//! common skeleton (derive sender, validate params, compute fee, select
//! UTXOs, construct outputs, assemble, hash, cache).
//!
//! Mirrors `enterprise::transaction::builder::TransactionBuilder`
//! fluent-construction style (`enterprise/src/transaction/builder.rs`),
//! generalized from one native-coin flow to all seven and from `u64`
//! amounts to `BigUint`; assembler services are constructed with injected
//! capabilities and hold only immutable references.

pub mod ai_model_deploy;
pub mod ai_model_infer;
pub mod asset_transfer;
pub mod batch_transfer;
pub mod contract_call;
pub mod contract_deploy;
pub mod genesis;
pub mod static_resource_deploy;

use num_bigint::BigUint;

use crate::cache::{Namespace, PendingTxCache};
use crate::capabilities::{AddressManager, ExecutionEngine, ResourceManager};
use crate::config::{AiModelConfig, ContractDeployConfig, StaticResourceConfig, TransactionConfig};
use crate::context::OpContext;
use crate::error::CoreError;
use crate::hasher::CanonicalHasher;
use crate::tx::Transaction;
use crate::utxo::UtxoManager;

/// Capabilities every assembler needs, held as immutable references — no
/// assembler owns mutable state of its own. Flows that don't use
/// `resource_manager`/`execution_engine`/the deploy/model configs simply
/// never read those fields.
pub struct AssemblerContext<'a> {
    pub address_manager: &'a dyn AddressManager,
    pub utxo_manager: &'a dyn UtxoManager,
    pub hasher: &'a dyn CanonicalHasher,
    pub cache: &'a PendingTxCache,
    pub resource_manager: &'a dyn ResourceManager,
    pub execution_engine: &'a dyn ExecutionEngine,
    pub transaction_config: &'a TransactionConfig,
    pub contract_deploy_config: &'a ContractDeployConfig,
    pub static_resource_config: &'a StaticResourceConfig,
    pub ai_model_config: &'a AiModelConfig,
}

impl<'a> AssemblerContext<'a> {
    /// Step 7-8 of the common skeleton: canonical-hash the assembled
    /// transaction, store it under `unsigned:`, and return the hash.
    ///
    /// `ctx` is re-checked here (as well as at each assemble_* entry point)
    /// since hashing and the cache write are themselves capability calls a
    /// cancellation should be able to preempt.
    pub async fn finalize(&self, ctx: &OpContext, tx: Transaction) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        let computed = self.hasher.compute(&tx, false).await?;
        self.cache.put(Namespace::Unsigned, computed.hash, &tx).await?;
        Ok((computed.hash, tx))
    }
}

/// The basis-points fee deduction shared by the flows that take it out of
/// the recipient's amount rather than charging it separately:
/// `actual_receive = amount - amount * rate / 10000`.
pub fn deduct_bps_fee(amount: &BigUint, rate_bps: u32) -> (BigUint, BigUint) {
    let fee = (amount * BigUint::from(rate_bps)) / BigUint::from(10_000u32);
    let actual_receive = amount - &fee;
    (actual_receive, fee)
}

pub fn reject_self_transfer(sender: &crate::address::Address, recipient: &crate::address::Address) -> Result<(), CoreError> {
    if sender == recipient {
        return Err(CoreError::InvalidInput("self-transfer is not permitted".to_string()));
    }
    Ok(())
}

/// Shared test fixture wiring for assembler unit tests: one instance of
/// every capability stand-in plus default configs, so each flow's tests
/// don't hand-roll the same `AssemblerContext` construction. Not used
/// outside `#[cfg(test)]`.
#[cfg(test)]
pub mod tests_support {
    use super::AssemblerContext;
    use crate::cache::PendingTxCache;
    use crate::capabilities::{
        AddressManager, InMemoryResourceManager, InMemoryStore, NoopExecutionEngine,
    };
    use crate::config::{AiModelConfig, CacheTtlConfig, ContractDeployConfig, StaticResourceConfig, TransactionConfig};
    use crate::error::CoreError;
    use crate::hasher::Sha256CanonicalHasher;
    use crate::utxo::UtxoManager;

    pub struct NoopAddressManager;

    #[async_trait::async_trait]
    impl AddressManager for NoopAddressManager {
        async fn public_key_to_address(&self, _pubkey: &[u8]) -> Result<crate::address::Address, CoreError> {
            Ok(crate::address::Address::from_bytes([0; 20]))
        }
    }

    /// Owns every capability instance an `AssemblerContext` borrows from,
    /// so the context itself can stay a cheap bag of references.
    pub struct TestHarness<'u> {
        pub utxo_manager: &'u dyn UtxoManager,
        pub hasher: Sha256CanonicalHasher,
        pub cache: PendingTxCache,
        pub address_manager: NoopAddressManager,
        pub resource_manager: InMemoryResourceManager,
        pub execution_engine: NoopExecutionEngine,
        pub transaction_config: TransactionConfig,
        pub contract_deploy_config: ContractDeployConfig,
        pub static_resource_config: StaticResourceConfig,
        pub ai_model_config: AiModelConfig,
    }

    impl<'u> TestHarness<'u> {
        pub fn context(&self) -> AssemblerContext<'_> {
            AssemblerContext {
                address_manager: &self.address_manager,
                utxo_manager: self.utxo_manager,
                hasher: &self.hasher,
                cache: &self.cache,
                resource_manager: &self.resource_manager,
                execution_engine: &self.execution_engine,
                transaction_config: &self.transaction_config,
                contract_deploy_config: &self.contract_deploy_config,
                static_resource_config: &self.static_resource_config,
                ai_model_config: &self.ai_model_config,
            }
        }
    }

    pub fn test_context(utxo_manager: &dyn UtxoManager) -> TestHarness<'_> {
        TestHarness {
            utxo_manager,
            hasher: Sha256CanonicalHasher::new(),
            cache: PendingTxCache::new(InMemoryStore::shared(), CacheTtlConfig::default()),
            address_manager: NoopAddressManager,
            resource_manager: InMemoryResourceManager::new(),
            execution_engine: NoopExecutionEngine,
            transaction_config: TransactionConfig::default(),
            contract_deploy_config: ContractDeployConfig::default(),
            static_resource_config: StaticResourceConfig::default(),
            ai_model_config: AiModelConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bps_fee_deduction_matches_scenario_a() {
        let (actual_receive, fee) = deduct_bps_fee(&BigUint::from(10_000_000_000u64), 30);
        assert_eq!(actual_receive, BigUint::from(9_970_000_000u64));
        assert_eq!(fee, BigUint::from(30_000_000u64));
    }

    #[test]
    fn bps_fee_can_round_to_zero_at_dust_scale() {
        let (actual_receive, fee) = deduct_bps_fee(&BigUint::from(1u32), 30);
        assert_eq!(actual_receive, BigUint::from(1u32));
        assert_eq!(fee, BigUint::from(0u32));
    }
}
