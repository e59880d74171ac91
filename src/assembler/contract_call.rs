//! 4.6.4 Contract call: invoke the `ExecutionEngine`, pay for consumed gas
//! plus transferred value, and emit the execution result as a
//! `StateOutput` (with a second error-marked output on failure).
//!
//! Mirrors `BlockchainState::execute_contract_call`
//! (`core/src/state.rs`, which currently stops at "processes the
//! transaction structure but doesn't execute WASM... TODO (Phase 3)")
//! for the "dispatch to an engine, record the outcome" shape, generalized
//! from a structure-only placeholder to an actual `ExecutionEngine` call
//! gas-priced per unit consumed.

use std::collections::BTreeMap;
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::address::Address;
use crate::assembler::AssemblerContext;
use crate::context::OpContext;
use crate::capabilities::ExecutionParams;
use crate::digest::{sha256, sha256_concat};
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::selector::UtxoSelector;
use crate::token::TokenKey;
use crate::tx::{StateContent, Transaction, TxOutput};

pub struct ContractCallRequest {
    pub caller: Address,
    pub contract_address: Address,
    pub method: String,
    pub serialized_args: Vec<u8>,
    pub value_transferred: BigUint,
    pub gas_price: BigUint,
    pub execution_fee_limit: BigUint,
    pub memory_limit: u64,
    pub timeout: Duration,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

const WASM_ENGINE: &str = "wasm";

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_contract_call(
        &self,
        ctx: &OpContext,
        request: ContractCallRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        let params = ExecutionParams {
            resource_id: request.contract_address,
            entry: request.method.clone(),
            payload: request.serialized_args,
            caller: request.caller,
            chain_id: request.chain_id.clone(),
            block_timestamp: request.timestamp,
            execution_fee_limit: request.execution_fee_limit.clone(),
            memory_limit: request.memory_limit,
            timeout: request.timeout,
        };

        let result = self.execution_engine.execute(WASM_ENGINE, params).await?;

        // Fee paid = consumed * gas_price + value_transferred.
        let fee = &result.consumed * &request.gas_price + &request.value_transferred;

        let selection = UtxoSelector::select(&request.caller, &fee, &TokenKey::native(), self.utxo_manager).await?;

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let mut outputs = Vec::new();
        if selection.change_amount_base_units > dust_threshold && !selection.change_amount_base_units.is_zero() {
            let change_content = TokenKey::native().to_asset_content(&selection.change_amount_base_units)?;
            outputs.push(TxOutput::asset(request.caller, change_content));
        }

        let state_id = sha256_concat(&[
            request.contract_address.as_bytes(),
            request.method.as_bytes(),
            &request.timestamp.to_be_bytes(),
        ]);

        let mut metadata = BTreeMap::new();
        metadata.insert("contract".to_string(), request.contract_address.to_string());
        metadata.insert("method".to_string(), request.method.clone());
        metadata.insert("success".to_string(), result.success.to_string());
        metadata.insert("gas_used".to_string(), result.consumed.to_string());
        metadata.insert("gas_limit".to_string(), request.execution_fee_limit.to_string());
        metadata.insert("caller".to_string(), request.caller.to_string());
        metadata.insert("timestamp".to_string(), request.timestamp.to_string());
        for (key, value) in &result.metadata {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }

        outputs.push(TxOutput::state(
            request.caller,
            StateContent {
                state_id,
                state_version: 1,
                // Placeholder pending real ZK-proof integration.
                zk_proof: None,
                execution_result_hash: sha256(&result.return_data),
                parent_state_hash: None,
                metadata: metadata.clone(),
            },
        ));

        if !result.success {
            let mut error_metadata = metadata;
            error_metadata.insert("type".to_string(), "execution_error".to_string());
            let error_message = result
                .metadata
                .get("error")
                .cloned()
                .unwrap_or_else(|| "contract execution failed".to_string());
            error_metadata.insert("error".to_string(), error_message);

            outputs.push(TxOutput::state(
                request.caller,
                StateContent {
                    state_id: sha256_concat(&[&state_id, b"error"]),
                    state_version: 1,
                    zk_proof: None,
                    execution_result_hash: sha256(&result.return_data),
                    parent_state_hash: Some(state_id),
                    metadata: error_metadata,
                },
            ));
        }

        let tx = Transaction {
            version: Transaction::CURRENT_VERSION,
            inputs: selection.inputs,
            outputs,
            nonce: 0,
            creation_timestamp: request.timestamp,
            chain_id: request.chain_id,
            fee_mechanism: FeeMechanism::ContractExecutionFee {
                base_fee: "0".to_string(),
                execution_fee: fee.to_string(),
                fee_token: TokenKey::native(),
            },
        };

        self.finalize(ctx, tx).await
    }
}
