//! 4.6.6 AI model infer: validate the inference payload against a size
//! cap, canonicalize non-binary inputs to JSON, invoke the execution
//! engine, and emit a simulated-result `StateOutput` paid for per-MiB plus
//! per-argument.
//!
//! Grounded in `contract_call.rs`'s execute/fee/`StateOutput` skeleton,
//! generalized from a single WASM-call invocation to a size- and
//! argument-count-priced inference request. `serde_json::Value::Object`
//! is backed by `BTreeMap` (the `preserve_order` feature is not enabled
//! in this crate), so serializing it already yields keys in sorted
//! order — no separate canonicalization pass is needed.

use std::collections::BTreeMap;
use std::time::Duration;

use num_bigint::BigUint;

use crate::address::Address;
use crate::assembler::AssemblerContext;
use crate::context::OpContext;
use crate::capabilities::ExecutionParams;
use crate::digest::sha256;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::selector::UtxoSelector;
use crate::token::TokenKey;
use crate::tx::{StateContent, Transaction, TxOutput};

const AI_ENGINE: &str = "ai_model";
const BYTES_PER_MIB: u64 = 1024 * 1024;

/// The shapes an inference argument may take; all but `Bytes` are
/// serialized to canonical JSON before being handed to the engine.
#[derive(Debug, Clone)]
pub enum InferInputKind {
    Bytes(Vec<u8>),
    String(String),
    Object(serde_json::Map<String, serde_json::Value>),
    Array(Vec<serde_json::Value>),
}

impl InferInputKind {
    fn encode(&self) -> Result<Vec<u8>, CoreError> {
        match self {
            InferInputKind::Bytes(bytes) => Ok(bytes.clone()),
            InferInputKind::String(s) => Ok(s.as_bytes().to_vec()),
            InferInputKind::Object(map) => serde_json::to_vec(map)
                .map_err(|e| CoreError::InvalidInput(format!("failed to serialize object input: {e}"))),
            InferInputKind::Array(values) => serde_json::to_vec(values)
                .map_err(|e| CoreError::InvalidInput(format!("failed to serialize array input: {e}"))),
        }
    }
}

pub struct AiModelInferRequest {
    pub caller: Address,
    pub model_address: Address,
    pub inputs: Vec<InferInputKind>,
    pub execution_fee_limit: BigUint,
    pub memory_limit: u64,
    pub timeout: Duration,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_ai_model_infer(
        &self,
        ctx: &OpContext,
        request: AiModelInferRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        let mut encoded_inputs = Vec::with_capacity(request.inputs.len());
        let mut total_bytes: u64 = 0;
        for input in &request.inputs {
            let encoded = input.encode()?;
            total_bytes += encoded.len() as u64;
            encoded_inputs.push(encoded);
        }

        let cfg = self.ai_model_config;
        let payload_mib = (total_bytes + BYTES_PER_MIB - 1) / BYTES_PER_MIB;
        if payload_mib > cfg.max_infer_payload_mib {
            return Err(CoreError::InvalidInput(format!(
                "inference payload {payload_mib} MiB exceeds max_infer_payload_mib {}",
                cfg.max_infer_payload_mib
            )));
        }

        let base_fee: BigUint = cfg
            .infer_base_fee
            .parse()
            .map_err(|_| CoreError::Internal("malformed infer_base_fee in config".to_string()))?;
        let size_fee_per_mib: BigUint = cfg
            .infer_size_fee_per_mib
            .parse()
            .map_err(|_| CoreError::Internal("malformed infer_size_fee_per_mib in config".to_string()))?;
        let param_fee: BigUint = cfg
            .infer_param_fee
            .parse()
            .map_err(|_| CoreError::Internal("malformed infer_param_fee in config".to_string()))?;

        let fee = base_fee
            + BigUint::from(payload_mib) * size_fee_per_mib
            + BigUint::from(request.inputs.len() as u64) * param_fee;

        // Concatenate the encoded arguments with a separator byte so the
        // engine receives a single payload, in argument order.
        let mut payload = Vec::new();
        for (index, encoded) in encoded_inputs.iter().enumerate() {
            if index > 0 {
                payload.push(0u8);
            }
            payload.extend_from_slice(encoded);
        }

        let params = ExecutionParams {
            resource_id: request.model_address,
            entry: "infer".to_string(),
            payload,
            caller: request.caller,
            chain_id: request.chain_id.clone(),
            block_timestamp: request.timestamp,
            execution_fee_limit: request.execution_fee_limit.clone(),
            memory_limit: request.memory_limit,
            timeout: request.timeout,
        };
        let result = self.execution_engine.execute(AI_ENGINE, params).await?;

        let selection = UtxoSelector::select(&request.caller, &fee, &TokenKey::native(), self.utxo_manager).await?;

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let mut outputs = Vec::new();
        if let Some(change) = UtxoSelector::change_output(
            request.caller,
            &selection.change_amount_base_units,
            &dust_threshold,
            |amt| TokenKey::native().to_asset_content(amt),
        )? {
            outputs.push(change);
        }

        let mut metadata: BTreeMap<String, String> = BTreeMap::new();
        metadata.insert("model".to_string(), request.model_address.to_string());
        metadata.insert("caller".to_string(), request.caller.to_string());
        metadata.insert("success".to_string(), result.success.to_string());
        metadata.insert("input_count".to_string(), request.inputs.len().to_string());
        metadata.insert("timestamp".to_string(), request.timestamp.to_string());
        for (key, value) in &result.metadata {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }

        outputs.push(TxOutput::state(
            request.caller,
            StateContent {
                state_id: sha256(&request.timestamp.to_be_bytes()),
                state_version: 1,
                // No real prover wired in yet; the result is a simulated
                // placeholder pending an executor.
                zk_proof: None,
                execution_result_hash: sha256(&result.return_data),
                parent_state_hash: None,
                metadata,
            },
        ));

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
