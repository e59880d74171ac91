//! 4.6.3 Contract deploy: pre-store WASM via `ResourceManager`, validate
//! the WASM header, compute a size-proportional deploy fee, and emit a
//! single immutable `ResourceOutput`.
//!
//! Mirrors `ContractInfo::validate_wasm`
//! (`core/src/contract.rs`, magic-number + size checks) for the header
//! validation, and `DeploymentBuilder::build_deployment_transaction`
//! (`enterprise/src/transaction/deployment.rs`) for the "one resource
//! output plus change" shape, generalized from a zero-fee deployment with
//! script-embedded bytecode to a content-addressed `ResourceOutput` with
//! an explicit size-proportional fee.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use tracing::warn;

use crate::address::Address;
use crate::assembler::AssemblerContext;
use crate::context::OpContext;
use crate::digest::sha256;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::selector::UtxoSelector;
use crate::token::TokenKey;
use crate::tx::{
    ContractExecConfig, ExecutionConfig, Resource, ResourceCategory, ResourceContent, Transaction,
    TxOutput, ExecutableType, StorageStrategy,
};

/// WASM binary magic + version 1 header, per the documented boundary behavior
/// ("WASM shorter than 8 bytes rejected; exactly 8-byte valid header
/// accepted").
const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const WASM_VERSION_1: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

pub struct ContractDeployRequest {
    pub deployer: Address,
    pub wasm_bytes: Vec<u8>,
    /// Path the caller has already staged `wasm_bytes` at, for
    /// `ResourceManager::store_resource_file` (which takes a path, not
    /// raw bytes, so the upload step is assumed to precede assembly).
    pub staged_path: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub entry_points: Vec<String>,
    pub memory_limit_pages: u32,
    pub custom_attributes: BTreeMap<String, String>,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

fn validate_wasm_header(bytes: &[u8]) -> Result<(), CoreError> {
    if bytes.len() < 8 {
        return Err(CoreError::InvalidInput(format!(
            "WASM bytecode too short: {} bytes, need at least 8",
            bytes.len()
        )));
    }
    if bytes[0..4] != WASM_MAGIC {
        return Err(CoreError::InvalidInput("invalid WASM magic number".to_string()));
    }
    if bytes[4..8] != WASM_VERSION_1 {
        return Err(CoreError::InvalidInput("unsupported WASM version, expected 1".to_string()));
    }
    Ok(())
}

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_contract_deploy(
        &self,
        ctx: &OpContext,
        request: ContractDeployRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        validate_wasm_header(&request.wasm_bytes)?;

        let code_size = request.wasm_bytes.len() as u64;
        let cfg = self.contract_deploy_config;
        let base_fee: BigUint = cfg
            .base_deploy_fee
            .parse()
            .map_err(|_| CoreError::Internal("malformed base_deploy_fee in config".to_string()))?;
        let min_fee: BigUint = cfg
            .min_deploy_fee
            .parse()
            .map_err(|_| CoreError::Internal("malformed min_deploy_fee in config".to_string()))?;
        let fee_per_unit: BigUint = cfg
            .fee_per_byte_unit
            .parse()
            .map_err(|_| CoreError::Internal("malformed fee_per_byte_unit in config".to_string()))?;
        let units = (code_size + cfg.bytes_per_unit - 1) / cfg.bytes_per_unit;
        let mut fee = base_fee + BigUint::from(units) * fee_per_unit;
        if fee < min_fee {
            fee = min_fee;
        }

        let content_hash = sha256(&request.wasm_bytes);
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("name".to_string(), request.name.clone());
        metadata.insert("version".to_string(), request.version.clone());

        // Soft degrade: a failed pre-store still yields a
        // structurally valid tx, just with empty storage_locations.
        let storage_locations = match self
            .resource_manager
            .store_resource_file(&request.staged_path, &metadata)
            .await
        {
            Ok(_) => vec![format!("cas:{}", hex::encode(content_hash)).into_bytes()],
            Err(err) => {
                warn!(error = %err, "contract resource pre-store failed, continuing with empty storage_locations");
                vec![]
            }
        };

        let selection = UtxoSelector::select(
            &request.deployer,
            &fee,
            &TokenKey::native(),
            self.utxo_manager,
        )
        .await?;

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let resource_output = TxOutput::resource(
            request.deployer,
            ResourceContent {
                resource: Resource {
                    category: ResourceCategory::Executable,
                    executable_type: Some(ExecutableType::Contract),
                    content_hash,
                    mime_type: "application/wasm".to_string(),
                    size: code_size,
                    creator_address: request.deployer,
                    name: request.name,
                    version: request.version,
                    description: request.description,
                    execution_config: Some(ExecutionConfig::Contract(ContractExecConfig {
                        entry_points: request.entry_points,
                        memory_limit_pages: request.memory_limit_pages,
                    })),
                    custom_attributes: request.custom_attributes,
                },
                storage_strategy: StorageStrategy::ContentAddressed,
                storage_locations,
                is_immutable: true,
                creation_context: "contract_deploy".to_string(),
                creation_timestamp: request.timestamp,
            },
        );

        let mut outputs = vec![resource_output];
        if let Some(change) = UtxoSelector::change_output(
            request.deployer,
            &selection.change_amount_base_units,
            &dust_threshold,
            |amt| TokenKey::native().to_asset_content(amt),
        )? {
            outputs.push(change);
        }

        let tx = Transaction {
            version: Transaction::CURRENT_VERSION,
            inputs: selection.inputs,
            outputs,
            nonce: 0,
            creation_timestamp: request.timestamp,
            chain_id: request.chain_id,
            fee_mechanism: FeeMechanism::MinimumFee {
                amount: fee.to_string(),
                token: TokenKey::native(),
            },
        };

        self.finalize(ctx, tx).await
    }
}
