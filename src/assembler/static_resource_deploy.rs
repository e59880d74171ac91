//! Static resource deploy: pre-store an arbitrary (non-executable) blob via
//! `ResourceManager`, compute a size-proportional deploy fee, and emit a
//! single immutable `ResourceOutput` tagged `ResourceCategory::Static`.
//!
//! Grounded in `contract_deploy.rs`'s pre-store/fee/`ResourceOutput`
//! skeleton, stripped of the WASM header check and the
//! `executable_type`/`execution_config` fields a static resource never
//! carries.

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
use crate::tx::{Resource, ResourceCategory, ResourceContent, StorageStrategy, Transaction, TxOutput};

pub struct StaticResourceDeployRequest {
    pub deployer: Address,
    pub bytes: Vec<u8>,
    /// Path the caller has already staged `bytes` at, for
    /// `ResourceManager::store_resource_file`.
    pub staged_path: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub mime_type: String,
    pub custom_attributes: BTreeMap<String, String>,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_static_resource_deploy(
        &self,
        ctx: &OpContext,
        request: StaticResourceDeployRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;

        let size = request.bytes.len() as u64;
        let cfg = self.static_resource_config;
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
        let units = (size + cfg.bytes_per_unit - 1) / cfg.bytes_per_unit;
        let mut fee = base_fee + BigUint::from(units) * fee_per_unit;
        if fee < min_fee {
            fee = min_fee;
        }

        let content_hash = sha256(&request.bytes);
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("name".to_string(), request.name.clone());
        metadata.insert("version".to_string(), request.version.clone());

        let storage_locations = match self
            .resource_manager
            .store_resource_file(&request.staged_path, &metadata)
            .await
        {
            Ok(_) => vec![format!("cas:{}", hex::encode(content_hash)).into_bytes()],
            Err(err) => {
                warn!(error = %err, "static resource pre-store failed, continuing with empty storage_locations");
                vec![]
            }
        };

        let selection = UtxoSelector::select(&request.deployer, &fee, &TokenKey::native(), self.utxo_manager).await?;

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let resource_output = TxOutput::resource(
            request.deployer,
            ResourceContent {
                resource: Resource {
                    category: ResourceCategory::Static,
                    executable_type: None,
                    content_hash,
                    mime_type: request.mime_type,
                    size,
                    creator_address: request.deployer,
                    name: request.name,
                    version: request.version,
                    description: request.description,
                    execution_config: None,
                    custom_attributes: request.custom_attributes,
                },
                storage_strategy: StorageStrategy::ContentAddressed,
                storage_locations,
                is_immutable: true,
                creation_context: "static_resource_deploy".to_string(),
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
