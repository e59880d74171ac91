//! 4.6.5 AI model deploy: mirrors contract deploy's pre-store-and-fee
//! shape, but detects the model format from its header bytes and sizes
//! the fee per MiB rather than per byte-unit.
//!
//! Grounded in `contract_deploy.rs`'s pre-store/fee/`ResourceOutput`
//! skeleton, generalized from a WASM-only header check to the
//! ONNX/PyTorch/Generic detection this flow calls for, and from a
//! byte-unit fee curve to a per-MiB one.

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
    AiModelExecConfig, ExecutableType, ExecutionConfig, Resource, ResourceCategory,
    ResourceContent, StorageStrategy, Transaction, TxOutput,
};

const ONNX_MAGIC: [u8; 2] = [0x08, 0x01];
const PYTORCH_MAGIC: [u8; 2] = [0x80, 0x03];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    PyTorch,
    Generic,
}

impl ModelFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ModelFormat::Onnx => "application/onnx",
            ModelFormat::PyTorch => "application/x-pytorch",
            ModelFormat::Generic => "application/octet-stream",
        }
    }
}

fn detect_model_format(bytes: &[u8]) -> ModelFormat {
    if bytes.len() >= 2 && bytes[0..2] == ONNX_MAGIC {
        ModelFormat::Onnx
    } else if bytes.len() >= 2 && bytes[0..2] == PYTORCH_MAGIC {
        ModelFormat::PyTorch
    } else {
        ModelFormat::Generic
    }
}

pub struct AiModelDeployRequest {
    pub deployer: Address,
    pub model_bytes: Vec<u8>,
    pub staged_path: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_shape: Vec<i64>,
    pub output_shape: Vec<i64>,
    pub runtime: String,
    pub custom_attributes: BTreeMap<String, String>,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

const BYTES_PER_MIB: u64 = 1024 * 1024;

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_ai_model_deploy(
        &self,
        ctx: &OpContext,
        request: AiModelDeployRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        let size_bytes = request.model_bytes.len() as u64;
        let cfg = self.ai_model_config;
        // Round up to a whole MiB, as `contract_deploy`'s byte-unit fee does.
        let size_mib = (size_bytes + BYTES_PER_MIB - 1) / BYTES_PER_MIB;

        if size_mib > cfg.max_model_size_mib {
            return Err(CoreError::InvalidInput(format!(
                "model size {size_mib} MiB exceeds max_model_size_mib {}",
                cfg.max_model_size_mib
            )));
        }

        let base_fee: BigUint = cfg
            .deploy_base_fee
            .parse()
            .map_err(|_| CoreError::Internal("malformed deploy_base_fee in config".to_string()))?;
        let fee_per_mib: BigUint = cfg
            .deploy_size_fee_per_mib
            .parse()
            .map_err(|_| CoreError::Internal("malformed deploy_size_fee_per_mib in config".to_string()))?;
        let fee = base_fee + BigUint::from(size_mib) * fee_per_mib;

        let format = detect_model_format(&request.model_bytes);
        let content_hash = sha256(&request.model_bytes);

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
                warn!(error = %err, "ai model resource pre-store failed, continuing with empty storage_locations");
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
                    executable_type: Some(ExecutableType::AiModel),
                    content_hash,
                    mime_type: format.mime_type().to_string(),
                    size: size_bytes,
                    creator_address: request.deployer,
                    name: request.name,
                    version: request.version,
                    description: request.description,
                    execution_config: Some(ExecutionConfig::AiModel(AiModelExecConfig {
                        input_shape: request.input_shape,
                        output_shape: request.output_shape,
                        runtime: request.runtime,
                    })),
                    custom_attributes: request.custom_attributes,
                },
                storage_strategy: StorageStrategy::ContentAddressed,
                storage_locations,
                is_immutable: true,
                creation_context: "ai_model_deploy".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests_support::test_context;
    use crate::context::OpContext;
    use crate::tx::{AssetContent, OutPoint, OutputContent};
    use crate::utxo::InMemoryUtxoManager;

    #[test]
    fn detects_onnx_header() {
        assert_eq!(detect_model_format(&[0x08, 0x01, 0x00]), ModelFormat::Onnx);
    }

    #[test]
    fn detects_pytorch_header() {
        assert_eq!(detect_model_format(&[0x80, 0x03, 0x00]), ModelFormat::PyTorch);
    }

    #[test]
    fn falls_back_to_generic() {
        assert_eq!(detect_model_format(&[0xAB, 0xCD]), ModelFormat::Generic);
    }

    #[tokio::test]
    async fn rejects_model_larger_than_configured_limit() {
        let utxo_manager = InMemoryUtxoManager::new();
        let deployer = Address::from_bytes([7; 20]);
        let mut harness = test_context(&utxo_manager);
        harness.ai_model_config.max_model_size_mib = 0;
        let ctx = harness.context();

        let result = ctx
            .assemble_ai_model_deploy(&OpContext::new(), AiModelDeployRequest {
                deployer,
                model_bytes: vec![0x08, 0x01, 0x00, 0x00],
                staged_path: "/tmp/model.onnx".to_string(),
                name: "classifier".to_string(),
                version: "1.0.0".to_string(),
                description: "an onnx model".to_string(),
                input_shape: vec![1, 3, 224, 224],
                output_shape: vec![1, 1000],
                runtime: "onnxruntime".to_string(),
                custom_attributes: BTreeMap::new(),
                chain_id: vec![1],
                timestamp: 1,
            })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn deploy_produces_ai_model_resource_output() {
        let utxo_manager = InMemoryUtxoManager::new();
        let deployer = Address::from_bytes([8; 20]);
        utxo_manager
            .seed_available(
                OutPoint::new([3; 32], 0),
                TxOutput::asset(deployer, AssetContent::NativeCoin { amount: "100000".into() }),
                0,
            )
            .await;

        let harness = test_context(&utxo_manager);
        let ctx = harness.context();

        let (_, tx) = ctx
            .assemble_ai_model_deploy(&OpContext::new(), AiModelDeployRequest {
                deployer,
                model_bytes: vec![0x08, 0x01, 0x00, 0x00],
                staged_path: "/tmp/model.onnx".to_string(),
                name: "classifier".to_string(),
                version: "1.0.0".to_string(),
                description: "an onnx model".to_string(),
                input_shape: vec![1, 3, 224, 224],
                output_shape: vec![1, 1000],
                runtime: "onnxruntime".to_string(),
                custom_attributes: BTreeMap::new(),
                chain_id: vec![1],
                timestamp: 1,
            })
            .await
            .unwrap();

        let resource_output = tx
            .outputs
            .iter()
            .find(|o| matches!(o.content, OutputContent::Resource(_)))
            .unwrap();
        match &resource_output.content {
            OutputContent::Resource(content) => {
                assert_eq!(content.resource.executable_type, Some(ExecutableType::AiModel));
                assert_eq!(content.resource.mime_type, "application/onnx");
            }
            _ => unreachable!(),
        }
    }
}
