//! Config-controlled values: `chain_id`, fee rate, dust
//! threshold, batch/size limits, cache TTLs, resource size limits.
//!
//! Mirrors `NodeConfig`/`MempoolConfig`
//! (`node/src/config.rs`, `node/src/mempool.rs::MempoolConfig`) —
//! same `toml`-loadable, `Default`-implementing struct style, narrowed to
//! the fields this crate's `ConfigProvider` capability actually serves.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Decimal basis-point rate deducted in-flow by the asset-transfer and
    /// batch-transfer assemblers.
    pub base_fee_rate_bps: u32,
    /// Minimum change-output amount, in base units; smaller residuals are
    /// absorbed as additional miner fee.
    pub dust_threshold: String,
    pub max_batch_transfer_size: usize,
    pub max_transaction_size: usize,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            base_fee_rate_bps: 30,
            dust_threshold: "1000".to_string(),
            max_batch_transfer_size: 100,
            max_transaction_size: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDeployConfig {
    pub base_deploy_fee: String,
    pub min_deploy_fee: String,
    pub bytes_per_unit: u64,
    pub fee_per_byte_unit: String,
}

impl Default for ContractDeployConfig {
    fn default() -> Self {
        ContractDeployConfig {
            base_deploy_fee: "1000".to_string(),
            min_deploy_fee: "500".to_string(),
            bytes_per_unit: 1024,
            fee_per_byte_unit: "10".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticResourceConfig {
    pub base_deploy_fee: String,
    pub min_deploy_fee: String,
    pub bytes_per_unit: u64,
    pub fee_per_byte_unit: String,
}

impl Default for StaticResourceConfig {
    fn default() -> Self {
        StaticResourceConfig {
            base_deploy_fee: "500".to_string(),
            min_deploy_fee: "200".to_string(),
            bytes_per_unit: 1024,
            fee_per_byte_unit: "5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModelConfig {
    pub deploy_base_fee: String,
    pub deploy_size_fee_per_mib: String,
    pub infer_base_fee: String,
    pub infer_size_fee_per_mib: String,
    pub infer_param_fee: String,
    pub max_model_size_mib: u64,
    pub max_infer_payload_mib: u64,
}

impl Default for AiModelConfig {
    fn default() -> Self {
        AiModelConfig {
            deploy_base_fee: "2000".to_string(),
            deploy_size_fee_per_mib: "50".to_string(),
            infer_base_fee: "100".to_string(),
            infer_size_fee_per_mib: "20".to_string(),
            infer_param_fee: "5".to_string(),
            max_model_size_mib: 500,
            max_infer_payload_mib: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    pub unsigned_secs: u64,
    pub signed_secs: u64,
    pub multisig_secs: u64,
    pub status_confirmed_secs: u64,
    pub status_pending_secs: u64,
    pub status_failed_secs: u64,
    pub fee_estimate_secs: u64,
    pub validation_result_secs: u64,
    pub cleanup_interval_secs: u64,
    pub max_total_size_bytes: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        CacheTtlConfig {
            unsigned_secs: 30 * 60,
            signed_secs: 60 * 60,
            multisig_secs: 4 * 60 * 60,
            status_confirmed_secs: 60 * 60,
            status_pending_secs: 30,
            status_failed_secs: 10 * 60,
            fee_estimate_secs: 10 * 60,
            validation_result_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
            max_total_size_bytes: 512 * 1024 * 1024,
        }
    }
}

/// The value returned by the `ConfigProvider` capability's
/// `get_blockchain()` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub chain_id: Vec<u8>,
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub contract_deploy: ContractDeployConfig,
    #[serde(default)]
    pub static_resource: StaticResourceConfig,
    #[serde(default)]
    pub ai_model: AiModelConfig,
    #[serde(default)]
    pub cache_ttls: CacheTtlConfig,
}

impl BlockchainConfig {
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::DependencyFailure {
                capability: "ConfigProvider".to_string(),
                message: format!("reading {}: {e}", path.display()),
            })?;
        toml::from_str(&contents).map_err(|e| CoreError::DependencyFailure {
            capability: "ConfigProvider".to_string(),
            message: format!("parsing config: {e}"),
        })
    }

    pub fn development(chain_id: Vec<u8>) -> Self {
        BlockchainConfig {
            chain_id,
            transaction: TransactionConfig::default(),
            contract_deploy: ContractDeployConfig::default(),
            static_resource: StaticResourceConfig::default(),
            ai_model: AiModelConfig::default(),
            cache_ttls: CacheTtlConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_config_round_trips_through_toml() {
        let config = BlockchainConfig::development(vec![1, 2, 3]);
        let serialized = toml::to_string(&config).unwrap();
        let parsed: BlockchainConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.chain_id, config.chain_id);
        assert_eq!(parsed.transaction.max_batch_transfer_size, 100);
    }
}
