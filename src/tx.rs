//! The EUTXO data model: `Transaction`, its inputs/outputs, locking
//! conditions, and the three output content kinds (asset, resource, state).
//!
//! Modeled on `core/src/transaction.rs` (`Transaction`/`TxInput`/`TxOutput`)
//! and `core/src/tx_types.rs` (per-kind payload structs), generalized from a
//! single native-coin flow to the full asset/resource/state sum type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::fee::FeeMechanism;
use crate::token::TokenKey;

/// `(tx_id, output_index)` — identifies a single unspent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: [u8; 32],
    pub output_index: u32,
}

impl OutPoint {
    pub fn new(tx_id: [u8; 32], output_index: u32) -> Self {
        OutPoint { tx_id, output_index }
    }
}

/// A reference to a prior output. `is_reference_only` inputs read without
/// consuming; the selector always emits `is_reference_only=false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub is_reference_only: bool,
    pub sequence: u32,
}

impl TxInput {
    /// The sequence value the selector stamps on every spending input.
    pub const FINAL_SEQUENCE: u32 = 0xFFFF_FFFF;

    pub fn spending(previous_output: OutPoint) -> Self {
        TxInput {
            previous_output,
            is_reference_only: false,
            sequence: Self::FINAL_SEQUENCE,
        }
    }

    pub fn reference_only(previous_output: OutPoint) -> Self {
        TxInput {
            previous_output,
            is_reference_only: true,
            sequence: Self::FINAL_SEQUENCE,
        }
    }
}

/// Which of the seven locking-condition kinds guards an output. The core
/// only ever *constructs* `SingleKeyLock`; it must be able to deserialize
/// and validate all seven when consuming inputs built by other assemblers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LockingCondition {
    SingleKeyLock {
        required_address_hash: Address,
        required_algorithm: SignatureAlgorithm,
        sighash_type: SighashType,
    },
    MultiKeyLock {
        required_address_hashes: Vec<Address>,
        threshold: u32,
    },
    ContractLock {
        contract_address: Address,
        entry_point: String,
    },
    DelegationLock {
        delegator: Address,
        delegate: Address,
        expiry: u64,
    },
    ThresholdLock {
        sub_conditions: Vec<LockingCondition>,
        threshold: u32,
    },
    TimeLock {
        not_before: u64,
    },
    HeightLock {
        not_before_height: u64,
    },
}

impl LockingCondition {
    /// The condition every built `TxOutput` carries by default.
    pub fn single_key(required_address_hash: Address) -> Self {
        LockingCondition::SingleKeyLock {
            required_address_hash,
            required_algorithm: SignatureAlgorithm::EcdsaSecp256k1,
            sighash_type: SighashType::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    EcdsaSecp256k1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SighashType {
    All,
}

/// Identifies a contract token instance within its contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TokenIdentifier {
    FungibleClassId(String),
    NftUniqueId(String),
    SemiFungibleId { batch_id: String, instance_id: String },
}

/// Asset-output content: the native coin, or a contract-issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AssetContent {
    NativeCoin {
        /// Decimal string of a non-negative base-unit (wei) integer.
        amount: String,
    },
    ContractToken {
        contract_address: Address,
        token_identifier: TokenIdentifier,
        amount: String,
    },
}

impl AssetContent {
    pub fn amount_str(&self) -> &str {
        match self {
            AssetContent::NativeCoin { amount } => amount,
            AssetContent::ContractToken { amount, .. } => amount,
        }
    }

    /// The `TokenKey` bucket this content's value aggregates under.
    pub fn token_key(&self) -> TokenKey {
        match self {
            AssetContent::NativeCoin { .. } => TokenKey::native(),
            AssetContent::ContractToken {
                contract_address,
                token_identifier,
                ..
            } => {
                let contract_hex = hex::encode(contract_address.as_bytes());
                match token_identifier {
                    TokenIdentifier::FungibleClassId(class_id) => {
                        TokenKey::fungible(&contract_hex, class_id)
                    }
                    TokenIdentifier::NftUniqueId(nft_id) => {
                        TokenKey::non_fungible(&contract_hex, nft_id)
                    }
                    TokenIdentifier::SemiFungibleId { batch_id, instance_id } => {
                        TokenKey::semi_fungible(&contract_hex, batch_id, instance_id)
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceCategory {
    Static,
    Executable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutableType {
    Contract,
    AiModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractExecConfig {
    pub entry_points: Vec<String>,
    pub memory_limit_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModelExecConfig {
    pub input_shape: Vec<i64>,
    pub output_shape: Vec<i64>,
    pub runtime: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExecutionConfig {
    Contract(ContractExecConfig),
    AiModel(AiModelExecConfig),
}

/// A stored piece of executable code or static data, content-addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub category: ResourceCategory,
    pub executable_type: Option<ExecutableType>,
    pub content_hash: [u8; 32],
    pub mime_type: String,
    pub size: u64,
    pub creator_address: Address,
    pub name: String,
    pub version: String,
    pub description: String,
    pub execution_config: Option<ExecutionConfig>,
    /// Serialized as a sorted map so it participates deterministically in
    /// the canonical hash — maps used inside hashed fields are always
    /// serialized with keys in sorted order.
    pub custom_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageStrategy {
    ContentAddressed,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub resource: Resource,
    pub storage_strategy: StorageStrategy,
    pub storage_locations: Vec<Vec<u8>>,
    pub is_immutable: bool,
    pub creation_context: String,
    pub creation_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateContent {
    pub state_id: [u8; 32],
    pub state_version: u32,
    /// Structurally-valid placeholder until real proof generation lands;
    /// proof generation itself is out of scope here.
    pub zk_proof: Option<Vec<u8>>,
    pub execution_result_hash: [u8; 32],
    pub parent_state_hash: Option<[u8; 32]>,
    pub metadata: BTreeMap<String, String>,
}

/// The tagged union carried by every `TxOutput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OutputContent {
    Asset(AssetContent),
    Resource(ResourceContent),
    State(StateContent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub owner: Address,
    pub locking_conditions: Vec<LockingCondition>,
    pub content: OutputContent,
}

impl TxOutput {
    /// A standard asset output locked to its owner with a single-key lock.
    pub fn asset(owner: Address, content: AssetContent) -> Self {
        TxOutput {
            locking_conditions: vec![LockingCondition::single_key(owner)],
            owner,
            content: OutputContent::Asset(content),
        }
    }

    pub fn resource(owner: Address, content: ResourceContent) -> Self {
        TxOutput {
            locking_conditions: vec![LockingCondition::single_key(owner)],
            owner,
            content: OutputContent::Resource(content),
        }
    }

    pub fn state(owner: Address, content: StateContent) -> Self {
        TxOutput {
            locking_conditions: vec![LockingCondition::single_key(owner)],
            owner,
            content: OutputContent::State(content),
        }
    }

    /// The `TokenKey`/amount pair this output contributes to value
    /// conservation, if it is an asset output (resource/state outputs do
    /// not carry fungible value).
    pub fn asset_value(&self) -> Option<(TokenKey, &str)> {
        match &self.content {
            OutputContent::Asset(asset) => Some((asset.token_key(), asset.amount_str())),
            _ => None,
        }
    }
}

/// Unsigned and signed transactions share this structure; only `nonce` and
/// the locking proofs embedded in consumed inputs' source outputs differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Anti-replay nonce; `0` until signing sets it. The canonical hasher
    /// must treat `nonce=0` and any signed nonce as distinct transactions.
    pub nonce: u64,
    pub creation_timestamp: u64,
    /// Opaque cross-chain replay guard; non-empty for all non-genesis txs.
    pub chain_id: Vec<u8>,
    pub fee_mechanism: FeeMechanism,
}

impl Transaction {
    pub const CURRENT_VERSION: u32 = 1;

    /// A transaction with zero inputs is a coinbase/airdrop.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// A transaction with zero outputs is a burn and contributes no fee.
    pub fn is_burn(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn is_signed(&self) -> bool {
        self.nonce != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeeMechanism;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn coinbase_and_burn_classification() {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput::asset(
                addr(1),
                AssetContent::NativeCoin { amount: "5".into() },
            )],
            nonce: 0,
            creation_timestamp: 1,
            chain_id: vec![1],
            fee_mechanism: FeeMechanism::MinimumFee {
                amount: "0".into(),
                token: TokenKey::native(),
            },
        };
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_burn());

        let burn = Transaction {
            outputs: vec![],
            ..coinbase
        };
        assert!(burn.is_burn());
    }

    #[test]
    fn contract_token_token_key_round_trips() {
        let content = AssetContent::ContractToken {
            contract_address: addr(0xAA),
            token_identifier: TokenIdentifier::FungibleClassId("0xBB".into()),
            amount: "10".into(),
        };
        let key = content.token_key();
        assert_eq!(
            key.as_str(),
            format!("ft|{}|0xBB", hex::encode([0xAAu8; 20]))
        );
    }

    #[test]
    fn nonce_distinguishes_unsigned_from_signed() {
        let base = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            nonce: 0,
            creation_timestamp: 1,
            chain_id: vec![1],
            fee_mechanism: FeeMechanism::None,
        };
        let signed = Transaction { nonce: 42, ..base.clone() };
        assert!(!base.is_signed());
        assert!(signed.is_signed());
        assert_ne!(base, signed);
    }
}
