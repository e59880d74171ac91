//! CoinbaseBuilder: deterministic multi-token reward assembly
//! from a block's aggregated fees.
//!
//! Mirrors `TransactionBuilder::build_with_change`
//! (`enterprise/src/transaction/builder.rs`) for the "assemble a
//! `Transaction` from parts" shape, generalized to a zero-input,
//! sorted-multi-output reward transaction instead of a single payer flow.

use std::collections::BTreeMap;

use num_bigint::BigUint;

use crate::address::Address;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::token::TokenKey;
use crate::tx::{LockingCondition, OutputContent, Transaction, TxOutput};

pub struct CoinbaseBuilder;

impl CoinbaseBuilder {
    /// `build(aggregated_fees, miner_addr, chain_id) -> Transaction`.
    ///
    /// No inputs; one output per `TokenKey` with a positive fee, in
    /// canonical-sorted (byte-lexicographic) `TokenKey` order — `BTreeMap`
    /// already iterates in that order, so no explicit sort is needed. An
    /// empty fee map yields a structurally valid, zero-output coinbase.
    pub fn build(
        aggregated_fees: &BTreeMap<TokenKey, BigUint>,
        miner_addr: Address,
        chain_id: Vec<u8>,
        now: u64,
    ) -> Result<Transaction, CoreError> {
        let mut outputs = Vec::with_capacity(aggregated_fees.len());
        for (token, amount) in aggregated_fees {
            if amount == &BigUint::from(0u32) {
                continue;
            }
            outputs.push(Self::reward_output(token, amount, miner_addr)?);
        }

        Ok(Transaction {
            version: Transaction::CURRENT_VERSION,
            inputs: vec![],
            outputs,
            nonce: 0,
            creation_timestamp: now,
            chain_id,
            fee_mechanism: FeeMechanism::MinimumFee {
                amount: "0".to_string(),
                token: TokenKey::native(),
            },
        })
    }

    fn reward_output(token: &TokenKey, amount: &BigUint, miner_addr: Address) -> Result<TxOutput, CoreError> {
        let content = token.to_asset_content(amount)?;
        Ok(TxOutput {
            owner: miner_addr,
            locking_conditions: vec![LockingCondition::single_key(miner_addr)],
            content: OutputContent::Asset(content),
        })
    }

    /// `validate(coinbase, expected_fees, miner_addr)`.
    pub fn validate(
        coinbase: &Transaction,
        expected_fees: &BTreeMap<TokenKey, BigUint>,
        miner_addr: Address,
    ) -> Result<(), CoreError> {
        if !coinbase.inputs.is_empty() {
            return Err(CoreError::FormatInvalid("coinbase must have no inputs".into()));
        }
        if coinbase.version == 0 {
            return Err(CoreError::FormatInvalid("coinbase version must be non-zero".into()));
        }
        if coinbase.chain_id.is_empty() {
            return Err(CoreError::FormatInvalid("coinbase chain_id must be non-empty".into()));
        }
        if coinbase.creation_timestamp == 0 {
            return Err(CoreError::FormatInvalid("coinbase timestamp must be non-zero".into()));
        }

        let positive_fee_count = expected_fees.values().filter(|v| *v != &BigUint::from(0u32)).count();
        if coinbase.outputs.len() != positive_fee_count {
            return Err(CoreError::FormatInvalid(format!(
                "coinbase output count {} does not match positive-fee count {}",
                coinbase.outputs.len(),
                positive_fee_count
            )));
        }

        let mut bucket_sums: BTreeMap<TokenKey, BigUint> = BTreeMap::new();
        for output in &coinbase.outputs {
            if output.owner != miner_addr {
                return Err(CoreError::FormatInvalid("coinbase output owner must be miner_addr".into()));
            }
            if let Some((token, amount_str)) = output.asset_value() {
                let amount = amount_str
                    .parse::<BigUint>()
                    .map_err(|_| CoreError::FormatInvalid(format!("malformed coinbase amount: {amount_str}")))?;
                *bucket_sums.entry(token).or_insert_with(|| BigUint::from(0u32)) += amount;
            }
        }

        for (token, expected) in expected_fees {
            if expected == &BigUint::from(0u32) {
                continue;
            }
            let actual = bucket_sums.get(token).cloned().unwrap_or_else(|| BigUint::from(0u32));
            if &actual != expected {
                return Err(CoreError::FormatInvalid(format!(
                    "coinbase bucket sum for {token} is {actual}, expected {expected}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn scenario_e_coinbase_output_order() {
        // Contract hex must decode to 20 bytes for the reward output builder.
        let hex_a = hex::encode([0xAAu8; 20]);
        let hex_b = hex::encode([0xABu8; 20]);
        let mut fees = BTreeMap::new();
        fees.insert(TokenKey::native(), BigUint::from(5u32));
        fees.insert(TokenKey::fungible(&hex_a, "BB"), BigUint::from(3u32));
        fees.insert(TokenKey::fungible(&hex_b, "BB"), BigUint::from(7u32));

        let miner = addr(9);
        let tx = CoinbaseBuilder::build(&fees, miner, vec![1], 100).unwrap();

        assert_eq!(tx.outputs.len(), 3);
        let order: Vec<TokenKey> = tx.outputs.iter().map(|o| o.asset_value().unwrap().0).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(order.last().unwrap(), &TokenKey::native());
    }

    #[test]
    fn empty_fee_map_yields_structurally_valid_empty_coinbase() {
        let tx = CoinbaseBuilder::build(&BTreeMap::new(), addr(9), vec![1], 100).unwrap();
        assert!(tx.outputs.is_empty());
        assert!(tx.inputs.is_empty());
    }

    #[test]
    fn validate_rejects_any_input() {
        let tx = Transaction {
            version: 1,
            inputs: vec![crate::tx::TxInput::spending(crate::tx::OutPoint::new([0; 32], 0))],
            outputs: vec![],
            nonce: 0,
            creation_timestamp: 1,
            chain_id: vec![1],
            fee_mechanism: FeeMechanism::None,
        };
        let result = CoinbaseBuilder::validate(&tx, &BTreeMap::new(), addr(9));
        assert!(result.is_err());
    }
}
