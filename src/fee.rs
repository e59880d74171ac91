//! FeeEngine: the calculator, mechanism validator and estimator sub-contracts,
//! plus the `FeeMechanism` tagged union carried on every `Transaction`.
//!
//! Modeled on `Transaction::validate_fee`/`calculate_fee`
//! (`core/src/transaction.rs`) and `BlockchainState::calculate_transaction_fee`
//! (`core/src/state.rs`) for the UTXO-diff style, generalized from a single
//! native-coin fee to per-`TokenKey` buckets and from `u64` to
//! `num_bigint::BigUint` arithmetic throughout, for arbitrary-precision
//! amounts.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FeeError;
use crate::token::TokenKey;
use crate::tx::{Transaction, TxOutput};
use crate::utxo::UtxoManager;

/// The fee mechanism a transaction declares; dispatches which formula the
/// validator applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FeeMechanism {
    /// Accept any non-negative UTXO diff; the default.
    None,
    MinimumFee {
        amount: String,
        token: TokenKey,
    },
    ProportionalFee {
        rate_basis_points: u32,
        fee_token: TokenKey,
        max_fee: Option<String>,
    },
    ContractExecutionFee {
        base_fee: String,
        execution_fee: String,
        fee_token: TokenKey,
    },
    PriorityFee {
        base_fee: String,
        /// Multiplier on `base_fee`; must be `>= 1`.
        priority_rate: u32,
        fee_token: TokenKey,
    },
}

impl FeeMechanism {
    /// The token the mechanism requires fee to be paid in, if it names one.
    pub fn fee_token(&self) -> Option<&TokenKey> {
        match self {
            FeeMechanism::None => None,
            FeeMechanism::MinimumFee { token, .. } => Some(token),
            FeeMechanism::ProportionalFee { fee_token, .. } => Some(fee_token),
            FeeMechanism::ContractExecutionFee { fee_token, .. } => Some(fee_token),
            FeeMechanism::PriorityFee { fee_token, .. } => Some(fee_token),
        }
    }
}

/// Per-token-bucket diffs plus bookkeeping about unresolved inputs, the
/// calculator's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFee {
    pub tx_id: [u8; 32],
    /// Only positive per-`TokenKey` diffs are retained.
    pub fees: BTreeMap<TokenKey, BigUint>,
    pub stats: FeeStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeStats {
    pub inputs_resolved: usize,
    pub inputs_skipped: usize,
}

impl TransactionFee {
    pub fn fee_for(&self, token: &TokenKey) -> BigUint {
        self.fees.get(token).cloned().unwrap_or_else(BigUint::zero)
    }
}

fn parse_amount(amount: &str) -> Result<BigUint, FeeError> {
    amount.parse::<BigUint>().map_err(|_| FeeError::MissingFeeToken {
        token: TokenKey::native(),
    })
}

/// Sum an output's asset value into a per-`TokenKey` accumulator.
fn accumulate(map: &mut BTreeMap<TokenKey, BigUint>, output: &TxOutput) {
    if let Some((token, amount_str)) = output.asset_value() {
        let Ok(amount) = amount_str.parse::<BigUint>() else {
            warn!(token = %token, amount = amount_str, "malformed output amount, skipping");
            return;
        };
        let entry = map.entry(token).or_insert_with(BigUint::zero);
        *entry += amount;
    }
}

/// The calculator, mechanism validator and estimator. Stateless: every
/// method takes the `UtxoManager` it needs as an argument rather than
/// holding one — no global mutable state, immutable references only.
pub struct FeeEngine;

impl FeeEngine {
    /// `compute_utxo_diff(tx, fetch_utxo) -> TransactionFee`.
    ///
    /// Failed input lookups are tolerated: logged and excluded from the
    /// input side of the diff rather than failing the whole computation.
    pub async fn compute_utxo_diff(
        tx_id: [u8; 32],
        tx: &Transaction,
        utxo_manager: &dyn UtxoManager,
    ) -> TransactionFee {
        let mut input_totals: BTreeMap<TokenKey, BigUint> = BTreeMap::new();
        let mut stats = FeeStats::default();

        for input in &tx.inputs {
            match utxo_manager.get(&input.previous_output).await {
                Ok(Some(utxo)) => match utxo.output() {
                    Some(output) => {
                        accumulate(&mut input_totals, output);
                        stats.inputs_resolved += 1;
                    }
                    None => {
                        warn!(outpoint = ?input.previous_output, "reference-only UTXO has no cached output, skipping");
                        stats.inputs_skipped += 1;
                    }
                },
                Ok(None) => {
                    warn!(outpoint = ?input.previous_output, "input UTXO not found, skipping from fee diff");
                    stats.inputs_skipped += 1;
                }
                Err(err) => {
                    warn!(outpoint = ?input.previous_output, error = %err, "UTXO lookup failed, skipping from fee diff");
                    stats.inputs_skipped += 1;
                }
            }
        }

        let mut output_totals: BTreeMap<TokenKey, BigUint> = BTreeMap::new();
        for output in &tx.outputs {
            accumulate(&mut output_totals, output);
        }

        let mut fees = BTreeMap::new();
        for (token, input_total) in &input_totals {
            let output_total = output_totals.get(token).cloned().unwrap_or_else(BigUint::zero);
            if *input_total > output_total {
                fees.insert(token.clone(), input_total - output_total);
            }
        }

        TransactionFee { tx_id, fees, stats }
    }

    /// `validate(tx, fetch_utxo) -> Ok | FeeError`.
    pub async fn validate(tx: &Transaction, utxo_manager: &dyn UtxoManager) -> Result<(), FeeError> {
        let diff = Self::compute_utxo_diff([0u8; 32], tx, utxo_manager).await;

        match &tx.fee_mechanism {
            FeeMechanism::None => Ok(()),

            FeeMechanism::MinimumFee { amount, token } => {
                let required = parse_amount(amount)?;
                let actual = diff.fee_for(token);
                if actual >= required {
                    Ok(())
                } else {
                    Err(FeeError::BelowMinimum {
                        token: token.clone(),
                        required: required.to_string(),
                        actual: actual.to_string(),
                    })
                }
            }

            FeeMechanism::ProportionalFee {
                rate_basis_points,
                fee_token,
                max_fee,
            } => {
                let input_owners = Self::input_owners(tx, utxo_manager).await;
                let mut transfer_total = BigUint::zero();
                for output in &tx.outputs {
                    if let Some((token, amount_str)) = output.asset_value() {
                        if &token != fee_token {
                            continue;
                        }
                        let is_change = input_owners.contains(&output.owner);
                        if is_change {
                            continue;
                        }
                        if let Ok(amount) = amount_str.parse::<BigUint>() {
                            transfer_total += amount;
                        }
                    }
                }
                let mut required = (transfer_total * BigUint::from(*rate_basis_points)) / BigUint::from(10_000u32);
                if let Some(max_fee) = max_fee {
                    let cap = parse_amount(max_fee)?;
                    if required > cap {
                        required = cap;
                    }
                }
                let actual = diff.fee_for(fee_token);
                if actual >= required {
                    Ok(())
                } else {
                    Err(FeeError::ProportionalUnderpaid {
                        token: fee_token.clone(),
                        required: required.to_string(),
                        actual: actual.to_string(),
                    })
                }
            }

            FeeMechanism::ContractExecutionFee {
                base_fee,
                execution_fee,
                fee_token,
            } => {
                let required = parse_amount(base_fee)? + parse_amount(execution_fee)?;
                let actual = diff.fee_for(fee_token);
                if actual >= required {
                    Ok(())
                } else {
                    Err(FeeError::ContractFeeUnderpaid {
                        token: fee_token.clone(),
                        required: required.to_string(),
                        actual: actual.to_string(),
                    })
                }
            }

            FeeMechanism::PriorityFee {
                base_fee,
                priority_rate,
                fee_token,
            } => {
                let required = parse_amount(base_fee)? * BigUint::from((*priority_rate).max(1));
                let actual = diff.fee_for(fee_token);
                if actual >= required {
                    Ok(())
                } else {
                    Err(FeeError::PriorityUnderpaid {
                        token: fee_token.clone(),
                        required: required.to_string(),
                        actual: actual.to_string(),
                    })
                }
            }
        }
    }

    /// `estimate(tx, fetch_utxo) -> {conservative, standard, fast, token, mechanism, details}`.
    pub async fn estimate(tx: &Transaction, utxo_manager: &dyn UtxoManager) -> Result<FeeEstimate, FeeError> {
        let (token, conservative) = Self::required_amount(tx, utxo_manager).await?;
        let standard = &conservative + (&conservative * BigUint::from(5u32)) / BigUint::from(100u32);
        let fast = &conservative + (&conservative * BigUint::from(10u32)) / BigUint::from(100u32);
        Ok(FeeEstimate {
            conservative,
            standard,
            fast,
            token,
            mechanism: tx.fee_mechanism.clone(),
        })
    }

    async fn required_amount(
        tx: &Transaction,
        utxo_manager: &dyn UtxoManager,
    ) -> Result<(TokenKey, BigUint), FeeError> {
        Ok(match &tx.fee_mechanism {
            FeeMechanism::None => (TokenKey::native(), BigUint::zero()),
            FeeMechanism::MinimumFee { amount, token } => (token.clone(), parse_amount(amount)?),
            FeeMechanism::ContractExecutionFee {
                base_fee,
                execution_fee,
                fee_token,
            } => (fee_token.clone(), parse_amount(base_fee)? + parse_amount(execution_fee)?),
            FeeMechanism::PriorityFee {
                base_fee,
                priority_rate,
                fee_token,
            } => (fee_token.clone(), parse_amount(base_fee)? * BigUint::from((*priority_rate).max(1))),
            FeeMechanism::ProportionalFee {
                rate_basis_points,
                fee_token,
                max_fee,
            } => {
                let input_owners = Self::input_owners(tx, utxo_manager).await;
                let mut transfer_total = BigUint::zero();
                for output in &tx.outputs {
                    if let Some((token, amount_str)) = output.asset_value() {
                        if &token != fee_token || input_owners.contains(&output.owner) {
                            continue;
                        }
                        if let Ok(amount) = amount_str.parse::<BigUint>() {
                            transfer_total += amount;
                        }
                    }
                }
                let mut required = (transfer_total * BigUint::from(*rate_basis_points)) / BigUint::from(10_000u32);
                if let Some(max_fee) = max_fee {
                    let cap = parse_amount(max_fee)?;
                    if required > cap {
                        required = cap;
                    }
                }
                (fee_token.clone(), required)
            }
        })
    }

    async fn input_owners(
        tx: &Transaction,
        utxo_manager: &dyn UtxoManager,
    ) -> std::collections::HashSet<crate::address::Address> {
        let mut owners = std::collections::HashSet::new();
        for input in &tx.inputs {
            if let Ok(Some(utxo)) = utxo_manager.get(&input.previous_output).await {
                if let Some(output) = utxo.output() {
                    owners.insert(output.owner);
                }
            }
        }
        owners
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub conservative: BigUint,
    pub standard: BigUint,
    pub fast: BigUint,
    pub token: TokenKey,
    pub mechanism: FeeMechanism,
}
