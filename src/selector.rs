//! UtxoSelector: picks inputs for a required amount of a given
//! token, first-fit over the UtxoManager's (stable-within-call) listing.
//!
//! Modeled on `enterprise::transaction::builder::TransactionBuilder`'s
//! input-accumulation loop, generalized from `u64` to `BigUint` totals and
//! from a single native-coin token to arbitrary `TokenKey`s.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::address::Address;
use crate::error::CoreError;
use crate::token::TokenKey;
use crate::tx::{TxInput, TxOutput};
use crate::utxo::{ListFilter, UtxoCategory, UtxoManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<TxInput>,
    pub change_amount_base_units: BigUint,
}

pub struct UtxoSelector;

impl UtxoSelector {
    /// `select(owner, amount_required_base_units, token_key) -> {inputs, change} | InsufficientBalance`.
    ///
    /// First-fit: accumulate ASSET UTXOs matching `token_key` (skipping
    /// zero-value entries) in the manager's listing order until the running
    /// total reaches `amount_required_base_units`; the entry that crosses the
    /// threshold is the last one included. Does not lock anything — locking
    /// is deferred to submit: concurrent selections may race and the loser
    /// fails at submit, not here.
    pub async fn select(
        owner: &Address,
        amount_required_base_units: &BigUint,
        token_key: &TokenKey,
        utxo_manager: &dyn UtxoManager,
    ) -> Result<Selection, CoreError> {
        let candidates = utxo_manager
            .list_by_owner(
                owner,
                ListFilter {
                    category: Some(UtxoCategory::Asset),
                    include_locked: false,
                },
            )
            .await?;

        let mut inputs = Vec::new();
        let mut total = BigUint::zero();

        for utxo in candidates {
            let Some(output) = utxo.output() else { continue };
            let Some((key, amount_str)) = output.asset_value() else { continue };
            if &key != token_key {
                continue;
            }
            let Ok(amount) = amount_str.parse::<BigUint>() else { continue };
            if amount.is_zero() {
                continue;
            }

            total += &amount;
            inputs.push(TxInput::spending(utxo.outpoint));

            if total >= *amount_required_base_units {
                return Ok(Selection {
                    inputs,
                    change_amount_base_units: total - amount_required_base_units,
                });
            }
        }

        Err(CoreError::InsufficientBalance {
            token: token_key.clone(),
            required: amount_required_base_units.to_string(),
            available: total.to_string(),
        })
    }

    /// Builds a change `TxOutput` when the residual clears the dust
    /// threshold; below it, the residual is absorbed as additional miner
    /// fee and no output is emitted. `to_content` is fallible since every
    /// caller ultimately wraps `TokenKey::to_asset_content`.
    pub fn change_output(
        owner: Address,
        change_amount_base_units: &BigUint,
        dust_threshold: &BigUint,
        to_content: impl Fn(&BigUint) -> Result<crate::tx::AssetContent, CoreError>,
    ) -> Result<Option<TxOutput>, CoreError> {
        if change_amount_base_units <= dust_threshold {
            return Ok(None);
        }
        Ok(Some(TxOutput::asset(owner, to_content(change_amount_base_units)?)))
    }
}
