//! 4.6.7 Genesis: one zero-input transaction per funded account, sorted by
//! public key so the genesis set is deterministic across nodes; a single
//! zero-input, zero-output marker transaction if no accounts are funded.
//!
//! Grounded in `coinbase.rs`'s `CoinbaseBuilder` (also a zero-input,
//! deterministically-ordered construction), generalized from one
//! multi-token reward split across outputs to many single-output,
//! single-account transactions.

use num_bigint::BigUint;

use crate::assembler::AssemblerContext;
use crate::context::OpContext;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::token::TokenKey;
use crate::tx::{AssetContent, Transaction, TxOutput};

pub struct GenesisAccount {
    pub pubkey_hex: String,
    pub initial_balance_base_units: BigUint,
}

pub struct GenesisRequest {
    pub accounts: Vec<GenesisAccount>,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

impl<'a> AssemblerContext<'a> {
    /// One transaction per account, in a list sorted by hex pubkey so two
    /// nodes given the same account set always produce the same genesis
    /// transactions in the same order. An empty account list still yields
    /// exactly one marker transaction, so genesis assembly never returns
    /// nothing at all.
    pub async fn assemble_genesis(
        &self,
        ctx: &OpContext,
        mut request: GenesisRequest,
    ) -> Result<Vec<([u8; 32], Transaction)>, CoreError> {
        ctx.check()?;
        if request.accounts.is_empty() {
            let marker = Transaction {
                version: Transaction::CURRENT_VERSION,
                inputs: vec![],
                outputs: vec![],
                nonce: 0,
                creation_timestamp: request.timestamp,
                chain_id: request.chain_id,
                fee_mechanism: FeeMechanism::MinimumFee {
                    amount: "0".to_string(),
                    token: TokenKey::native(),
                },
            };
            let finalized = self.finalize(ctx, marker).await?;
            return Ok(vec![finalized]);
        }

        request.accounts.sort_by(|a, b| a.pubkey_hex.cmp(&b.pubkey_hex));

        let mut transactions = Vec::with_capacity(request.accounts.len());
        for (index, account) in request.accounts.into_iter().enumerate() {
            let pubkey_bytes = hex::decode(&account.pubkey_hex)
                .map_err(|e| CoreError::FormatInvalid(format!("invalid genesis pubkey hex: {e}")))?;
            let address = self.address_manager.public_key_to_address(&pubkey_bytes).await?;

            let tx = Transaction {
                version: Transaction::CURRENT_VERSION,
                inputs: vec![],
                outputs: vec![TxOutput::asset(
                    address,
                    AssetContent::NativeCoin {
                        amount: account.initial_balance_base_units.to_string(),
                    },
                )],
                nonce: index as u64,
                creation_timestamp: request.timestamp,
                chain_id: request.chain_id.clone(),
                fee_mechanism: FeeMechanism::MinimumFee {
                    amount: "0".to_string(),
                    token: TokenKey::native(),
                },
            };
            transactions.push(self.finalize(ctx, tx).await?);
        }

        Ok(transactions)
    }
}
