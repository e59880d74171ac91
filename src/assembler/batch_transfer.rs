//! 4.6.2 Batch transfer: many recipients, grouped UTXO selection per token.

use std::collections::{BTreeMap, HashSet};

use num_bigint::BigUint;

use crate::address::Address;
use crate::assembler::{deduct_bps_fee, AssemblerContext};
use crate::context::OpContext;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::selector::UtxoSelector;
use crate::token::TokenKey;
use crate::tx::{Transaction, TxInput, TxOutput};

pub struct BatchRecipient {
    pub recipient: Address,
    pub amount_base_units: BigUint,
    pub token: TokenKey,
}

pub struct BatchTransferRequest {
    pub sender: Address,
    pub recipients: Vec<BatchRecipient>,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_batch_transfer(
        &self,
        ctx: &OpContext,
        request: BatchTransferRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        if request.recipients.len() > self.transaction_config.max_batch_transfer_size {
            return Err(CoreError::InvalidInput(format!(
                "batch size {} exceeds max_batch_transfer_size {}",
                request.recipients.len(),
                self.transaction_config.max_batch_transfer_size
            )));
        }

        let mut seen_recipients = HashSet::new();
        for entry in &request.recipients {
            if !seen_recipients.insert(entry.recipient) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate recipient {entry_recipient}",
                    entry_recipient = entry.recipient
                )));
            }
            if entry.recipient == request.sender {
                return Err(CoreError::InvalidInput("batch entry names the sender as recipient".to_string()));
            }
        }

        // Group required amounts by token so the selector runs once per token.
        let mut required_by_token: BTreeMap<TokenKey, BigUint> = BTreeMap::new();
        for entry in &request.recipients {
            *required_by_token
                .entry(entry.token.clone())
                .or_insert_with(|| BigUint::from(0u32)) += &entry.amount_base_units;
        }

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let mut inputs: Vec<TxInput> = Vec::new();
        let mut change_by_token: BTreeMap<TokenKey, BigUint> = BTreeMap::new();
        for (token, required) in &required_by_token {
            let selection = UtxoSelector::select(&request.sender, required, token, self.utxo_manager).await?;
            inputs.extend(selection.inputs);
            change_by_token.insert(token.clone(), selection.change_amount_base_units);
        }

        let mut outputs = Vec::with_capacity(request.recipients.len() + change_by_token.len());
        for entry in &request.recipients {
            let (actual_receive, _fee) = deduct_bps_fee(
                &entry.amount_base_units,
                self.transaction_config.base_fee_rate_bps,
            );
            let content = entry.token.to_asset_content(&actual_receive)?;
            outputs.push(TxOutput::asset(entry.recipient, content));
        }
        for (token, change) in &change_by_token {
            if let Some(output) =
                UtxoSelector::change_output(request.sender, change, &dust_threshold, |amt| token.to_asset_content(amt))?
            {
                outputs.push(output);
            }
        }

        let tx = Transaction {
            version: Transaction::CURRENT_VERSION,
            inputs,
            outputs,
            nonce: 0,
            creation_timestamp: request.timestamp,
            chain_id: request.chain_id,
            fee_mechanism: FeeMechanism::None,
        };

        self.finalize(ctx, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests_support::test_context;
    use crate::context::OpContext;
    use crate::tx::{AssetContent, OutPoint};
    use crate::utxo::InMemoryUtxoManager;

    #[tokio::test]
    async fn scenario_c_duplicate_recipient_rejected() {
        let utxo_manager = InMemoryUtxoManager::new();
        let sender = Address::from_bytes([1; 20]);
        utxo_manager
            .seed_available(
                OutPoint::new([1; 32], 0),
                TxOutput::asset(sender, AssetContent::NativeCoin { amount: "1000".into() }),
                0,
            )
            .await;
        let harness = test_context(&utxo_manager);
        let ctx = harness.context();

        let duplicate = Address::from_bytes([2; 20]);
        let result = ctx
            .assemble_batch_transfer(&OpContext::new(), BatchTransferRequest {
                sender,
                recipients: vec![
                    BatchRecipient { recipient: duplicate, amount_base_units: BigUint::from(10u32), token: TokenKey::native() },
                    BatchRecipient { recipient: Address::from_bytes([3; 20]), amount_base_units: BigUint::from(10u32), token: TokenKey::native() },
                    BatchRecipient { recipient: duplicate, amount_base_units: BigUint::from(10u32), token: TokenKey::native() },
                ],
                chain_id: vec![1],
                timestamp: 1,
            })
            .await;

        match result {
            Err(CoreError::InvalidInput(message)) => assert!(message.contains("duplicate recipient")),
            other => panic!("expected InvalidInput mentioning duplicate recipient, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_batch_larger_than_max() {
        let utxo_manager = InMemoryUtxoManager::new();
        let mut harness = test_context(&utxo_manager);
        harness.transaction_config.max_batch_transfer_size = 1;
        let sender = Address::from_bytes([1; 20]);
        let ctx = harness.context();

        let result = ctx
            .assemble_batch_transfer(&OpContext::new(), BatchTransferRequest {
                sender,
                recipients: vec![
                    BatchRecipient { recipient: Address::from_bytes([2; 20]), amount_base_units: BigUint::from(1u32), token: TokenKey::native() },
                    BatchRecipient { recipient: Address::from_bytes([3; 20]), amount_base_units: BigUint::from(1u32), token: TokenKey::native() },
                ],
                chain_id: vec![1],
                timestamp: 1,
            })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn batch_size_at_max_is_accepted() {
        let utxo_manager = InMemoryUtxoManager::new();
        let sender = Address::from_bytes([1; 20]);
        utxo_manager
            .seed_available(
                OutPoint::new([9; 32], 0),
                TxOutput::asset(sender, AssetContent::NativeCoin { amount: "100000".into() }),
                0,
            )
            .await;
        let mut harness = test_context(&utxo_manager);
        harness.transaction_config.max_batch_transfer_size = 2;
        let ctx = harness.context();

        let result = ctx
            .assemble_batch_transfer(&OpContext::new(), BatchTransferRequest {
                sender,
                recipients: vec![
                    BatchRecipient { recipient: Address::from_bytes([2; 20]), amount_base_units: BigUint::from(1u32), token: TokenKey::native() },
                    BatchRecipient { recipient: Address::from_bytes([3; 20]), amount_base_units: BigUint::from(1u32), token: TokenKey::native() },
                ],
                chain_id: vec![1],
                timestamp: 1,
            })
            .await;
        assert!(result.is_ok());
    }
}
