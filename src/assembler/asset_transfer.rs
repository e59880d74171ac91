//! 4.6.1 Asset transfer (single recipient, single token).

use num_bigint::BigUint;

use crate::address::Address;
use crate::assembler::{deduct_bps_fee, reject_self_transfer, AssemblerContext};
use crate::context::OpContext;
use crate::error::CoreError;
use crate::fee::FeeMechanism;
use crate::selector::UtxoSelector;
use crate::token::TokenKey;
use crate::tx::{Transaction, TxOutput};

pub struct AssetTransferRequest {
    pub sender: Address,
    pub recipient: Address,
    pub amount_base_units: BigUint,
    pub token: TokenKey,
    pub chain_id: Vec<u8>,
    pub timestamp: u64,
}

impl<'a> AssemblerContext<'a> {
    pub async fn assemble_asset_transfer(
        &self,
        ctx: &OpContext,
        request: AssetTransferRequest,
    ) -> Result<([u8; 32], Transaction), CoreError> {
        ctx.check()?;
        reject_self_transfer(&request.sender, &request.recipient)?;

        let (actual_receive, fee) = deduct_bps_fee(
            &request.amount_base_units,
            self.transaction_config.base_fee_rate_bps,
        );
        if fee >= request.amount_base_units {
            return Err(CoreError::InvalidInput(
                "fee would consume the entire transfer amount".to_string(),
            ));
        }

        let selection = UtxoSelector::select(
            &request.sender,
            &request.amount_base_units,
            &request.token,
            self.utxo_manager,
        )
        .await?;

        let dust_threshold: BigUint = self
            .transaction_config
            .dust_threshold
            .parse()
            .map_err(|_| CoreError::Internal("malformed dust_threshold in config".to_string()))?;

        let recipient_content = request.token.to_asset_content(&actual_receive)?;
        let mut outputs = vec![TxOutput::asset(request.recipient, recipient_content)];
        if let Some(change) = UtxoSelector::change_output(
            request.sender,
            &selection.change_amount_base_units,
            &dust_threshold,
            |amt| request.token.to_asset_content(amt),
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
            fee_mechanism: FeeMechanism::None,
        };

        self.finalize(ctx, tx).await
    }
}
