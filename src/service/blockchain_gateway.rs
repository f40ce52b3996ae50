//! 账本网关
//!
//! 唯一执行链上网络 I/O 的组件：发送 (构造 → 签名 → 广播)、
//! 余额查询与交易状态查询。

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    domain::{
        models::{Transaction, Transfer, WalletBalance},
        token::NATIVE_TOKEN_ID,
        transaction_status::StatusReport,
    },
    error::{CoreError, CoreResult, LedgerStage},
    service::{
        signer::{TransactionSigner, TransferCall},
        tron_client::{decode_node_message, TronNode},
    },
};

/// 账本能力接口，测试中可替换为内存实现
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// 成功时返回 pending / 0 确认的交易；失败时不产生任何记录
    async fn send(&self, transfer: &Transfer) -> CoreResult<Transaction>;

    async fn balance(&self, address: &str) -> CoreResult<WalletBalance>;

    async fn transaction_status(&self, tx_id: &str) -> CoreResult<StatusReport>;
}

pub struct BlockchainGateway {
    node: Arc<dyn TronNode>,
    signer: TransactionSigner,
}

impl BlockchainGateway {
    pub fn new(node: Arc<dyn TronNode>, signer: TransactionSigner) -> Self {
        Self { node, signer }
    }
}

#[async_trait]
impl LedgerGateway for BlockchainGateway {
    async fn send(&self, transfer: &Transfer) -> CoreResult<Transaction> {
        let call = self.signer.build(transfer)?;

        let envelope = match call {
            TransferCall::Native(request) => self.node.create_transaction(&request).await?,
            TransferCall::Contract(request) => {
                let response = self.node.trigger_smart_contract(&request).await?;
                if !response.result.result {
                    let message = response
                        .result
                        .message
                        .as_deref()
                        .map(decode_node_message)
                        .unwrap_or_else(|| "result=false".to_string());
                    return Err(CoreError::rejected(
                        LedgerStage::TriggerSmartContract,
                        message,
                    ));
                }
                response.transaction.ok_or_else(|| {
                    CoreError::rejected(
                        LedgerStage::TriggerSmartContract,
                        "response carries no transaction",
                    )
                })?
            }
        };

        let signed = self.signer.sign(envelope, &transfer.private_key)?;
        let tx_id = signed.tx_id().to_string();

        let result = self.node.broadcast_transaction(&signed).await?;
        if !result.result {
            let reason = result.reason();
            tracing::warn!(
                tx_id = %tx_id,
                from = %transfer.from_address,
                token = %transfer.token,
                reason = %reason,
                "Broadcast rejected by node"
            );
            return Err(CoreError::rejected(LedgerStage::Broadcast, reason));
        }

        tracing::info!(
            tx_id = %tx_id,
            from = %transfer.from_address,
            to = %transfer.to_address,
            amount = %transfer.amount,
            token = %transfer.token,
            "Transaction broadcast"
        );

        Ok(Transaction::pending(tx_id, transfer))
    }

    async fn balance(&self, address: &str) -> CoreResult<WalletBalance> {
        let holdings = self.node.account_tokens(address).await?;
        let registry = self.signer.registry();

        let mut balance = WalletBalance::default();
        for (symbol, _) in registry.contract_tokens() {
            balance.tokens.insert(symbol.to_string(), Decimal::ZERO);
        }

        for holding in holdings.iter().filter(|h| h.quantity > Decimal::ZERO) {
            if holding.token_id == NATIVE_TOKEN_ID {
                balance.trx = holding.quantity;
            } else if let Some(symbol) = registry.symbol_for_contract(&holding.token_id) {
                balance.tokens.insert(symbol.to_string(), holding.quantity);
            }
        }

        Ok(balance)
    }

    async fn transaction_status(&self, tx_id: &str) -> CoreResult<StatusReport> {
        let info = match self.node.transaction_info(tx_id).await? {
            Some(info) => info,
            None => return Ok(StatusReport::pending()),
        };

        if info.is_failed() {
            tracing::debug!(
                tx_id = %tx_id,
                reason = ?info.failure_reason(),
                "Transaction failed on chain"
            );
            return Ok(StatusReport::failed());
        }

        let block_number = match info.block_number {
            Some(number) => number,
            None => return Ok(StatusReport::pending()),
        };

        let latest = self.node.latest_block_number().await?;
        Ok(StatusReport::confirmed(latest.saturating_sub(block_number)))
    }
}
