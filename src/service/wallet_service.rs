//! 钱包业务服务：创建、查询、余额与转账

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    domain::{
        address,
        derivation::KeyDerivation,
        models::{
            Page, PageRequest, Transaction, Transfer, Wallet, WalletBalance, WalletFilter,
            WalletKind,
        },
        token::TokenRegistry,
        transaction_status::TransactionStatus,
    },
    error::{CoreError, CoreResult},
    repository::{TransactionRepository, WalletRepository},
    service::blockchain_gateway::LedgerGateway,
};

/// 转账请求 (显示单位)
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub token: String,
}

pub struct WalletService {
    wallets: Arc<dyn WalletRepository>,
    transactions: Arc<dyn TransactionRepository>,
    gateway: Arc<dyn LedgerGateway>,
    derivation: Arc<dyn KeyDerivation>,
    tokens: TokenRegistry,
}

impl WalletService {
    pub fn new(
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn LedgerGateway>,
        derivation: Arc<dyn KeyDerivation>,
        tokens: TokenRegistry,
    ) -> Self {
        Self {
            wallets,
            transactions,
            gateway,
            derivation,
            tokens,
        }
    }

    /// 派生密钥并持久化新钱包 (active = false)
    pub async fn create_wallet(
        &self,
        username: &str,
        kind: Option<WalletKind>,
    ) -> CoreResult<Wallet> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::Validation("username is required".into()));
        }
        let kind = kind.ok_or_else(|| CoreError::Validation("kind is required".into()))?;

        let derived = self.derivation.derive(kind, username)?;
        let wallet = Wallet::new(username, kind, derived);
        self.wallets.create_wallet(&wallet).await?;

        tracing::info!(
            wallet_id = %wallet.id,
            username = %wallet.username,
            kind = %wallet.kind,
            address = %wallet.address,
            "Wallet created"
        );
        Ok(wallet)
    }

    pub async fn list_wallets(&self, filter: &WalletFilter) -> CoreResult<Page<Wallet>> {
        self.wallets.find_wallets(filter).await
    }

    pub async fn get_balance(&self, address: &str) -> CoreResult<WalletBalance> {
        address::decode(address)?;
        self.require_wallet(address).await?;
        self.gateway.balance(address).await
    }

    /// 构造、签名并广播转账，成功后持久化并激活钱包
    pub async fn send_transaction(&self, request: SendRequest) -> CoreResult<Transaction> {
        if request.amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        address::decode(&request.from_address)?;
        address::decode(&request.to_address)?;
        let (token, _) = self.tokens.lookup(&request.token)?;

        let mut wallet = self.require_wallet(&request.from_address).await?;

        let transfer = Transfer {
            from_address: request.from_address,
            to_address: request.to_address,
            amount: request.amount,
            token: token.to_string(),
            private_key: wallet.private_key.clone(),
        };
        let tx = self.gateway.send(&transfer).await?;

        // 已广播：落库失败不可回滚，txID 随错误返回供人工补录
        if let Err(e) = self.transactions.save_transaction(&tx).await {
            tracing::error!(tx_id = %tx.id, error = ?e, "Broadcast transaction could not be recorded");
            return Err(CoreError::Unrecorded {
                tx_id: tx.id,
                message: e.to_string(),
            });
        }

        if !wallet.active {
            wallet.active = true;
            if let Err(e) = self.wallets.update_wallet(&wallet).await {
                tracing::warn!(address = %wallet.address, error = ?e, "Failed to activate wallet");
            }
        }

        Ok(tx)
    }

    pub async fn wallet_transactions(
        &self,
        address: &str,
        page: PageRequest,
    ) -> CoreResult<Page<Transaction>> {
        if address.trim().is_empty() {
            return Err(CoreError::Validation("address is required".into()));
        }
        self.transactions
            .find_transactions_by_address(address, page)
            .await
    }

    pub async fn transaction_status(&self, tx_id: &str) -> CoreResult<TransactionStatus> {
        self.transactions
            .get_transaction_status(tx_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(tx_id.to_string()))
    }

    pub async fn transaction(&self, tx_id: &str) -> CoreResult<Transaction> {
        self.transactions
            .find_transaction(tx_id)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(tx_id.to_string()))
    }

    async fn require_wallet(&self, address: &str) -> CoreResult<Wallet> {
        self.wallets
            .find_wallet_by_address(address)
            .await?
            .ok_or_else(|| CoreError::WalletNotFound(address.to_string()))
    }
}
