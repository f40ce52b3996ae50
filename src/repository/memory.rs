//! 内存 Repository，供测试与无数据库的本地运行使用

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    domain::{
        models::{Page, PageRequest, Transaction, Wallet, WalletFilter},
        transaction_status::{StatusReport, TransactionStatus},
    },
    error::{CoreError, CoreResult},
    repository::{TransactionRepository, WalletRepository},
};

#[derive(Default)]
pub struct InMemoryRepository {
    // 按插入顺序保存，分页结果稳定
    wallets: RwLock<Vec<Wallet>>,
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wallet_count(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Page::new(items, page, total)
}

#[async_trait]
impl WalletRepository for InMemoryRepository {
    async fn create_wallet(&self, wallet: &Wallet) -> CoreResult<()> {
        let mut wallets = self.wallets.write().await;
        if wallets
            .iter()
            .any(|w| w.username == wallet.username || w.address == wallet.address)
        {
            return Err(CoreError::WalletAlreadyExists(wallet.username.clone()));
        }
        wallets.push(wallet.clone());
        Ok(())
    }

    async fn find_wallets(&self, filter: &WalletFilter) -> CoreResult<Page<Wallet>> {
        let matching: Vec<Wallet> = self
            .wallets
            .read()
            .await
            .iter()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page))
    }

    async fn find_wallet_by_address(&self, address: &str) -> CoreResult<Option<Wallet>> {
        Ok(self
            .wallets
            .read()
            .await
            .iter()
            .find(|w| w.address == address)
            .cloned())
    }

    async fn update_wallet(&self, wallet: &Wallet) -> CoreResult<()> {
        let mut wallets = self.wallets.write().await;
        let stored = wallets
            .iter_mut()
            .find(|w| w.id == wallet.id)
            .ok_or_else(|| CoreError::WalletNotFound(wallet.address.clone()))?;

        stored.active = wallet.active;
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryRepository {
    async fn save_transaction(&self, tx: &Transaction) -> CoreResult<()> {
        self.transactions
            .write()
            .await
            .entry(tx.id.clone())
            .or_insert_with(|| tx.clone());
        Ok(())
    }

    async fn find_transaction(&self, tx_id: &str) -> CoreResult<Option<Transaction>> {
        Ok(self.transactions.read().await.get(tx_id).cloned())
    }

    async fn find_transactions_by_address(
        &self,
        address: &str,
        page: PageRequest,
    ) -> CoreResult<Page<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| tx.from_address == address || tx.to_address == address)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(matching, page))
    }

    async fn find_transactions_by_status(
        &self,
        status: TransactionStatus,
    ) -> CoreResult<Vec<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| tx.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn get_transaction_status(&self, tx_id: &str) -> CoreResult<Option<TransactionStatus>> {
        Ok(self.transactions.read().await.get(tx_id).map(|tx| tx.status))
    }

    async fn update_transaction_status(
        &self,
        tx_id: &str,
        report: StatusReport,
    ) -> CoreResult<bool> {
        let mut transactions = self.transactions.write().await;
        let Some(tx) = transactions.get_mut(tx_id) else {
            return Ok(false);
        };
        if !tx.status.can_transition_to(&report.status) {
            return Ok(false);
        }

        tx.status = report.status;
        tx.confirmations = tx.confirmations.max(report.confirmations);
        tx.updated_at = Utc::now();
        Ok(true)
    }
}
