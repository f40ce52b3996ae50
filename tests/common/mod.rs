//! 集成测试辅助：内存仓库 + 可编排的账本网关
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tron_custody::{
    app_state::AppState,
    config::{Config, TrackerConfig},
    domain::{
        models::{Page, PageRequest, Transaction, Transfer, WalletBalance},
        transaction_status::{StatusReport, TransactionStatus},
    },
    error::{CoreError, CoreResult, LedgerStage},
    repository::{InMemoryRepository, TransactionRepository},
    service::LedgerGateway,
};

/// 账本假实现：递增 txID，状态按 id 预设，未设置的视为 pending
#[derive(Default)]
pub struct FakeLedger {
    next_id: AtomicU64,
    reject_sends: AtomicBool,
    sent: Mutex<Vec<Transfer>>,
    statuses: Mutex<HashMap<String, StatusReport>>,
    status_queries: AtomicU64,
    balance: Mutex<WalletBalance>,
    status_delay: Mutex<Duration>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    pub fn set_status(&self, tx_id: &str, report: StatusReport) {
        self.statuses
            .lock()
            .unwrap()
            .insert(tx_id.to_string(), report);
    }

    pub fn set_balance(&self, balance: WalletBalance) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn sent(&self) -> Vec<Transfer> {
        self.sent.lock().unwrap().clone()
    }

    /// 模拟响应缓慢的节点
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    pub fn status_queries(&self) -> u64 {
        self.status_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn send(&self, transfer: &Transfer) -> CoreResult<Transaction> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(CoreError::rejected(
                LedgerStage::Broadcast,
                "CONTRACT_VALIDATE_ERROR: balance is not sufficient",
            ));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(transfer.clone());
        Ok(Transaction::pending(format!("{:064x}", n), transfer))
    }

    async fn balance(&self, _address: &str) -> CoreResult<WalletBalance> {
        Ok(self.balance.lock().unwrap().clone())
    }

    async fn transaction_status(&self, tx_id: &str) -> CoreResult<StatusReport> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(tx_id)
            .copied()
            .unwrap_or_else(StatusReport::pending))
    }
}

/// 写入总是失败的交易仓库，读操作委托给内存实现
pub struct BrokenTransactions(pub Arc<InMemoryRepository>);

#[async_trait]
impl TransactionRepository for BrokenTransactions {
    async fn save_transaction(&self, _tx: &Transaction) -> CoreResult<()> {
        Err(CoreError::Persistence("connection reset".into()))
    }

    async fn find_transaction(&self, tx_id: &str) -> CoreResult<Option<Transaction>> {
        self.0.find_transaction(tx_id).await
    }

    async fn find_transactions_by_address(
        &self,
        address: &str,
        page: PageRequest,
    ) -> CoreResult<Page<Transaction>> {
        self.0.find_transactions_by_address(address, page).await
    }

    async fn find_transactions_by_status(
        &self,
        status: TransactionStatus,
    ) -> CoreResult<Vec<Transaction>> {
        self.0.find_transactions_by_status(status).await
    }

    async fn get_transaction_status(&self, tx_id: &str) -> CoreResult<Option<TransactionStatus>> {
        self.0.get_transaction_status(tx_id).await
    }

    async fn update_transaction_status(
        &self,
        tx_id: &str,
        report: StatusReport,
    ) -> CoreResult<bool> {
        self.0.update_transaction_status(tx_id, report).await
    }
}

pub fn tracker_config() -> TrackerConfig {
    TrackerConfig {
        discovery_interval_secs: 60,
        poll_interval_secs: 10,
        required_confirmations: 20,
        page_size: 2,
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_env().expect("default config");
    config.tracker = tracker_config();
    config
}

pub struct TestContext {
    pub state: Arc<AppState>,
    pub repo: Arc<InMemoryRepository>,
    pub ledger: Arc<FakeLedger>,
}

pub fn setup() -> TestContext {
    let repo = Arc::new(InMemoryRepository::new());
    let ledger = Arc::new(FakeLedger::new());
    let state = Arc::new(AppState::new(
        Arc::new(test_config()),
        repo.clone(),
        repo.clone(),
        ledger.clone(),
    ));
    TestContext { state, repo, ledger }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}
