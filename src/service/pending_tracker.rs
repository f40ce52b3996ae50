//! 待确认交易跟踪器
//!
//! 两个周期任务共享同一个工作集：
//! - 发现循环：扫描已激活的普通钱包，把尚未终结的交易加入工作集
//! - 轮询循环：对工作集快照逐笔查询链上状态，终态落库成功后移出
//!
//! 锁只在修改或复制工作集时持有，网络 I/O 期间不持锁。
//! 停止信号在每次网关 / 仓库调用返回后检查。

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{watch, RwLock},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{
    config::TrackerConfig,
    domain::{
        models::{PageRequest, Transaction, WalletFilter},
        transaction_status::{StatusReport, TransactionStatus},
    },
    error::CoreResult,
    repository::{TransactionRepository, WalletRepository},
    service::blockchain_gateway::LedgerGateway,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransaction {
    pub id: String,
    pub status: TransactionStatus,
    pub confirmations: u64,
}

impl From<&Transaction> for TrackedTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            status: tx.status,
            confirmations: tx.confirmations,
        }
    }
}

impl TrackedTransaction {
    fn report(&self) -> StatusReport {
        StatusReport {
            status: self.status,
            confirmations: self.confirmations,
        }
    }
}

/// 一次扫描 (发现 / 启动载入) 的登记凭证
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanTicket(u64);

#[derive(Debug, Default)]
struct WorkingSetInner {
    pending: HashMap<String, TrackedTransaction>,
    /// 扫描进行期间移出的 id → 移出序号。
    /// 扫描可能读到移出前的旧记录，只对开始早于移出的扫描生效。
    evicted: HashMap<String, u64>,
    eviction_seq: u64,
    /// 进行中的扫描 → 开始时的移出序号
    scans: HashMap<u64, u64>,
    next_scan: u64,
}

impl WorkingSetInner {
    fn prune_evicted(&mut self) {
        match self.scans.values().min().copied() {
            None => self.evicted.clear(),
            Some(oldest) => self.evicted.retain(|_, seq| *seq > oldest),
        }
    }
}

/// 跟踪中的交易集合
#[derive(Debug, Default)]
pub struct WorkingSet {
    inner: RwLock<WorkingSetInner>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存在或在进行中的扫描期间被移出时返回 false，不覆盖现有条目
    pub async fn insert_if_absent(&self, tx: TrackedTransaction) -> bool {
        let mut inner = self.inner.write().await;
        if inner.evicted.contains_key(&tx.id) || inner.pending.contains_key(&tx.id) {
            return false;
        }
        inner.pending.insert(tx.id.clone(), tx);
        true
    }

    pub async fn snapshot(&self) -> Vec<TrackedTransaction> {
        self.inner.read().await.pending.values().cloned().collect()
    }

    /// 只接受合法的状态推进，确认数只增不减。返回条目是否变化
    pub async fn refresh(&self, id: &str, report: StatusReport) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.pending.get_mut(id) else {
            return false;
        };
        if !entry.status.can_transition_to(&report.status) {
            return false;
        }

        let confirmations = entry.confirmations.max(report.confirmations);
        if entry.status == report.status && entry.confirmations == confirmations {
            return false;
        }
        entry.status = report.status;
        entry.confirmations = confirmations;
        true
    }

    /// 幂等：同一 id 只有第一次调用返回 Some
    pub async fn evict(&self, id: &str) -> Option<TrackedTransaction> {
        let mut inner = self.inner.write().await;
        let removed = inner.pending.remove(id);
        if removed.is_some() {
            inner.eviction_seq += 1;
            if !inner.scans.is_empty() {
                let seq = inner.eviction_seq;
                inner.evicted.insert(id.to_string(), seq);
            }
        }
        removed
    }

    pub async fn begin_scan(&self) -> ScanTicket {
        let mut inner = self.inner.write().await;
        let ticket = inner.next_scan;
        inner.next_scan += 1;
        let started_at = inner.eviction_seq;
        inner.scans.insert(ticket, started_at);
        ScanTicket(ticket)
    }

    /// 结束扫描并丢弃不再被任何扫描需要的移出记录
    pub async fn end_scan(&self, ticket: ScanTicket) {
        let mut inner = self.inner.write().await;
        inner.scans.remove(&ticket.0);
        inner.prune_evicted();
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.pending.contains_key(id)
    }

    pub async fn is_evicted(&self, id: &str) -> bool {
        self.inner.read().await.evicted.contains_key(id)
    }

    /// 仍保留的移出记录数 (无进行中扫描时为 0)
    pub async fn evicted_len(&self) -> usize {
        self.inner.read().await.evicted.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 一轮轮询的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub progressed: usize,
    pub evicted: usize,
    pub lookup_failures: usize,
    /// 终态落库失败、留待下一轮重试的数量
    pub persist_failures: usize,
}

pub struct PendingTransactionTracker {
    wallets: Arc<dyn WalletRepository>,
    transactions: Arc<dyn TransactionRepository>,
    gateway: Arc<dyn LedgerGateway>,
    working_set: Arc<WorkingSet>,
    config: TrackerConfig,
    stop: watch::Sender<bool>,
}

impl PendingTransactionTracker {
    pub fn new(
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn LedgerGateway>,
        config: TrackerConfig,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            wallets,
            transactions,
            gateway,
            working_set: Arc::new(WorkingSet::new()),
            config,
            stop,
        }
    }

    pub fn working_set(&self) -> Arc<WorkingSet> {
        Arc::clone(&self.working_set)
    }

    fn stopping(&self) -> bool {
        *self.stop.borrow()
    }

    fn needs_tracking(&self, tx: &Transaction) -> bool {
        !StatusReport {
            status: tx.status,
            confirmations: tx.confirmations,
        }
        .is_terminal(self.config.required_confirmations)
    }

    /// 启动时载入已持久化的未终结交易
    pub async fn load_pending(&self) -> CoreResult<usize> {
        let scan = self.working_set.begin_scan().await;
        let result = self.load_unfinished().await;
        self.working_set.end_scan(scan).await;
        result
    }

    async fn load_unfinished(&self) -> CoreResult<usize> {
        let mut candidates = self
            .transactions
            .find_transactions_by_status(TransactionStatus::Pending)
            .await?;
        candidates.extend(
            self.transactions
                .find_transactions_by_status(TransactionStatus::Confirmed)
                .await?,
        );

        let mut loaded = 0;
        for tx in candidates.iter().filter(|tx| self.needs_tracking(tx)) {
            if self.working_set.insert_if_absent(tx.into()).await {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// 扫描已激活普通钱包的交易，返回新加入工作集的数量
    pub async fn discover(&self) -> CoreResult<usize> {
        let scan = self.working_set.begin_scan().await;
        let result = self.discover_wallets().await;
        self.working_set.end_scan(scan).await;
        result
    }

    async fn discover_wallets(&self) -> CoreResult<usize> {
        let page_size = Some(self.config.page_size);
        let mut added = 0;
        let mut wallet_page = 1;

        loop {
            let wallets = self
                .wallets
                .find_wallets(&WalletFilter::active_regular(PageRequest::new(
                    Some(wallet_page),
                    page_size,
                )))
                .await?;
            if self.stopping() {
                return Ok(added);
            }

            for wallet in &wallets.items {
                match self.discover_wallet(&wallet.address, page_size).await {
                    Ok(count) => added += count,
                    Err(e) => tracing::warn!(
                        address = %wallet.address,
                        error = ?e,
                        "Failed to list wallet transactions"
                    ),
                }
                if self.stopping() {
                    return Ok(added);
                }
            }

            if !wallets.has_more() {
                break;
            }
            wallet_page += 1;
        }

        Ok(added)
    }

    async fn discover_wallet(&self, address: &str, page_size: Option<u32>) -> CoreResult<usize> {
        let mut added = 0;
        let mut page = 1;

        loop {
            let transactions = self
                .transactions
                .find_transactions_by_address(address, PageRequest::new(Some(page), page_size))
                .await?;
            if self.stopping() {
                return Ok(added);
            }

            for tx in transactions.items.iter().filter(|tx| self.needs_tracking(tx)) {
                if self.working_set.insert_if_absent(tx.into()).await {
                    tracing::debug!(tx_id = %tx.id, address = %address, "Tracking transaction");
                    added += 1;
                }
            }

            if !transactions.has_more() {
                return Ok(added);
            }
            page += 1;
        }
    }

    /// 对当前快照逐笔查询状态
    pub async fn poll(&self) -> PollSummary {
        let snapshot = self.working_set.snapshot().await;
        let mut summary = PollSummary::default();

        for tracked in snapshot {
            if self.stopping() {
                break;
            }
            summary.checked += 1;

            let lookup = self.gateway.transaction_status(&tracked.id).await;
            if self.stopping() {
                break;
            }
            let report = match lookup {
                Ok(report) => report,
                Err(e) => {
                    summary.lookup_failures += 1;
                    tracing::warn!(tx_id = %tracked.id, error = ?e, "Failed to query transaction status");
                    continue;
                }
            };

            if report.is_terminal(self.config.required_confirmations) {
                // 终态落库成功后才移出，失败则保留条目下轮重试
                if let Err(e) = self
                    .transactions
                    .update_transaction_status(&tracked.id, report)
                    .await
                {
                    summary.persist_failures += 1;
                    tracing::warn!(tx_id = %tracked.id, error = ?e, "Failed to persist final status");
                    continue;
                }
                if self.working_set.evict(&tracked.id).await.is_some() {
                    summary.evicted += 1;
                    tracing::info!(
                        tx_id = %tracked.id,
                        status = %report.status,
                        confirmations = report.confirmations,
                        "Transaction reached final state"
                    );
                }
                continue;
            }

            if report != tracked.report() && self.working_set.refresh(&tracked.id, report).await {
                summary.progressed += 1;
                if let Err(e) = self
                    .transactions
                    .update_transaction_status(&tracked.id, report)
                    .await
                {
                    tracing::warn!(tx_id = %tracked.id, error = ?e, "Failed to persist status progress");
                }
            }
        }

        summary
    }

    /// 载入未终结交易后启动两个周期任务
    pub async fn start(self: Arc<Self>) -> CoreResult<TrackerHandle> {
        self.stop.send_replace(false);
        let loaded = self.load_pending().await?;
        tracing::info!(
            count = loaded,
            discovery_interval_secs = self.config.discovery_interval_secs,
            poll_interval_secs = self.config.poll_interval_secs,
            required_confirmations = self.config.required_confirmations,
            "Pending transaction tracker started"
        );

        let discovery = tokio::spawn(Arc::clone(&self).discovery_loop(self.stop.subscribe()));
        let poll = tokio::spawn(Arc::clone(&self).poll_loop(self.stop.subscribe()));

        Ok(TrackerHandle {
            tracker: self,
            tasks: vec![discovery, poll],
        })
    }

    async fn discovery_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = ticker(self.config.discovery_interval_secs).await;

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    match self.discover().await {
                        Ok(0) => {}
                        Ok(added) => tracing::info!(count = added, "Discovered pending transactions"),
                        Err(e) => tracing::error!(error = ?e, "Transaction discovery failed"),
                    }
                }
            }
        }

        tracing::info!("Discovery loop stopped");
    }

    async fn poll_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = ticker(self.config.poll_interval_secs).await;

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    let summary = self.poll().await;
                    if summary.checked > 0 {
                        tracing::debug!(
                            checked = summary.checked,
                            progressed = summary.progressed,
                            evicted = summary.evicted,
                            lookup_failures = summary.lookup_failures,
                            persist_failures = summary.persist_failures,
                            "Polled pending transactions"
                        );
                    }
                }
            }
        }

        tracing::info!("Status poll loop stopped");
    }
}

/// 首次 tick 立即返回，此处消费掉
async fn ticker(period_secs: u64) -> tokio::time::Interval {
    let mut ticker = interval(Duration::from_secs(period_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    ticker
}

/// 收到停止信号或发送端被丢弃时返回
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// 跟踪器任务句柄
pub struct TrackerHandle {
    tracker: Arc<PendingTransactionTracker>,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackerHandle {
    /// 发出停止信号，两个循环在下次唤醒或当前调用返回时退出
    pub async fn shutdown(self) {
        self.tracker.stop.send_replace(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = ?e, "Tracker task terminated abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr,
        sync::{
            atomic::{AtomicBool, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        domain::{
            models::{Transfer, WalletBalance},
            secret::SecretString,
        },
        error::{CoreError, LedgerStage},
        repository::InMemoryRepository,
    };

    /// 按 id 返回预设状态的网关
    #[derive(Default)]
    struct ScriptedGateway {
        reports: Mutex<HashMap<String, StatusReport>>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn set(&self, id: &str, report: StatusReport) {
            self.reports.lock().unwrap().insert(id.to_string(), report);
        }

        fn query_count(&self, id: &str) -> usize {
            self.queries.lock().unwrap().iter().filter(|q| *q == id).count()
        }
    }

    #[async_trait]
    impl LedgerGateway for ScriptedGateway {
        async fn send(&self, _transfer: &Transfer) -> CoreResult<Transaction> {
            unreachable!("tracker never sends")
        }

        async fn balance(&self, _address: &str) -> CoreResult<WalletBalance> {
            Ok(WalletBalance::default())
        }

        async fn transaction_status(&self, tx_id: &str) -> CoreResult<StatusReport> {
            self.queries.lock().unwrap().push(tx_id.to_string());
            self.reports
                .lock()
                .unwrap()
                .get(tx_id)
                .copied()
                .ok_or_else(|| CoreError::network(LedgerStage::TransactionInfo, "unreachable"))
        }
    }

    fn tracked(id: &str) -> TrackedTransaction {
        TrackedTransaction {
            id: id.to_string(),
            status: TransactionStatus::Pending,
            confirmations: 0,
        }
    }

    fn transaction(id: &str) -> Transaction {
        Transaction::pending(
            id,
            &Transfer {
                from_address: "TFrom".into(),
                to_address: "TTo".into(),
                amount: Decimal::from_str("5").unwrap(),
                token: "TRX".into(),
                private_key: SecretString::new(""),
            },
        )
    }

    fn tracker(
        repo: Arc<InMemoryRepository>,
        gateway: Arc<ScriptedGateway>,
    ) -> PendingTransactionTracker {
        PendingTransactionTracker::new(
            repo.clone(),
            repo,
            gateway,
            TrackerConfig {
                discovery_interval_secs: 60,
                poll_interval_secs: 10,
                required_confirmations: 20,
                page_size: 2,
            },
        )
    }

    #[tokio::test]
    async fn test_working_set_insert_if_absent_and_evict_once() {
        let set = WorkingSet::new();
        assert!(set.insert_if_absent(tracked("a")).await);
        assert!(!set.insert_if_absent(tracked("a")).await);

        assert!(set.refresh("a", StatusReport::confirmed(3)).await);
        assert_eq!(set.snapshot().await[0].confirmations, 3);

        assert!(set.evict("a").await.is_some());
        assert!(set.evict("a").await.is_none());
        assert!(!set.refresh("a", StatusReport::confirmed(30)).await);
        assert!(set.is_empty().await);
        assert!(!set.is_evicted("a").await);
    }

    #[tokio::test]
    async fn test_refresh_rejects_status_regression() {
        let set = WorkingSet::new();
        set.insert_if_absent(tracked("a")).await;
        assert!(set.refresh("a", StatusReport::confirmed(5)).await);

        assert!(!set.refresh("a", StatusReport::pending()).await);
        assert!(!set.refresh("a", StatusReport::failed()).await);
        assert!(!set.refresh("a", StatusReport::confirmed(2)).await);
        assert!(!set.refresh("a", StatusReport::confirmed(5)).await);

        let entry = &set.snapshot().await[0];
        assert_eq!(entry.status, TransactionStatus::Confirmed);
        assert_eq!(entry.confirmations, 5);
    }

    #[tokio::test]
    async fn test_evictions_leave_no_retained_state() {
        let set = WorkingSet::new();
        for i in 0..500 {
            set.insert_if_absent(tracked(&format!("tx-{i}"))).await;
        }
        for i in 0..500 {
            assert!(set.evict(&format!("tx-{i}")).await.is_some());
        }

        assert!(set.is_empty().await);
        assert_eq!(set.evicted_len().await, 0);
    }

    #[tokio::test]
    async fn test_eviction_during_scan_blocks_stale_reinsert_until_scan_ends() {
        let set = WorkingSet::new();
        set.insert_if_absent(tracked("a")).await;

        let scan = set.begin_scan().await;
        set.evict("a").await;
        // 扫描读到的是移出前的旧记录
        assert!(!set.insert_if_absent(tracked("a")).await);
        assert!(set.is_evicted("a").await);

        // 移出之后才开始的扫描不需要这条记录
        let later = set.begin_scan().await;
        set.end_scan(scan).await;
        assert_eq!(set.evicted_len().await, 0);
        set.end_scan(later).await;

        assert!(set.insert_if_absent(tracked("a")).await);
    }

    #[tokio::test]
    async fn test_poll_does_not_regress_confirmed_entry() {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::default());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let tracker = tracker(repo.clone(), gateway.clone());
        tracker.load_pending().await.unwrap();

        gateway.set("t1", StatusReport::confirmed(7));
        assert_eq!(tracker.poll().await.progressed, 1);

        // 节点短暂回报 pending
        gateway.set("t1", StatusReport::pending());
        let summary = tracker.poll().await;
        assert_eq!(summary.progressed, 0);

        let entry = &tracker.working_set().snapshot().await[0];
        assert_eq!(entry.status, TransactionStatus::Confirmed);
        assert_eq!(entry.confirmations, 7);
        assert_eq!(
            repo.get_transaction_status("t1").await.unwrap(),
            Some(TransactionStatus::Confirmed)
        );
    }

    /// 状态更新可按开关失败的仓库
    struct FlakyUpdates {
        inner: Arc<InMemoryRepository>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl TransactionRepository for FlakyUpdates {
        async fn save_transaction(&self, tx: &Transaction) -> CoreResult<()> {
            self.inner.save_transaction(tx).await
        }

        async fn find_transaction(&self, tx_id: &str) -> CoreResult<Option<Transaction>> {
            self.inner.find_transaction(tx_id).await
        }

        async fn find_transactions_by_address(
            &self,
            address: &str,
            page: PageRequest,
        ) -> CoreResult<crate::domain::models::Page<Transaction>> {
            self.inner.find_transactions_by_address(address, page).await
        }

        async fn find_transactions_by_status(
            &self,
            status: TransactionStatus,
        ) -> CoreResult<Vec<Transaction>> {
            self.inner.find_transactions_by_status(status).await
        }

        async fn get_transaction_status(
            &self,
            tx_id: &str,
        ) -> CoreResult<Option<TransactionStatus>> {
            self.inner.get_transaction_status(tx_id).await
        }

        async fn update_transaction_status(
            &self,
            tx_id: &str,
            report: StatusReport,
        ) -> CoreResult<bool> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CoreError::Persistence("connection reset".into()));
            }
            self.inner.update_transaction_status(tx_id, report).await
        }
    }

    #[tokio::test]
    async fn test_final_status_persist_failure_keeps_entry_for_retry() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let flaky = Arc::new(FlakyUpdates {
            inner: repo.clone(),
            failing: AtomicBool::new(true),
        });
        let gateway = Arc::new(ScriptedGateway::default());
        let tracker = PendingTransactionTracker::new(
            repo.clone(),
            flaky.clone(),
            gateway.clone(),
            TrackerConfig {
                discovery_interval_secs: 60,
                poll_interval_secs: 10,
                required_confirmations: 20,
                page_size: 2,
            },
        );
        tracker.load_pending().await.unwrap();

        gateway.set("t1", StatusReport::failed());
        let summary = tracker.poll().await;
        assert_eq!(summary.persist_failures, 1);
        assert_eq!(summary.evicted, 0);
        assert!(tracker.working_set().contains("t1").await);

        flaky.failing.store(false, Ordering::SeqCst);
        let summary = tracker.poll().await;
        assert_eq!(summary.evicted, 1);
        assert!(tracker.working_set().is_empty().await);
        assert_eq!(
            repo.get_transaction_status("t1").await.unwrap(),
            Some(TransactionStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_poll_returns_immediately_once_stopped() {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::default());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let tracker = tracker(repo, gateway.clone());
        tracker.load_pending().await.unwrap();

        tracker.stop.send_replace(true);
        assert_eq!(tracker.poll().await, PollSummary::default());
        assert_eq!(gateway.query_count("t1"), 0);
        assert_eq!(tracker.discover().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_below_threshold_stays_tracked() {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::default());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let tracker = tracker(repo.clone(), gateway.clone());
        tracker.load_pending().await.unwrap();

        gateway.set("t1", StatusReport::confirmed(19));
        let summary = tracker.poll().await;
        assert_eq!(summary.evicted, 0);
        assert_eq!(summary.progressed, 1);
        assert!(tracker.working_set().contains("t1").await);

        let stored = repo.find_transaction("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
        assert_eq!(stored.confirmations, 19);

        gateway.set("t1", StatusReport::confirmed(20));
        assert_eq!(tracker.poll().await.evicted, 1);
        assert!(!tracker.working_set().contains("t1").await);
        assert_eq!(
            repo.find_transaction("t1").await.unwrap().unwrap().confirmations,
            20
        );
    }

    #[tokio::test]
    async fn test_failed_is_evicted_regardless_of_confirmations() {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::default());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let tracker = tracker(repo.clone(), gateway.clone());
        tracker.load_pending().await.unwrap();

        gateway.set("t1", StatusReport::failed());
        assert_eq!(tracker.poll().await.evicted, 1);
        assert_eq!(
            repo.get_transaction_status("t1").await.unwrap(),
            Some(TransactionStatus::Failed)
        );

        // 移出后不再查询
        tracker.poll().await;
        assert_eq!(gateway.query_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_entry() {
        let repo = Arc::new(InMemoryRepository::new());
        let gateway = Arc::new(ScriptedGateway::default());
        repo.save_transaction(&transaction("t1")).await.unwrap();
        let tracker = tracker(repo, gateway);
        tracker.load_pending().await.unwrap();

        let summary = tracker.poll().await;
        assert_eq!(summary.lookup_failures, 1);
        assert!(tracker.working_set().contains("t1").await);
    }

    #[tokio::test]
    async fn test_load_pending_skips_final_transactions() {
        let repo = Arc::new(InMemoryRepository::new());
        for id in ["p", "c-low", "c-done", "f"] {
            repo.save_transaction(&transaction(id)).await.unwrap();
        }
        repo.update_transaction_status("c-low", StatusReport::confirmed(3))
            .await
            .unwrap();
        repo.update_transaction_status("c-done", StatusReport::confirmed(25))
            .await
            .unwrap();
        repo.update_transaction_status("f", StatusReport::failed())
            .await
            .unwrap();

        let tracker = tracker(repo, Arc::new(ScriptedGateway::default()));
        assert_eq!(tracker.load_pending().await.unwrap(), 2);

        let set = tracker.working_set();
        assert!(set.contains("p").await);
        assert!(set.contains("c-low").await);
        assert!(!set.contains("c-done").await);
        assert!(!set.contains("f").await);
    }
}
