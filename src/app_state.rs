use std::sync::Arc;

use crate::{
    config::Config,
    domain::derivation::Bip44TronDerivation,
    repository::{TransactionRepository, WalletRepository},
    service::{
        blockchain_gateway::LedgerGateway,
        pending_tracker::{PendingTransactionTracker, WorkingSet},
        wallet_service::WalletService,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub wallet_service: Arc<WalletService>,
    pub tracker: Arc<PendingTransactionTracker>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn LedgerGateway>,
    ) -> Self {
        let wallet_service = Arc::new(WalletService::new(
            Arc::clone(&wallets),
            Arc::clone(&transactions),
            Arc::clone(&gateway),
            Arc::new(Bip44TronDerivation::new()),
            config.tokens.clone(),
        ));
        let tracker = Arc::new(PendingTransactionTracker::new(
            wallets,
            transactions,
            gateway,
            config.tracker.clone(),
        ));

        Self {
            config,
            wallet_service,
            tracker,
        }
    }

    pub fn working_set(&self) -> Arc<WorkingSet> {
        self.tracker.working_set()
    }
}
