pub mod blockchain_gateway;
pub mod pending_tracker;
pub mod signer;
pub mod tron_client;
pub mod wallet_service;

pub use blockchain_gateway::{BlockchainGateway, LedgerGateway};
pub use pending_tracker::{PendingTransactionTracker, TrackerHandle, WorkingSet};
pub use signer::TransactionSigner;
pub use tron_client::{TronHttpClient, TronNode};
pub use wallet_service::{SendRequest, WalletService};
