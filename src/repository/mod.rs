// Repository 抽象层

pub mod memory;
pub mod transaction_repository;
pub mod wallet_repository;

pub use memory::InMemoryRepository;
pub use transaction_repository::{PgTransactionRepository, TransactionRepository};
pub use wallet_repository::{PgWalletRepository, WalletRepository};
