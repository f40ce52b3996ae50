//! Domain 模块
//!
//! 密钥派生、地址编解码、代币注册表与核心数据模型

pub mod address;
pub mod derivation;
pub mod models;
pub mod secret;
pub mod token;
pub mod transaction_status;

pub use derivation::{Bip44TronDerivation, DerivedWallet, KeyDerivation, TRON_DERIVATION_PATH};
pub use models::{
    Page, PageRequest, Pagination, Transaction, Transfer, Wallet, WalletBalance, WalletFilter,
    WalletKind,
};
pub use secret::SecretString;
pub use token::{TokenConfig, TokenRegistry};
pub use transaction_status::{StatusReport, TransactionStatus};
