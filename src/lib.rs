//! 托管式 TRON 钱包后端
//!
//! 确定性密钥派生、TRX / TRC-20 转账的构造签名与广播，
//! 以及后台跟踪待确认交易直至终态。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, CoreError, CoreResult};
