use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 与账本节点 / 索引服务交互的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStage {
    CreateTransaction,
    TriggerSmartContract,
    Sign,
    Broadcast,
    AccountTokens,
    TransactionInfo,
    LatestBlock,
}

impl fmt::Display for LedgerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTransaction => "createtransaction",
            Self::TriggerSmartContract => "triggersmartcontract",
            Self::Sign => "sign",
            Self::Broadcast => "broadcasttransaction",
            Self::AccountTokens => "account/tokens",
            Self::TransactionInfo => "gettransactioninfobyid",
            Self::LatestBlock => "getnowblock",
        };
        f.write_str(name)
    }
}

/// 核心层错误
///
/// 消息中不得包含私钥或助记词。
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// 传输层失败 (连接、超时、非 2xx、响应无法解析)
    #[error("{stage} request failed: {message}")]
    Network { stage: LedgerStage, message: String },

    /// 节点明确拒绝
    #[error("{stage} rejected by node: {message}")]
    Rejected { stage: LedgerStage, message: String },

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    /// 已广播但未能落库，txID 随错误返回
    #[error("transaction {tx_id} was broadcast but not recorded: {message}")]
    Unrecorded { tx_id: String, message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn network(stage: LedgerStage, message: impl fmt::Display) -> Self {
        Self::Network {
            stage,
            message: message.to_string(),
        }
    }

    pub fn rejected(stage: LedgerStage, message: impl Into<String>) -> Self {
        Self::Rejected {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Option<LedgerStage> {
        match self {
            Self::Network { stage, .. } | Self::Rejected { stage, .. } => Some(*stage),
            Self::Signing(_) => Some(LedgerStage::Sign),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// PostgreSQL unique_violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorCode {
    BadRequest,
    NotFound,
    Internal,
    WalletNotFound,
    WalletAlreadyExists,
    TransactionNotFound,
    InvalidAddress,
    InvalidAmount,
    TokenNotSupported,
    TransactionFailed,
    RpcError,
    DatabaseError,
    ValidationFailed,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::WalletNotFound => "wallet_not_found",
            Self::WalletAlreadyExists => "wallet_already_exists",
            Self::TransactionNotFound => "transaction_not_found",
            Self::InvalidAddress => "invalid_address",
            Self::InvalidAmount => "invalid_amount",
            Self::TokenNotSupported => "token_not_supported",
            Self::TransactionFailed => "transaction_failed",
            Self::RpcError => "rpc_error",
            Self::DatabaseError => "database_error",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn wallet_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn wallet_already_exists(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::WalletAlreadyExists, StatusCode::CONFLICT, msg)
    }

    pub fn transaction_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TransactionNotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAddress, StatusCode::BAD_REQUEST, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAmount, StatusCode::BAD_REQUEST, msg)
    }

    pub fn token_not_supported(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TokenNotSupported, StatusCode::BAD_REQUEST, msg)
    }

    pub fn transaction_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::TransactionFailed, StatusCode::BAD_REQUEST, msg)
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::RpcError, StatusCode::BAD_GATEWAY, msg)
    }

    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::new(
            AppErrorCode::DatabaseError,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ValidationFailed, StatusCode::BAD_REQUEST, msg)
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => Self::validation_failed(message),
            CoreError::InvalidAddress(_) => Self::invalid_address(message),
            CoreError::InvalidAmount(_) => Self::invalid_amount(message),
            CoreError::UnsupportedToken(_) => Self::token_not_supported(message),
            CoreError::WalletNotFound(_) => Self::wallet_not_found(message),
            CoreError::WalletAlreadyExists(_) => Self::wallet_already_exists(message),
            CoreError::TransactionNotFound(_) => Self::transaction_not_found(message),
            CoreError::Rejected { .. } | CoreError::Signing(_) => Self::transaction_failed(message),
            CoreError::Network { .. } => Self::rpc_error(message),
            CoreError::Persistence(_) | CoreError::Unrecorded { .. } => {
                Self::database_error(message)
            }
            CoreError::KeyDerivation(_) => Self::internal(message),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_maps_to_http_status() {
        let err: AppError = CoreError::WalletNotFound("TXYZ".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, AppErrorCode::WalletNotFound);

        let err: AppError = CoreError::network(LedgerStage::Broadcast, "timeout").into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(err.message.contains("broadcasttransaction"));

        let err: AppError = CoreError::Unrecorded {
            tx_id: "abc".into(),
            message: "db down".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("abc"));
    }

    #[test]
    fn test_stage_is_reported() {
        let err = CoreError::rejected(LedgerStage::TriggerSmartContract, "REVERT");
        assert_eq!(err.stage(), Some(LedgerStage::TriggerSmartContract));
        assert_eq!(CoreError::Validation("x".into()).stage(), None);
    }
}
