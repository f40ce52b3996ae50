//! 交易状态定义
//!
//! pending → confirmed (确认数持续增长) 或 pending → failed。
//! confirmed 达到确认阈值后才视为终态。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 已广播，尚未上链或尚未查询到回执
    Pending,

    /// 已上链且执行成功 (确认数可能仍低于阈值)
    Confirmed,

    /// 链上执行失败
    Failed,
}

impl TransactionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "交易待确认",
            Self::Confirmed => "交易已确认",
            Self::Failed => "交易失败",
        }
    }

    /// 失败即终态，与确认数无关
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// 状态只能向终态单向推进
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        matches!(
            (self, target),
            (Pending, Pending) | (Pending, Confirmed) | (Pending, Failed) | (Confirmed, Confirmed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "unknown transaction status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次链上状态查询的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: TransactionStatus,
    pub confirmations: u64,
}

impl StatusReport {
    pub fn pending() -> Self {
        Self {
            status: TransactionStatus::Pending,
            confirmations: 0,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TransactionStatus::Failed,
            confirmations: 0,
        }
    }

    pub fn confirmed(confirmations: u64) -> Self {
        Self {
            status: TransactionStatus::Confirmed,
            confirmations,
        }
    }

    /// 是否可以停止跟踪
    pub fn is_terminal(&self, required_confirmations: u64) -> bool {
        match self.status {
            TransactionStatus::Failed => true,
            TransactionStatus::Confirmed => self.confirmations >= required_confirmations,
            TransactionStatus::Pending => false,
        }
    }
}
