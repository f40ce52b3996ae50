//! 核心数据模型

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{derivation::DerivedWallet, secret::SecretString, transaction_status::TransactionStatus},
    error::CoreError,
};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// 钱包类型：普通用户钱包 / 托管银行钱包
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Regular,
    Bank,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Bank => "bank",
        }
    }
}

impl FromStr for WalletKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "bank" => Ok(Self::Bank),
            other => Err(CoreError::Validation(format!("unknown wallet kind: {}", other))),
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 托管钱包
///
/// `address` 恒等于公钥编码结果；私钥与助记词写入后不可修改。
#[derive(Debug, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub username: String,
    pub kind: WalletKind,
    pub address: String,
    pub public_key: String,
    pub private_key: SecretString,
    pub mnemonic: SecretString,
    /// 首笔转出成功后置为 true
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(username: impl Into<String>, kind: WalletKind, derived: DerivedWallet) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            kind,
            address: derived.address,
            public_key: derived.public_key,
            private_key: derived.private_key,
            mnemonic: derived.mnemonic,
            active: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 分页参数 (page 从 1 开始)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalletFilter {
    pub kind: Option<WalletKind>,
    pub active: Option<bool>,
    pub page: PageRequest,
}

impl WalletFilter {
    /// 跟踪器使用：已激活的普通钱包
    pub fn active_regular(page: PageRequest) -> Self {
        Self {
            kind: Some(WalletKind::Regular),
            active: Some(true),
            page,
        }
    }

    pub fn matches(&self, wallet: &Wallet) -> bool {
        self.kind.map_or(true, |kind| wallet.kind == kind)
            && self.active.map_or(true, |active| wallet.active == active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            pagination: Pagination {
                page: request.page,
                limit: request.limit,
                total,
            },
        }
    }

    /// 当前页之后是否还有数据
    pub fn has_more(&self) -> bool {
        u64::from(self.pagination.page) * u64::from(self.pagination.limit) < self.pagination.total
    }
}

/// 链上转账记录 (id 为链上 txID)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub token: String,
    pub status: TransactionStatus,
    pub confirmations: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// 广播成功后生成的初始记录
    pub fn pending(tx_id: impl Into<String>, transfer: &Transfer) -> Self {
        let now = Utc::now();
        Self {
            id: tx_id.into(),
            from_address: transfer.from_address.clone(),
            to_address: transfer.to_address.clone(),
            amount: transfer.amount,
            token: transfer.token.clone(),
            status: TransactionStatus::Pending,
            confirmations: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 一笔待发送的转账
#[derive(Debug, Clone)]
pub struct Transfer {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub token: String,
    pub private_key: SecretString,
}

/// 钱包余额 (显示单位)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    pub trx: Decimal,
    pub tokens: BTreeMap<String, Decimal>,
}
