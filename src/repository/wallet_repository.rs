// 钱包数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    domain::{
        models::{Page, Wallet, WalletFilter, WalletKind},
        secret::SecretString,
    },
    error::{is_unique_violation, CoreError, CoreResult},
};

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// 用户名或地址重复时返回 WalletAlreadyExists
    async fn create_wallet(&self, wallet: &Wallet) -> CoreResult<()>;

    async fn find_wallets(&self, filter: &WalletFilter) -> CoreResult<Page<Wallet>>;

    async fn find_wallet_by_address(&self, address: &str) -> CoreResult<Option<Wallet>>;

    /// 只更新可变字段 (active)；密钥材料写入后不可修改
    async fn update_wallet(&self, wallet: &Wallet) -> CoreResult<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    username: String,
    kind: String,
    address: String,
    public_key: String,
    private_key: String,
    mnemonic: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = CoreError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: row.id,
            username: row.username,
            kind: row.kind.parse::<WalletKind>()?,
            address: row.address,
            public_key: row.public_key,
            private_key: SecretString::from(row.private_key),
            mnemonic: SecretString::from(row.mnemonic),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const WALLET_COLUMNS: &str = "id, username, kind, address, public_key, private_key, mnemonic, \
                              active, created_at, updated_at";

// ============ PostgreSQL 实现 ============

pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create_wallet(&self, wallet: &Wallet) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO wallets (id, username, kind, address, public_key, private_key, mnemonic,
                                  active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(wallet.id)
        .bind(&wallet.username)
        .bind(wallet.kind.as_str())
        .bind(&wallet.address)
        .bind(&wallet.public_key)
        .bind(wallet.private_key.expose())
        .bind(wallet.mnemonic.expose())
        .bind(wallet.active)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::WalletAlreadyExists(wallet.username.clone())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn find_wallets(&self, filter: &WalletFilter) -> CoreResult<Page<Wallet>> {
        let kind = filter.kind.map(|k| k.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM wallets
             WHERE ($1::TEXT IS NULL OR kind = $1)
               AND ($2::BOOLEAN IS NULL OR active = $2)",
        )
        .bind(kind)
        .bind(filter.active)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets
             WHERE ($1::TEXT IS NULL OR kind = $1)
               AND ($2::BOOLEAN IS NULL OR active = $2)
             ORDER BY created_at, id
             LIMIT $3 OFFSET $4",
            WALLET_COLUMNS
        ))
        .bind(kind)
        .bind(filter.active)
        .bind(i64::from(filter.page.limit))
        .bind(filter.page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let wallets = rows
            .into_iter()
            .map(Wallet::try_from)
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Page::new(wallets, filter.page, total.max(0) as u64))
    }

    async fn find_wallet_by_address(&self, address: &str) -> CoreResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE address = $1",
            WALLET_COLUMNS
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Wallet::try_from).transpose()
    }

    async fn update_wallet(&self, wallet: &Wallet) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE wallets SET active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(wallet.id)
        .bind(wallet.active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::WalletNotFound(wallet.address.clone()));
        }
        Ok(())
    }
}
