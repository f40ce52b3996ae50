// 交易数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    domain::{
        models::{Page, PageRequest, Transaction},
        transaction_status::{StatusReport, TransactionStatus},
    },
    error::{CoreError, CoreResult},
};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// 同一 txID 重复保存不报错
    async fn save_transaction(&self, tx: &Transaction) -> CoreResult<()>;

    async fn find_transaction(&self, tx_id: &str) -> CoreResult<Option<Transaction>>;

    /// 作为发送方或接收方的交易，按创建时间倒序
    async fn find_transactions_by_address(
        &self,
        address: &str,
        page: PageRequest,
    ) -> CoreResult<Page<Transaction>>;

    async fn find_transactions_by_status(
        &self,
        status: TransactionStatus,
    ) -> CoreResult<Vec<Transaction>>;

    async fn get_transaction_status(&self, tx_id: &str) -> CoreResult<Option<TransactionStatus>>;

    /// 单调更新：非法状态回退被忽略，确认数只增不减。
    /// 返回是否有记录被更新
    async fn update_transaction_status(
        &self,
        tx_id: &str,
        report: StatusReport,
    ) -> CoreResult<bool>;
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    from_address: String,
    to_address: String,
    amount: Decimal,
    token: String,
    status: String,
    confirmations: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = CoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            from_address: row.from_address,
            to_address: row.to_address,
            amount: row.amount,
            token: row.token,
            status: row.status.parse()?,
            confirmations: u64::try_from(row.confirmations).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, from_address, to_address, amount, token, status, confirmations, created_at, updated_at";

fn confirmations_param(confirmations: u64) -> i64 {
    i64::try_from(confirmations).unwrap_or(i64::MAX)
}

// ============ PostgreSQL 实现 ============

pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn save_transaction(&self, tx: &Transaction) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO transactions (id, from_address, to_address, amount, token, status,
                                       confirmations, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&tx.id)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(tx.amount)
        .bind(&tx.token)
        .bind(tx.status.as_str())
        .bind(confirmations_param(tx.confirmations))
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_transaction(&self, tx_id: &str) -> CoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(tx_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn find_transactions_by_address(
        &self,
        address: &str,
        page: PageRequest,
    ) -> CoreResult<Page<Transaction>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE from_address = $1 OR to_address = $1",
        )
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions
             WHERE from_address = $1 OR to_address = $1
             ORDER BY created_at DESC, id
             LIMIT $2 OFFSET $3",
            TRANSACTION_COLUMNS
        ))
        .bind(address)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Page::new(items, page, total.max(0) as u64))
    }

    async fn find_transactions_by_status(
        &self,
        status: TransactionStatus,
    ) -> CoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE status = $1 ORDER BY created_at",
            TRANSACTION_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn get_transaction_status(&self, tx_id: &str) -> CoreResult<Option<TransactionStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1")
                .bind(tx_id)
                .fetch_optional(&self.pool)
                .await?;

        status.map(|s| s.parse()).transpose()
    }

    async fn update_transaction_status(
        &self,
        tx_id: &str,
        report: StatusReport,
    ) -> CoreResult<bool> {
        // 与 TransactionStatus::can_transition_to 保持一致
        let result = sqlx::query(
            "UPDATE transactions
             SET status = $2,
                 confirmations = GREATEST(confirmations, $3),
                 updated_at = NOW()
             WHERE id = $1
               AND (status = 'pending' OR (status = 'confirmed' AND $2 = 'confirmed'))",
        )
        .bind(tx_id)
        .bind(report.status.as_str())
        .bind(confirmations_param(report.confirmations))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
