use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    api::{
        middleware::TraceId,
        response::{created_response, success_response, ApiResponse, ApiResult},
    },
    app_state::AppState,
    domain::{
        models::{PageRequest, Pagination, Transaction, Wallet, WalletFilter, WalletKind},
        transaction_status::TransactionStatus,
    },
    error::{AppError, CoreError},
    service::wallet_service::SendRequest,
};

fn traced(trace_id: &TraceId) -> impl Fn(CoreError) -> AppError + '_ {
    move |e| AppError::from(e).with_trace_id(trace_id.0.clone())
}

// -------- 钱包 --------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWalletReq {
    pub username: Option<String>,
    /// regular | bank
    pub kind: Option<String>,
}

/// 钱包对外视图，不含私钥与助记词
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResp {
    pub id: Uuid,
    pub username: String,
    pub kind: WalletKind,
    pub address: String,
    pub public_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResp {
    fn from(w: Wallet) -> Self {
        Self {
            id: w.id,
            username: w.username,
            kind: w.kind,
            address: w.address,
            public_key: w.public_key,
            is_active: w.active,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/wallets",
    request_body = CreateWalletReq,
    responses(
        (status = 201, description = "Wallet created", body = WalletResp),
        (status = 400, description = "Missing username or kind"),
        (status = 409, description = "Username already taken")
    ),
    tag = "wallets"
)]
pub async fn create_wallet(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Json(req): Json<CreateWalletReq>,
) -> Result<(StatusCode, Json<ApiResponse<WalletResp>>), AppError> {
    let kind = match req.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<WalletKind>().map_err(traced(&trace_id))?),
    };
    let username = req.username.unwrap_or_default();

    let wallet = st
        .wallet_service
        .create_wallet(&username, kind)
        .await
        .map_err(traced(&trace_id))?;

    created_response(WalletResp::from(wallet))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListWalletsQuery {
    /// regular | bank
    pub kind: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListWalletsResp {
    pub wallets: Vec<WalletResp>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/api/v1/wallets",
    params(ListWalletsQuery),
    responses((status = 200, description = "Wallet page", body = ListWalletsResp)),
    tag = "wallets"
)]
pub async fn list_wallets(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Query(q): Query<ListWalletsQuery>,
) -> ApiResult<ListWalletsResp> {
    let kind = q
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.trim().parse::<WalletKind>())
        .transpose()
        .map_err(traced(&trace_id))?;

    let filter = WalletFilter {
        kind,
        active: q.is_active,
        page: PageRequest::new(q.page, q.limit),
    };
    let page = st
        .wallet_service
        .list_wallets(&filter)
        .await
        .map_err(traced(&trace_id))?;

    success_response(ListWalletsResp {
        wallets: page.items.into_iter().map(WalletResp::from).collect(),
        pagination: page.pagination,
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResp {
    pub address: String,
    #[schema(value_type = String, example = "12.5")]
    pub trx: Decimal,
    /// 代币符号 -> 余额 (显示单位)
    #[schema(value_type = Object)]
    pub tokens: BTreeMap<String, Decimal>,
}

#[utoipa::path(
    get,
    path = "/api/v1/wallets/{address}/balance",
    params(("address" = String, Path, description = "TRON base58 address")),
    responses(
        (status = 200, description = "Balances in display units", body = BalanceResp),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Balance index unreachable")
    ),
    tag = "wallets"
)]
pub async fn get_balance(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Path(address): Path<String>,
) -> ApiResult<BalanceResp> {
    let balance = st
        .wallet_service
        .get_balance(&address)
        .await
        .map_err(traced(&trace_id))?;

    success_response(BalanceResp {
        address,
        trx: balance.trx,
        tokens: balance.tokens,
    })
}

// -------- 交易 --------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendTransactionReq {
    pub from_address: String,
    pub to_address: String,
    /// 显示单位，例如 "1.5"
    #[schema(value_type = String, example = "1.5")]
    pub amount: Decimal,
    /// 代币符号，例如 TRX / USDT
    #[serde(alias = "token_type")]
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResp {
    pub tx_id: String,
    pub from_address: String,
    pub to_address: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub token: String,
    pub status: TransactionStatus,
    pub confirmations: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResp {
    fn from(tx: Transaction) -> Self {
        Self {
            tx_id: tx.id,
            from_address: tx.from_address,
            to_address: tx.to_address,
            amount: tx.amount,
            token: tx.token,
            status: tx.status,
            confirmations: tx.confirmations,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/transaction/send",
    request_body = SendTransactionReq,
    responses(
        (status = 201, description = "Broadcast accepted, status pending", body = TransactionResp),
        (status = 400, description = "Invalid address, token or amount; or ledger rejection"),
        (status = 404, description = "Sender wallet not found"),
        (status = 502, description = "Ledger node unreachable")
    ),
    tag = "transactions"
)]
pub async fn send_transaction(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Json(req): Json<SendTransactionReq>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResp>>), AppError> {
    let tx = st
        .wallet_service
        .send_transaction(SendRequest {
            from_address: req.from_address,
            to_address: req.to_address,
            amount: req.amount,
            token: req.token,
        })
        .await
        .map_err(traced(&trace_id))?;

    created_response(TransactionResp::from(tx))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListTransactionsResp {
    pub transactions: Vec<TransactionResp>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/api/v1/wallets/{address}/transactions",
    params(
        ("address" = String, Path, description = "Sender or recipient address"),
        PageQuery
    ),
    responses((status = 200, description = "Transactions, newest first", body = ListTransactionsResp)),
    tag = "transactions"
)]
pub async fn wallet_transactions(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Path(address): Path<String>,
    Query(q): Query<PageQuery>,
) -> ApiResult<ListTransactionsResp> {
    let page = st
        .wallet_service
        .wallet_transactions(&address, PageRequest::new(q.page, q.limit))
        .await
        .map_err(traced(&trace_id))?;

    success_response(ListTransactionsResp {
        transactions: page.items.into_iter().map(TransactionResp::from).collect(),
        pagination: page.pagination,
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionStatusResp {
    pub tx_id: String,
    pub status: TransactionStatus,
    pub description: String,
    pub confirmations: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/{tx_id}/status",
    params(("tx_id" = String, Path, description = "Ledger transaction id")),
    responses(
        (status = 200, description = "Stored status", body = TransactionStatusResp),
        (status = 404, description = "Transaction not found")
    ),
    tag = "transactions"
)]
pub async fn transaction_status(
    State(st): State<Arc<AppState>>,
    Extension(trace_id): Extension<TraceId>,
    Path(tx_id): Path<String>,
) -> ApiResult<TransactionStatusResp> {
    let tx = st
        .wallet_service
        .transaction(&tx_id)
        .await
        .map_err(traced(&trace_id))?;

    success_response(TransactionStatusResp {
        tx_id: tx.id,
        status: tx.status,
        description: tx.status.description().to_string(),
        confirmations: tx.confirmations,
    })
}

// -------- 健康检查 --------

#[derive(Debug, Serialize, ToSchema)]
pub struct Healthz {
    pub status: String,
    pub version: String,
    /// 跟踪器工作集中的交易数
    pub tracked_transactions: usize,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "OK", body = Healthz)),
    tag = "health"
)]
pub async fn healthz(State(st): State<Arc<AppState>>) -> ApiResult<Healthz> {
    success_response(Healthz {
        status: "ok".into(),
        version: format!(
            "{}+{}",
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_HASH").unwrap_or("dev")
        ),
        tracked_transactions: st.working_set().len().await,
    })
}
