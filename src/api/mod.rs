//! HTTP 接口层：/api/v1 路由、健康检查与 OpenAPI 文档

use std::sync::Arc;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::app_state::AppState;

pub mod handlers;
pub mod middleware;
pub mod response;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::healthz,
        handlers::create_wallet,
        handlers::list_wallets,
        handlers::get_balance,
        handlers::send_transaction,
        handlers::wallet_transactions,
        handlers::transaction_status,
    ),
    components(schemas(
        handlers::Healthz,
        handlers::CreateWalletReq,
        handlers::WalletResp,
        handlers::ListWalletsResp,
        handlers::BalanceResp,
        handlers::SendTransactionReq,
        handlers::TransactionResp,
        handlers::ListTransactionsResp,
        handlers::TransactionStatusResp,
        crate::domain::models::WalletKind,
        crate::domain::models::Pagination,
        crate::domain::transaction_status::TransactionStatus,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "wallets", description = "Custodial wallet management"),
        (name = "transactions", description = "Transfers and status tracking")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn routes(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route(
            "/wallets",
            post(handlers::create_wallet).get(handlers::list_wallets),
        )
        .route("/wallets/:address/balance", get(handlers::get_balance))
        .route(
            "/wallets/:address/transactions",
            get(handlers::wallet_transactions),
        )
        .route("/transaction/send", post(handlers::send_transaction))
        .route(
            "/transactions/:tx_id/status",
            get(handlers::transaction_status),
        );

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", v1)
        .layer(from_fn(middleware::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
