//! tron-custody 主入口
//! 托管式 TRON 钱包后端

use std::sync::Arc;

use anyhow::{Context, Result};
use tron_custody::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{db, logging},
    repository::{PgTransactionRepository, PgWalletRepository},
    service::{BlockchainGateway, TransactionSigner, TronHttpClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量与配置文件
    dotenvy::dotenv().ok();
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    // ✅ 2. 初始化日志 (guard 需存活至进程结束)
    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!("🚀 Starting tron-custody");

    // ✅ 3. 连接数据库
    let pool = db::init_pool(&config.database).await?;
    tracing::info!("✅ Database connected");

    // ✅ 4. 运行数据库迁移
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        db::run_migrations(&pool).await?;
        tracing::info!("✅ Database migrations completed");
    } else {
        tracing::info!("⏭️ Database migrations skipped (SKIP_MIGRATIONS set)");
    }

    // ✅ 5. 组装账本网关与应用状态
    let node = Arc::new(TronHttpClient::new(&config.tron));
    tracing::info!(api_node = %node.api_node_url(), "✅ TRON node client initialized");
    let signer = TransactionSigner::new(config.tokens.clone(), config.tron.fee_limit);
    let gateway = Arc::new(BlockchainGateway::new(node, signer));

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        Arc::new(PgWalletRepository::new(pool.clone())),
        Arc::new(PgTransactionRepository::new(pool.clone())),
        gateway,
    ));

    // ✅ 6. 启动待确认交易跟踪器
    let tracker = Arc::clone(&state.tracker)
        .start()
        .await
        .context("Failed to start pending transaction tracker")?;
    tracing::info!("✅ Pending transaction tracker started");

    // ✅ 7. 启动 HTTP 服务
    let app = api::routes(Arc::clone(&state));
    let bind_addr = config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("🎉 Server listening on http://{}", bind_addr);
    tracing::info!("📖 OpenAPI: http://{}/api-docs/openapi.json", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // ✅ 8. 停止后台任务
    tracker.shutdown().await;
    pool.close().await;
    tracing::info!("👋 Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
