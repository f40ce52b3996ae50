//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::token::TokenRegistry;

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tron: TronConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub tokens: TokenRegistry,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 指令，RUST_LOG 存在时以其为准
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// TRON 节点与 TronScan 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TronConfig {
    pub api_node_url: String,
    pub api_node_key: Option<String>,
    pub scan_url: String,
    pub scan_key: Option<String>,
    /// 合约调用 fee_limit (sun)
    pub fee_limit: u64,
    pub request_timeout_secs: u64,
    /// account/tokens 单页数量
    pub scan_page_limit: u32,
}

/// 待确认交易跟踪器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub discovery_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub required_confirmations: u64,
    /// 发现循环分页大小
    pub page_size: u32,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost:5432/tron_custody".into()),
            max_connections: env_or("DB_MAX_CONNS", 16),
            min_connections: env_or("DB_MIN_CONNS", 2),
            acquire_timeout_secs: env_or("DB_ACQ_TIMEOUT_SECS", 5),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "tron_custody=debug,tower_http=debug,sqlx=warn".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for TronConfig {
    fn default() -> Self {
        Self {
            api_node_url: std::env::var("TRON_API_NODE_URL")
                .unwrap_or_else(|_| "https://api.trongrid.io".into()),
            api_node_key: std::env::var("TRON_API_NODE_KEY").ok(),
            scan_url: std::env::var("TRON_SCAN_URL")
                .unwrap_or_else(|_| "https://apilist.tronscanapi.com/api".into()),
            scan_key: std::env::var("TRON_SCAN_KEY").ok(),
            fee_limit: env_or("TRON_FEE_LIMIT", 30_000_000),
            request_timeout_secs: env_or("TRON_REQUEST_TIMEOUT_SECS", 30),
            scan_page_limit: env_or("TRON_SCAN_PAGE_LIMIT", 50),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            discovery_interval_secs: env_or("TRACKER_DISCOVERY_INTERVAL_SECS", 60),
            poll_interval_secs: env_or("TRACKER_POLL_INTERVAL_SECS", 10),
            required_confirmations: env_or("TRACKER_REQUIRED_CONFIRMATIONS", 20),
            page_size: env_or("TRACKER_PAGE_SIZE", 1000),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            tron: TronConfig::default(),
            tracker: TrackerConfig::default(),
            tokens: TokenRegistry::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 配置文件存在时以文件为准，否则使用环境变量
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        if let Some(path) = path {
            if path.as_ref().exists() {
                return Self::from_file(path);
            }
        }
        Self::from_env()
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }

        tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .with_context(|| format!("LOG_LEVEL is not a valid filter: {}", self.logging.level))?;

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.tron.api_node_url.trim().is_empty() {
            anyhow::bail!("TRON_API_NODE_URL must not be empty");
        }
        if self.tron.scan_url.trim().is_empty() {
            anyhow::bail!("TRON_SCAN_URL must not be empty");
        }
        if self.tron.request_timeout_secs == 0 {
            anyhow::bail!("TRON_REQUEST_TIMEOUT_SECS must be positive");
        }

        if self.tracker.discovery_interval_secs == 0 || self.tracker.poll_interval_secs == 0 {
            anyhow::bail!("tracker intervals must be positive");
        }
        if self.tracker.page_size == 0 {
            anyhow::bail!("TRACKER_PAGE_SIZE must be positive");
        }

        self.tokens
            .validate()
            .context("Invalid token registry")?;

        Ok(())
    }
}
