//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和按天轮转的文件日志

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LOG_FILE: &str = "tron-custody.log";

/// 初始化日志系统
///
/// 启用文件日志时返回 WorkerGuard，调用方需持有到进程退出，否则缓冲日志会丢失。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG 优先
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log filter: {}", config.level))?,
    };

    let json = config.format == "json";

    let (file_writer, guard) = if config.enable_file_logging {
        let (dir, file) = log_file_location(config.log_file_path.as_deref());
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
        let (writer, guard) = non_blocking(rolling::daily(dir, file));
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let stdout_json = json.then(|| fmt::layer().json().with_timer(ChronoUtc::rfc_3339()));
    let stdout_text = (!json).then(|| {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
    });
    let file_json = file_writer.clone().filter(|_| json).map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
    });
    let file_text = file_writer.filter(|_| !json).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
    });

    Registry::default()
        .with(filter)
        .with(stdout_json)
        .with(stdout_text)
        .with(file_json)
        .with(file_text)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// 日志文件路径拆分为 (目录, 文件名)
fn log_file_location(path: Option<&str>) -> (&Path, &str) {
    let path = match path {
        Some(p) if !p.trim().is_empty() => Path::new(p),
        _ => return (Path::new(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE),
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR));
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_location() {
        assert_eq!(
            log_file_location(Some("/var/log/custody/app.log")),
            (Path::new("/var/log/custody"), "app.log")
        );
        assert_eq!(
            log_file_location(Some("app.log")),
            (Path::new(DEFAULT_LOG_DIR), "app.log")
        );
        assert_eq!(
            log_file_location(None),
            (Path::new(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE)
        );
    }
}
