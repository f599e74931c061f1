//! 日志初始化

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 设置了 RUST_LOG 时以其为准，否则使用配置中的日志级别。
pub fn init_logging(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| anyhow!("无效的日志级别 {}: {}", log_level, e))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("日志初始化失败: {}", e))
}
