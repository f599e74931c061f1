//! # Coherent 管理模块
//!
//! 运行配置的分层加载与日志初始化。

pub mod config;
pub mod logging;

pub use config::{ConfigOverrides, RunConfig};
pub use logging::init_logging;
