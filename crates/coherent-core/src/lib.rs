//! # Coherent Core
//!
//! 影像关联引擎的核心模块，提供临床编码表、基础数据结构、错误定义和通用工具。

pub mod codes;
pub mod error;
pub mod models;
pub mod utils;

pub use error::{Result, SynthError};
pub use models::*;
