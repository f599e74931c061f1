//! # 合成运行工作流
//!
//! 按文件驱动整个合成流程：
//! - 运行控制器：扫描、上下文解析、选图、DICOM 合成与 Media 构建
//! - 运行选项与结果汇总

pub mod engine;
pub mod options;

pub use engine::RunController;
pub use options::{FileOutcome, FileReport, RunOptions, RunSummary};
