//! # Coherent 存储模块
//!
//! 负责输出目录布局、确定性的文件命名和按输入文件提交的输出写盘。

pub mod layout;
pub mod storage;

pub use layout::*;
pub use storage::*;
