//! # Coherent Library
//!
//! 带临床标签的示例影像库：
//! - 索引：CSV 读入，每行带“已选”标记
//! - 选图：按临床状态过滤，维持跨检查连续性
//! - 影像：解码、像素提取与 JPEG 重编码

pub mod index;
pub mod payload;
pub mod selector;

pub use index::{ImageLabels, ImageLibrary, ImageLibraryIndex, ImageLibraryRow, RowId, SelectionSnapshot};
pub use payload::SelectedImage;
pub use selector::{ImageSelector, ScanFilterPolicy, SelectionCriteria, SlotPick};
