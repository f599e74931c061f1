//! # Coherent DICOM
//!
//! 合成影像对象：
//! - 模板：两种眼科模态的固定结构
//! - 合成：按检查与实例替换字段，生成 Part 10 字节
//! - 解析与验证：回读元数据并检查与临床记录的一致性

pub mod parser;
pub mod synthesizer;
pub mod templates;
pub mod validator;

pub use parser::{DicomParser, ParsedImagingObject};
pub use synthesizer::{ImagingObject, ImagingObjectSynthesizer, ObjectUids};
pub use validator::{DicomValidator, ValidationResult};
