//! 错误定义模块

use thiserror::Error;

/// 影像关联引擎统一错误类型
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("影像索引错误: {0}")]
    Index(String),

    #[error("图像处理错误: {0}")]
    Image(String),

    #[error("DICOM处理错误: {0}")]
    Dicom(String),

    #[error("资源格式错误: {0}")]
    MalformedResource(String),

    #[error("引用未找到: {0}")]
    MissingReference(String),

    #[error("未知的分期观察编码: {0}")]
    UnknownStageCode(String),

    #[error("无法识别的眼别: {0}")]
    InvalidLaterality(String),

    #[error("验证错误: {0}")]
    Validation(String),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, SynthError>;
