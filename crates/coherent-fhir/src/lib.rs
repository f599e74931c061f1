//! # Coherent FHIR
//!
//! 临床记录 bundle 的读取与改写：
//! - 资源视图：只建模引擎读取的字段，其余字段原样保留
//! - 扫描：按类型和编码分桶并建立交叉引用索引
//! - 上下文解析：诊断时间规则、分期、眼别
//! - Media 构建：为合成的影像追加 Media 资源

pub mod context;
pub mod media;
pub mod resources;
pub mod scanner;

pub use context::{get_stage, has_diagnosis, resolve_instances, ContextResolver};
pub use media::{MediaEmitter, MediaPayload, MEDIA_CONTENT_TYPE};
pub use resources::{Bundle, BundleEntry};
pub use scanner::{BundleScanner, ImagingEvent, ScannedBundle};
