//! 输出目录布局

use coherent_core::{Modality, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub const FHIR_DIR: &str = "fhir";
pub const DICOM_DIR: &str = "dicom";
pub const IMAGES_DIR: &str = "images";
const KEEP_MARKER: &str = ".keep";

/// 输出文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// 改写后的 bundle
    Bundle,
    /// 合成的 DICOM 对象
    ImagingObject,
    /// 原始影像 (JPEG)
    RawImage,
}

impl OutputKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            OutputKind::Bundle => FHIR_DIR,
            OutputKind::ImagingObject => DICOM_DIR,
            OutputKind::RawImage => IMAGES_DIR,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Bundle => "json",
            OutputKind::ImagingObject => "dcm",
            OutputKind::RawImage => "jpg",
        }
    }
}

/// 输出根目录下的 fhir/、dicom/、images/ 三个子目录
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: OutputKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// 删除并重建输出目录，根目录下放置 .keep 标记
    pub async fn clean(&self) -> Result<()> {
        if tokio::fs::metadata(&self.root).await.map(|m| m.is_dir()).unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        self.ensure().await?;
        tokio::fs::write(self.root.join(KEEP_MARKER), b"").await?;
        info!("已清理输出目录 {:?}", self.root);
        Ok(())
    }

    /// 确保三个子目录存在
    pub async fn ensure(&self) -> Result<()> {
        for kind in [OutputKind::Bundle, OutputKind::ImagingObject, OutputKind::RawImage] {
            tokio::fs::create_dir_all(self.dir(kind)).await?;
        }
        Ok(())
    }

    /// 改写后 bundle 的相对路径，沿用输入文件名
    pub fn bundle_path(&self, input_file_name: &str) -> PathBuf {
        Path::new(FHIR_DIR).join(input_file_name)
    }

    /// 影像输出的相对路径
    pub fn image_output_path(&self, kind: OutputKind, name: &OutputName) -> PathBuf {
        Path::new(kind.dir_name()).join(format!("{}.{}", name, kind.extension()))
    }
}

/// `<源文件名>_<模态>_<检查标识>_<实例标识>`
///
/// 只由输入确定，相同输入重复运行得到相同文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub source_stem: String,
    pub modality: Modality,
    pub event_id: String,
    pub instance_id: String,
}

impl std::fmt::Display for OutputName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            sanitize(&self.source_stem),
            self.modality.file_tag(),
            sanitize(&self.event_id),
            sanitize(&self.instance_id)
        )
    }
}

/// 路径分隔符等字符替换为下划线
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
