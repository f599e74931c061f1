//! 输出文件存储
//!
//! 单个输入文件的全部输出先暂存在内存，处理成功后与 bundle 一起写盘。

use crate::layout::{OutputKind, OutputLayout};
use coherent_core::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 暂存的一个输出文件
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub kind: OutputKind,
    /// 相对输出根目录的路径
    pub relative_path: PathBuf,
    pub data: Vec<u8>,
}

/// 单个输入文件的暂存输出
#[derive(Debug, Default)]
pub struct PendingOutputs {
    files: Vec<PendingFile>,
}

impl PendingOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, kind: OutputKind, relative_path: PathBuf, data: Vec<u8>) {
        debug!("暂存输出 {:?} ({} bytes)", relative_path, data.len());
        self.files.push(PendingFile {
            kind,
            relative_path,
            data,
        });
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn count(&self, kind: OutputKind) -> usize {
        self.files.iter().filter(|f| f.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// 存储管理器
#[derive(Debug, Clone)]
pub struct StorageManager {
    layout: OutputLayout,
}

impl StorageManager {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// 写入单个文件，按需创建父目录
    pub async fn store_file(&self, data: &[u8], relative_path: &Path) -> Result<PathBuf> {
        let full_path = self.layout.root().join(relative_path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        Ok(full_path)
    }

    /// 读取输出根目录下的文件
    pub async fn get_file(&self, relative_path: &Path) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.layout.root().join(relative_path)).await?;
        Ok(data)
    }

    /// 写入暂存的全部输出，返回写入的文件路径
    pub async fn commit(&self, pending: PendingOutputs) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(pending.files.len());
        for file in pending.files {
            written.push(self.store_file(&file.data, &file.relative_path).await?);
        }
        info!("已写入 {} 个输出文件", written.len());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nothing_written_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(OutputLayout::new(dir.path()));

        let mut pending = PendingOutputs::new();
        pending.stage(OutputKind::ImagingObject, PathBuf::from("dicom/a.dcm"), vec![1, 2]);
        pending.stage(OutputKind::RawImage, PathBuf::from("images/a.jpg"), vec![3]);
        pending.stage(OutputKind::Bundle, PathBuf::from("fhir/a.json"), b"{}".to_vec());
        assert_eq!(pending.count(OutputKind::RawImage), 1);
        assert!(!dir.path().join("dicom/a.dcm").exists());

        let written = storage.commit(pending).await.unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(storage.get_file(Path::new("dicom/a.dcm")).await.unwrap(), vec![1, 2]);
        assert_eq!(storage.get_file(Path::new("fhir/a.json")).await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_dropped_pending_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut pending = PendingOutputs::new();
            pending.stage(OutputKind::ImagingObject, PathBuf::from("dicom/b.dcm"), vec![0]);
        }
        assert!(!dir.path().join("dicom").exists());
    }
}
