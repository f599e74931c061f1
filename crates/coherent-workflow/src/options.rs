//! 运行选项与结果汇总

use coherent_core::SynthError;
use coherent_library::ScanFilterPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 影响选图与输出的运行选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub clean: bool,
    pub reuse_images: bool,
    pub add_dup_images: bool,
    pub image_limit: Option<u32>,
    pub scan_filter_policy: ScanFilterPolicy,
    pub seed: Option<u64>,
}

/// 单个输入文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Processed,
    /// 跳过原因
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub images_emitted: usize,
    pub instances_exhausted: usize,
    pub duplicates_suppressed: usize,
    pub limit_reached: bool,
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            outcome: FileOutcome::Processed,
            images_emitted: 0,
            instances_exhausted: 0,
            duplicates_suppressed: 0,
            limit_reached: false,
        }
    }

    pub fn skipped(path: &Path, reason: &str) -> Self {
        Self {
            outcome: FileOutcome::Skipped(reason.to_string()),
            ..Self::new(path)
        }
    }
}

/// 整个运行的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub images_emitted: usize,
    pub instances_exhausted: usize,
    pub duplicates_suppressed: usize,
    /// 失败的文件及错误信息
    pub failures: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn record(&mut self, report: &FileReport) {
        match report.outcome {
            FileOutcome::Processed => self.files_processed += 1,
            FileOutcome::Skipped(_) => self.files_skipped += 1,
        }
        self.images_emitted += report.images_emitted;
        self.instances_exhausted += report.instances_exhausted;
        self.duplicates_suppressed += report.duplicates_suppressed;
    }

    pub fn record_failure(&mut self, path: &Path, error: &SynthError) {
        self.files_failed += 1;
        self.failures.push((path.to_path_buf(), error.to_string()));
    }

    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }
}
