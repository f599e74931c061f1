//! 运行配置
//!
//! 分层加载：内置默认值 → TOML 配置文件 → COHERENT_* 环境变量 → 命令行参数。

use anyhow::{bail, Context, Result};
use coherent_library::ScanFilterPolicy;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "COHERENT";

/// 一次运行的完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// 眼底照相索引 CSV
    pub fundus_index: PathBuf,
    /// OCT 索引 CSV
    pub oct_index: PathBuf,
    /// 输入 bundle 目录
    pub fhir_dir: PathBuf,
    /// 输出根目录
    pub output: PathBuf,
    /// 运行前清理输出目录
    pub clean: bool,
    /// 每个输入文件开始前重置影像库的“已选”标记
    pub reuse_images: bool,
    /// 不抑制与上一次相同的影像
    pub add_dup_images: bool,
    /// 每个输入文件最多输出的影像数
    pub image_limit: Option<u32>,
    /// 随机种子，未设置时使用系统熵
    pub seed: Option<u64>,
    pub scan_filter_policy: ScanFilterPolicy,
    pub log_level: String,
}

/// 命令行覆盖项，只有显式给出的值才覆盖下层配置
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub fundus_index: Option<PathBuf>,
    pub oct_index: Option<PathBuf>,
    pub fhir_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub clean: bool,
    pub reuse_images: bool,
    pub add_dup_images: bool,
    pub image_limit: Option<u32>,
    pub seed: Option<u64>,
    pub scan_filter_policy: Option<ScanFilterPolicy>,
    pub log_level: Option<String>,
}

impl RunConfig {
    /// 加载并验证配置
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let config = Self::build(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// 只合并各层，不验证路径
    pub fn build(overrides: &ConfigOverrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("output", "./output")?
            .set_default("clean", false)?
            .set_default("reuse_images", false)?
            .set_default("add_dup_images", false)?
            .set_default("scan_filter_policy", "lesion-class")?
            .set_default("log_level", "info")?;

        if let Some(path) = &overrides.config_file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("fundus_index", overrides.fundus_index.as_deref().map(path_value))?
            .set_override_option("oct_index", overrides.oct_index.as_deref().map(path_value))?
            .set_override_option("fhir_dir", overrides.fhir_dir.as_deref().map(path_value))?
            .set_override_option("output", overrides.output.as_deref().map(path_value))?
            .set_override_option("clean", overrides.clean.then_some(true))?
            .set_override_option("reuse_images", overrides.reuse_images.then_some(true))?
            .set_override_option("add_dup_images", overrides.add_dup_images.then_some(true))?
            .set_override_option("image_limit", overrides.image_limit.map(u64::from))?
            .set_override_option("seed", overrides.seed)?
            .set_override_option(
                "scan_filter_policy",
                overrides.scan_filter_policy.map(policy_value),
            )?
            .set_override_option("log_level", overrides.log_level.clone())?;

        let settings = builder.build().context("Failed to build configuration")?;
        let config: RunConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// 验证输入路径与数值范围
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("fundus_index", &self.fundus_index), ("oct_index", &self.oct_index)] {
            if !path.is_file() {
                bail!("{} 不存在或不是文件: {:?}", name, path);
            }
        }
        if !self.fhir_dir.is_dir() {
            bail!("fhir 目录不存在: {:?}", self.fhir_dir);
        }
        if self.image_limit == Some(0) {
            bail!("image_limit 必须为正数");
        }
        Ok(())
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn policy_value(policy: ScanFilterPolicy) -> &'static str {
    match policy {
        ScanFilterPolicy::LesionClass => "lesion-class",
        ScanFilterPolicy::LesionClassCnv => "lesion-class-cnv",
    }
}
