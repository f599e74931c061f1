//! 合成影像生成主程序

use anyhow::{Context, Result};
use clap::Parser;
use coherent_admin::{init_logging, ConfigOverrides, RunConfig};
use coherent_library::{ImageLibrary, ScanFilterPolicy};
use coherent_workflow::{RunController, RunOptions};
use std::path::PathBuf;
use tracing::{error, info};

/// 为临床记录 bundle 关联眼科影像并合成 DICOM 对象
#[derive(Parser, Debug)]
#[command(name = "coherent-imaging")]
#[command(about = "为 FHIR bundle 中的眼科检查选取影像，合成 DICOM 对象与 Media 资源")]
struct Args {
    /// 眼底照相索引 CSV
    fundus_index: Option<PathBuf>,

    /// OCT 索引 CSV
    oct_index: Option<PathBuf>,

    /// 输入 bundle 目录
    fhir: Option<PathBuf>,

    /// 输出根目录 (默认 ./output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 运行前重建输出目录
    #[arg(long)]
    clean: bool,

    /// 每个输入文件开始前重置影像库的已选标记
    #[arg(long = "reuse_images")]
    reuse_images: bool,

    /// 影像未变化时仍然输出
    #[arg(long = "add_dup_images")]
    add_dup_images: bool,

    /// 每个输入文件最多输出的影像数
    #[arg(long = "image_limit")]
    image_limit: Option<u32>,

    /// 随机种子
    #[arg(long)]
    seed: Option<u64>,

    /// OCT 过滤策略 (lesion-class | lesion-class-cnv)
    #[arg(long)]
    scan_filter_policy: Option<ScanFilterPolicy>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config,
            fundus_index: self.fundus_index,
            oct_index: self.oct_index,
            fhir_dir: self.fhir,
            output: self.output,
            clean: self.clean,
            reuse_images: self.reuse_images,
            add_dup_images: self.add_dup_images,
            image_limit: self.image_limit,
            seed: self.seed,
            scan_filter_policy: self.scan_filter_policy,
            log_level: self.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = RunConfig::load(&args.overrides())?;

    init_logging(&config.log_level)?;

    info!("启动合成影像生成...");
    info!("  眼底照相索引: {:?}", config.fundus_index);
    info!("  OCT 索引: {:?}", config.oct_index);
    info!("  输入目录: {:?}", config.fhir_dir);
    info!("  输出目录: {:?}", config.output);

    let library = ImageLibrary::load(&config.fundus_index, &config.oct_index)
        .context("Failed to load image library indices")?;
    info!(
        "影像库: 眼底照相 {} 张, OCT {} 张",
        library.fundus.len(),
        library.oct.len()
    );

    let options = RunOptions {
        clean: config.clean,
        reuse_images: config.reuse_images,
        add_dup_images: config.add_dup_images,
        image_limit: config.image_limit,
        scan_filter_policy: config.scan_filter_policy,
        seed: config.seed,
    };

    let mut controller = RunController::new(library, &config.output, options);
    let summary = controller
        .run(&config.fhir_dir)
        .await
        .context("Run aborted")?;

    if summary.has_failures() {
        for (path, reason) in &summary.failures {
            error!("  {:?}: {}", path, reason);
        }
        anyhow::bail!("{} 个输入文件处理失败", summary.files_failed);
    }

    Ok(())
}
