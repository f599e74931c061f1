//! 运行控制器
//!
//! 逐个处理输入 bundle：扫描 → 上下文解析 → 选图 → 合成 → Media 构建，
//! 单个文件的输出暂存在内存，处理成功后与改写后的 bundle 一起写盘。

use crate::options::{FileReport, RunOptions, RunSummary};
use coherent_core::codes::ADMINISTRATIVE_MARKERS;
use coherent_core::{Modality, Result, SynthError};
use coherent_dicom::{DicomParser, DicomValidator, ImagingObjectSynthesizer};
use coherent_fhir::{
    resolve_instances, Bundle, BundleScanner, ContextResolver, MediaEmitter, MediaPayload,
};
use coherent_library::{ImageLibrary, ImageSelector, SelectedImage};
use coherent_storage::{OutputKind, OutputLayout, OutputName, PendingOutputs, StorageManager};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// 运行控制器
///
/// 独占持有两个影像库索引和唯一的随机源，整个运行严格顺序执行。
pub struct RunController {
    library: ImageLibrary,
    selector: ImageSelector,
    validator: DicomValidator,
    storage: StorageManager,
    options: RunOptions,
    rng: StdRng,
}

impl RunController {
    pub fn new<P: AsRef<Path>>(library: ImageLibrary, output: P, options: RunOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            library,
            selector: ImageSelector::new(options.scan_filter_policy),
            validator: DicomValidator::new(),
            storage: StorageManager::new(OutputLayout::new(output)),
            options,
            rng,
        }
    }

    pub fn library(&self) -> &ImageLibrary {
        &self.library
    }

    /// 处理目录中的全部输入文件
    ///
    /// 单个文件失败只记录在汇总中，不中断运行；失败文件抽中的影像退回影像库。
    pub async fn run(&mut self, fhir_dir: &Path) -> Result<RunSummary> {
        let layout = self.storage.layout().clone();
        if self.options.clean {
            layout.clean().await?;
        } else {
            layout.ensure().await?;
        }

        let files = list_input_files(fhir_dir).await?;
        info!("在 {:?} 中找到 {} 个输入文件", fhir_dir, files.len());

        let mut summary = RunSummary::default();
        for file in files {
            let snapshot = self.library.selection_snapshot();
            match self.process_file(&file).await {
                Ok(report) => summary.record(&report),
                Err(e) => {
                    error!("处理文件失败 {:?}: {}", file, e);
                    self.library.restore_selection(snapshot);
                    summary.record_failure(&file, &e);
                }
            }
        }

        info!(
            "运行完成: 处理 {} 个文件, 跳过 {} 个, 失败 {} 个, 输出 {} 张影像",
            summary.files_processed, summary.files_skipped, summary.files_failed, summary.images_emitted
        );
        Ok(summary)
    }

    /// 处理单个输入文件
    pub async fn process_file(&mut self, path: &Path) -> Result<FileReport> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SynthError::Config(format!("无效的输入路径: {:?}", path)))?;

        if ADMINISTRATIVE_MARKERS.iter().any(|m| file_name.contains(m)) {
            debug!("跳过机构/医生信息文件 {}", file_name);
            return Ok(FileReport::skipped(path, "administrative bundle"));
        }

        let text = tokio::fs::read_to_string(path).await?;
        let mut bundle = Bundle::from_json(&text)?;
        let scanned = BundleScanner::scan(&bundle)?;
        if !scanned.has_imaging() {
            info!("{} 没有影像检查，跳过", file_name);
            return Ok(FileReport::skipped(path, "no imaging events"));
        }

        if self.options.reuse_images {
            self.library.reset_selection();
        }
        self.selector.reset_continuity();

        let source_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let layout = self.storage.layout().clone();

        let mut report = FileReport::new(path);
        let mut pending = PendingOutputs::new();
        let mut new_media = Vec::new();
        // 连续性沿用时直接复用已解码的影像
        let mut carried: HashMap<(Modality, usize), SelectedImage> = HashMap::new();

        {
            let resolver = ContextResolver::new(&bundle, &scanned);

            'events: for event in scanned.processing_order() {
                let imaging = &scanned.imaging_events[event];
                let context = resolver.resolve(event)?;
                let instances = resolve_instances(imaging)?;

                for instance in &instances {
                    if self.limit_reached(report.images_emitted) {
                        info!("{} 已达到影像数量上限 {:?}，停止处理", file_name, self.options.image_limit);
                        report.limit_reached = true;
                        break 'events;
                    }

                    let pick =
                        self.selector
                            .select(&mut self.library, &context, instance.slot, &mut self.rng);
                    let Some(pick) = pick else {
                        warn!(
                            "检查 {} 实例 {} 没有可用的 {} 影像",
                            imaging.event_id(),
                            instance.uid,
                            context.modality
                        );
                        report.instances_exhausted += 1;
                        continue;
                    };

                    if pick.same_as_previous && !self.options.add_dup_images {
                        debug!("检查 {} 实例 {} 影像未变化，不重复输出", imaging.event_id(), instance.uid);
                        report.duplicates_suppressed += 1;
                        continue;
                    }

                    let key = (context.modality, instance.slot);
                    let image = match carried.get(&key) {
                        Some(image) if image.row == pick.row => image.clone(),
                        _ => {
                            let row = self.library.row(pick.row).ok_or_else(|| {
                                SynthError::Index(format!("影像库中不存在行 {:?}", pick.row))
                            })?;
                            SelectedImage::load(pick.row, row)?
                        }
                    };

                    let object = ImagingObjectSynthesizer::synthesize(imaging, &context, instance, &image)?;
                    let dicom_bytes = object.to_bytes()?;

                    let parsed = DicomParser::parse_bytes(&dicom_bytes)?;
                    let validation =
                        self.validator
                            .validate_against_record(&parsed, &context, instance, &imaging.study.started);
                    if !validation.is_valid {
                        return Err(SynthError::Validation(validation.errors.join("; ")));
                    }

                    let jpeg = image.jpeg_bytes()?;
                    let payload = MediaPayload {
                        jpeg: &jpeg,
                        width: image.width(),
                        height: image.height(),
                    };
                    new_media.push(MediaEmitter::build_media(
                        imaging,
                        &context,
                        instance,
                        &payload,
                        &mut self.rng,
                    )?);

                    let name = OutputName {
                        source_stem: source_stem.clone(),
                        modality: context.modality,
                        event_id: imaging.event_id().to_string(),
                        instance_id: instance.uid.clone(),
                    };
                    pending.stage(
                        OutputKind::ImagingObject,
                        layout.image_output_path(OutputKind::ImagingObject, &name),
                        dicom_bytes,
                    );
                    pending.stage(
                        OutputKind::RawImage,
                        layout.image_output_path(OutputKind::RawImage, &name),
                        jpeg,
                    );

                    info!(
                        "输出 {} 影像 {} (来源 {:?})",
                        context.modality,
                        object.sop_instance_uid(),
                        image.path
                    );
                    report.images_emitted += 1;
                    carried.insert(key, image);
                }
            }
        }

        for media in new_media {
            bundle.entry.push(MediaEmitter::wrap_in_entry(media));
        }
        pending.stage(OutputKind::Bundle, layout.bundle_path(&file_name), bundle.to_json_pretty()?);
        self.storage.commit(pending).await?;

        info!(
            "{} 处理完成: 输出 {} 张影像, {} 个实例无可用影像, {} 个重复被抑制",
            file_name, report.images_emitted, report.instances_exhausted, report.duplicates_suppressed
        );
        Ok(report)
    }

    fn limit_reached(&self, emitted: usize) -> bool {
        self.options
            .image_limit
            .map(|limit| emitted >= limit as usize)
            .unwrap_or(false)
    }
}

/// 目录中的 .json 文件，按文件名排序
async fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
