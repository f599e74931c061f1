//! 选图
//!
//! 按临床上下文过滤影像库，并维持跨检查的连续性：
//! 同一模态、同一实例槽位在病情未变时沿用上一次的影像，不再消耗影像库。

use crate::index::{ImageLabels, ImageLibrary, RowId};
use coherent_core::{ClinicalContext, Modality, SynthError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// OCT 过滤策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanFilterPolicy {
    /// 有 DME 或 PDR 诊断取 DME 类别，否则取 Normal
    #[default]
    LesionClass,
    /// DME → DME，否则 PDR → CNV，否则 Normal
    LesionClassCnv,
}

impl FromStr for ScanFilterPolicy {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesion-class" => Ok(ScanFilterPolicy::LesionClass),
            "lesion-class-cnv" => Ok(ScanFilterPolicy::LesionClassCnv),
            other => Err(SynthError::Config(format!("未知的 OCT 过滤策略: {}", other))),
        }
    }
}

/// 由上下文得到的过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCriteria {
    Fundus { stage: u8, edema: bool },
    Oct { class: &'static str },
}

impl SelectionCriteria {
    pub fn from_context(context: &ClinicalContext, policy: ScanFilterPolicy) -> Self {
        let flags = context.diagnoses;
        match context.modality {
            Modality::Fundus => SelectionCriteria::Fundus {
                stage: context.stage,
                edema: flags.dme,
            },
            Modality::Oct => {
                let class = match policy {
                    ScanFilterPolicy::LesionClass if flags.dme || flags.pdr => "DME",
                    ScanFilterPolicy::LesionClass => "Normal",
                    ScanFilterPolicy::LesionClassCnv if flags.dme => "DME",
                    ScanFilterPolicy::LesionClassCnv if flags.pdr => "CNV",
                    ScanFilterPolicy::LesionClassCnv => "Normal",
                };
                SelectionCriteria::Oct { class }
            }
        }
    }

    /// 行标签是否满足条件
    ///
    /// 眼底：分级等于分期序号；有 DME 时水肿风险非 0，否则恰为 0。
    pub fn matches(&self, labels: &ImageLabels) -> bool {
        match (self, labels) {
            (
                SelectionCriteria::Fundus { stage, edema },
                ImageLabels::Fundus { retinopathy_grade, macular_edema_risk },
            ) => {
                *retinopathy_grade == stage.to_string() && (macular_edema_risk != "0") == *edema
            }
            (SelectionCriteria::Oct { class }, ImageLabels::Oct { class: row_class }) => row_class == class,
            _ => false,
        }
    }
}

/// 一个槽位上一次使用的影像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotMemory {
    stage: u8,
    criteria: SelectionCriteria,
    row: RowId,
}

/// 选图结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPick {
    pub row: RowId,
    /// 病情未变，沿用上一次的影像
    pub reused: bool,
    /// 与该槽位上一次的影像相同
    pub same_as_previous: bool,
}

/// 选图器
///
/// 连续性记忆按 (模态, 实例槽位) 保存，作用域为单个输入文件。
#[derive(Debug, Default)]
pub struct ImageSelector {
    policy: ScanFilterPolicy,
    memory: HashMap<(Modality, usize), SlotMemory>,
}

impl ImageSelector {
    pub fn new(policy: ScanFilterPolicy) -> Self {
        Self {
            policy,
            memory: HashMap::new(),
        }
    }

    /// 开始新的输入文件时清空连续性记忆
    pub fn reset_continuity(&mut self) {
        self.memory.clear();
    }

    /// 槽位上一次使用的行
    pub fn previous(&self, modality: Modality, slot: usize) -> Option<RowId> {
        self.memory.get(&(modality, slot)).map(|m| m.row)
    }

    /// 为一个实例选图
    ///
    /// 分期与过滤条件都未变时沿用上一次的影像；否则从满足条件且未选过的行中
    /// 均匀随机抽取一行并标记为已选。没有可用行时返回 `None`，并清除该槽位记忆。
    pub fn select<R: Rng + ?Sized>(
        &mut self,
        library: &mut ImageLibrary,
        context: &ClinicalContext,
        slot: usize,
        rng: &mut R,
    ) -> Option<SlotPick> {
        let key = (context.modality, slot);
        let criteria = SelectionCriteria::from_context(context, self.policy);
        let previous = self.memory.get(&key).copied();

        if let Some(memory) = previous {
            if memory.stage == context.stage && memory.criteria == criteria {
                debug!("槽位 {:?} 病情未变，沿用影像 {:?}", key, memory.row);
                return Some(SlotPick {
                    row: memory.row,
                    reused: true,
                    same_as_previous: true,
                });
            }
        }

        let index = library.index_mut(context.modality);
        let candidates = index.available(|labels| criteria.matches(labels));
        let Some(row) = candidates.choose(rng).copied() else {
            debug!("槽位 {:?} 没有满足 {:?} 的可用影像", key, criteria);
            self.memory.remove(&key);
            return None;
        };
        index.mark_selected(row);

        debug!("槽位 {:?} 从 {} 个候选中抽中 {:?}", key, candidates.len(), row);
        self.memory.insert(
            key,
            SlotMemory {
                stage: context.stage,
                criteria,
                row,
            },
        );

        Some(SlotPick {
            row,
            reused: false,
            same_as_previous: previous.map(|m| m.row) == Some(row),
        })
    }
}
