//! 核心数据模型定义

use crate::codes;
use crate::error::{Result, SynthError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 影像模态
///
/// 两种模态各自对应一个影像库索引和一个 DICOM 模板。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// 断层扫描 (OCT)
    Oct,
    /// 广角眼底照相
    Fundus,
}

impl Modality {
    /// 根据检查的 procedure code 判断模态
    pub fn from_procedure_code(code: &str) -> Option<Self> {
        match code {
            codes::OCT_PROCEDURE_CODE => Some(Modality::Oct),
            codes::FUNDUS_PROCEDURE_CODE => Some(Modality::Fundus),
            _ => None,
        }
    }

    /// 输出文件名中使用的模态标记
    pub fn file_tag(&self) -> &'static str {
        match self {
            Modality::Oct => "oct",
            Modality::Fundus => "fundus",
        }
    }

    /// DICOM Modality (0008,0060)
    pub fn dicom_code(&self) -> &'static str {
        match self {
            Modality::Oct => "OPT",
            Modality::Fundus => "OP",
        }
    }

    /// DICOM 模态的显示名称
    pub fn display(&self) -> &'static str {
        match self {
            Modality::Oct => "Ophthalmic Tomography",
            Modality::Fundus => "Ophthalmic Photography",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_tag())
    }
}

/// 眼别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Laterality {
    Left,
    Right,
}

impl Laterality {
    /// 从影像实例标题映射眼别，只接受两种取值
    pub fn from_title(title: &str) -> Result<Self> {
        let title = title.trim();
        if title.eq_ignore_ascii_case("Left eye") {
            Ok(Laterality::Left)
        } else if title.eq_ignore_ascii_case("Right eye") {
            Ok(Laterality::Right)
        } else {
            Err(SynthError::InvalidLaterality(title.to_string()))
        }
    }

    /// DICOM ImageLaterality / FrameLaterality 取值
    pub fn dicom_code(&self) -> &'static str {
        match self {
            Laterality::Left => "L",
            Laterality::Right => "R",
        }
    }
}

/// 三种相关诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosisKind {
    /// 非增殖性糖尿病视网膜病变
    Npdr,
    /// 增殖性糖尿病视网膜病变
    Pdr,
    /// 糖尿病黄斑水肿
    Dme,
}

impl DiagnosisKind {
    pub const ALL: [DiagnosisKind; 3] = [DiagnosisKind::Npdr, DiagnosisKind::Pdr, DiagnosisKind::Dme];

    /// 根据 Condition 的主诊断编码判断类型
    pub fn from_condition_code(code: &str) -> Option<Self> {
        match code {
            codes::NPDR_CONDITION_CODE => Some(DiagnosisKind::Npdr),
            codes::PDR_CONDITION_CODE => Some(DiagnosisKind::Pdr),
            codes::DME_CONDITION_CODE => Some(DiagnosisKind::Dme),
            _ => None,
        }
    }

    /// 在三槽诊断表中的位置
    pub fn slot(&self) -> usize {
        match self {
            DiagnosisKind::Npdr => 0,
            DiagnosisKind::Pdr => 1,
            DiagnosisKind::Dme => 2,
        }
    }
}

/// 某次检查时三种诊断是否成立
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisFlags {
    pub npdr: bool,
    pub pdr: bool,
    pub dme: bool,
}

impl DiagnosisFlags {
    pub fn set(&mut self, kind: DiagnosisKind, present: bool) {
        match kind {
            DiagnosisKind::Npdr => self.npdr = present,
            DiagnosisKind::Pdr => self.pdr = present,
            DiagnosisKind::Dme => self.dme = present,
        }
    }

    pub fn get(&self, kind: DiagnosisKind) -> bool {
        match kind {
            DiagnosisKind::Npdr => self.npdr,
            DiagnosisKind::Pdr => self.pdr,
            DiagnosisKind::Dme => self.dme,
        }
    }
}

/// 患者身份信息（DICOM 患者模块所需字段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientIdentity {
    /// FHIR Patient.id
    pub id: String,
    pub family_name: String,
    pub given_name: String,
    /// FHIR 格式出生日期 (yyyy-mm-dd)
    pub birth_date: String,
    /// FHIR administrative gender
    pub gender: String,
}

/// 与检查配对的诊断报告摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub conclusion: Option<String>,
}

/// 单次检查的临床上下文
///
/// 每个检查事件重新计算，不持久化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalContext {
    pub modality: Modality,
    pub patient: PatientIdentity,
    /// 就诊 id（不含 urn:uuid: 前缀）
    pub encounter_id: String,
    /// 就诊开始日期时间 (ISO-8601)
    pub encounter_date: String,
    pub diagnoses: DiagnosisFlags,
    /// 分期序号 0-4，未观察时为 0
    pub stage: u8,
    pub report: Option<ReportSummary>,
}

/// 检查中的单个影像实例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceContext {
    /// 实例在序列中的位置，连续性判定以此为槽位
    pub slot: usize,
    /// 所属序列的 uid
    pub series_uid: String,
    /// ImagingStudy.series.instance.uid
    pub uid: String,
    /// ImagingStudy.series.instance.number
    pub number: u32,
    pub laterality: Laterality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_from_code() {
        assert_eq!(Modality::from_procedure_code("700070005"), Some(Modality::Oct));
        assert_eq!(Modality::from_procedure_code("314971001"), Some(Modality::Fundus));
        assert_eq!(Modality::from_procedure_code("12345"), None);
        assert_eq!(Modality::Fundus.dicom_code(), "OP");
        assert_eq!(Modality::Oct.to_string(), "oct");
    }

    #[test]
    fn test_laterality_from_title() {
        assert_eq!(Laterality::from_title("Left eye").unwrap(), Laterality::Left);
        assert_eq!(Laterality::from_title("RIGHT EYE").unwrap(), Laterality::Right);
        assert!(matches!(
            Laterality::from_title("Both eyes"),
            Err(SynthError::InvalidLaterality(_))
        ));
    }

    #[test]
    fn test_diagnosis_flags() {
        let mut flags = DiagnosisFlags::default();
        flags.set(DiagnosisKind::Dme, true);
        assert!(flags.get(DiagnosisKind::Dme));
        assert!(!flags.get(DiagnosisKind::Pdr));
        assert_eq!(DiagnosisKind::from_condition_code(codes::PDR_CONDITION_CODE), Some(DiagnosisKind::Pdr));
    }
}
