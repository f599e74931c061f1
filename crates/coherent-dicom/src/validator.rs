//! DICOM 一致性验证
//!
//! 检查合成对象的内部一致性 (UID、日期、尺寸与像素长度)，
//! 以及与临床记录的交叉一致性 (患者、检查日期、实例号、眼别)。

use crate::parser::ParsedImagingObject;
use crate::templates;
use coherent_core::utils::{fhir_date_to_dicom, is_valid_dicom_uid, started_to_dicom};
use coherent_core::{ClinicalContext, InstanceContext, Modality};
use tracing::{debug, warn};

/// DICOM 数据验证器
#[derive(Debug, Default)]
pub struct DicomValidator;

impl DicomValidator {
    pub fn new() -> Self {
        Self
    }

    /// 内部一致性
    pub fn validate_dicom_object(&self, obj: &ParsedImagingObject) -> ValidationResult {
        let mut result = ValidationResult::new();

        self.validate_required_uids(obj, &mut result);
        self.validate_patient_info(obj, &mut result);
        self.validate_dates(obj, &mut result);
        self.validate_image_info(obj, &mut result);

        match obj.synthetic_data.as_deref() {
            Some("YES") => {}
            other => result.add_error(format!("SyntheticData 应为 YES，实际为 {:?}", other)),
        }

        if let Some(uid) = &obj.transfer_syntax_uid {
            if uid != templates::EXPLICIT_VR_LITTLE_ENDIAN {
                result.add_error(format!("不支持的传输语法: {}", uid));
            }
        }

        debug!("{}: {}", obj.summary(), result.get_summary());
        result
    }

    /// 与临床记录的交叉一致性
    pub fn validate_against_record(
        &self,
        obj: &ParsedImagingObject,
        context: &ClinicalContext,
        instance: &InstanceContext,
        started: &str,
    ) -> ValidationResult {
        let mut result = self.validate_dicom_object(obj);

        expect_field(&mut result, "患者ID", obj.patient_id.as_deref(), &context.patient.id);
        expect_field(
            &mut result,
            "患者出生日期",
            Some(obj.patient_birth_date.as_deref().unwrap_or("")),
            &fhir_date_to_dicom(&context.patient.birth_date),
        );
        expect_field(&mut result, "模态", obj.modality.as_deref(), context.modality.dicom_code());
        expect_field(&mut result, "SOP类UID", obj.sop_class_uid.as_deref(), templates::sop_class_uid(context.modality));
        expect_field(&mut result, "实例号", obj.instance_number.as_deref(), &instance.number.to_string());
        expect_field(&mut result, "眼别", obj.image_laterality.as_deref(), instance.laterality.dicom_code());

        if context.modality == Modality::Oct {
            expect_field(&mut result, "帧眼别", obj.frame_laterality.as_deref(), instance.laterality.dicom_code());
        }

        match started_to_dicom(started) {
            Ok((date, _)) => {
                expect_field(&mut result, "检查日期", obj.study_date.as_deref(), &date);
                expect_field(&mut result, "采集日期", obj.acquisition_date.as_deref(), &date);
            }
            Err(e) => result.add_error(e.to_string()),
        }

        let expected_samples = match context.modality {
            Modality::Fundus => 3,
            Modality::Oct => 1,
        };
        if obj.samples_per_pixel != Some(expected_samples) {
            result.add_error(format!(
                "{} 对象的每像素样本数应为 {}，实际为 {:?}",
                context.modality, expected_samples, obj.samples_per_pixel
            ));
        }

        if !result.is_valid {
            warn!("影像对象与临床记录不一致: {}", result.errors.join("; "));
        }
        result
    }

    fn validate_required_uids(&self, obj: &ParsedImagingObject, result: &mut ValidationResult) {
        let required_uids = [
            ("SOP类UID", obj.sop_class_uid.as_deref()),
            ("SOP实例UID", obj.sop_instance_uid.as_deref()),
            ("检查实例UID", obj.study_instance_uid.as_deref()),
            ("序列实例UID", obj.series_instance_uid.as_deref()),
        ];

        for (name, uid) in required_uids {
            match uid {
                Some(uid) if is_valid_dicom_uid(uid) => {}
                Some(uid) => result.add_error(format!("{}格式无效: {}", name, uid)),
                None => result.add_error(format!("{}缺失", name)),
            }
        }

        if obj.study_instance_uid.is_some() && obj.study_instance_uid == obj.sop_instance_uid {
            result.add_warning("检查实例UID与SOP实例UID相同".to_string());
        }
    }

    fn validate_patient_info(&self, obj: &ParsedImagingObject, result: &mut ValidationResult) {
        match obj.patient_id.as_deref() {
            Some(id) if !id.trim().is_empty() => {
                if id.len() > 64 {
                    result.add_warning("患者ID长度超过64字符".to_string());
                }
            }
            Some(_) => result.add_warning("患者ID为空".to_string()),
            None => result.add_error("患者ID缺失".to_string()),
        }

        if let Some(sex) = obj.patient_sex.as_deref() {
            if !["M", "F", "O", ""].contains(&sex) {
                result.add_warning(format!("患者性别值无效: {}，应为M/F/O", sex));
            }
        }
    }

    fn validate_dates(&self, obj: &ParsedImagingObject, result: &mut ValidationResult) {
        let dates = [
            ("患者出生日期", obj.patient_birth_date.as_deref()),
            ("检查日期", obj.study_date.as_deref()),
            ("采集日期", obj.acquisition_date.as_deref()),
        ];
        for (name, value) in dates {
            if let Some(date) = value {
                if !date.is_empty() && !is_valid_dicom_date(date) {
                    result.add_error(format!("{}格式无效: {}", name, date));
                }
            }
        }

        if let Some(time) = obj.study_time.as_deref() {
            if !is_valid_dicom_time(time) {
                result.add_error(format!("检查时间格式无效: {}", time));
            }
        }
    }

    fn validate_image_info(&self, obj: &ParsedImagingObject, result: &mut ValidationResult) {
        match obj.image_size() {
            Some((rows, columns)) if rows == 0 || columns == 0 => {
                result.add_error("图像尺寸必须为正数".to_string());
            }
            Some(_) => {}
            None => result.add_error("图像尺寸信息缺失".to_string()),
        }

        if let (Some(allocated), Some(stored), Some(high_bit)) = (obj.bits_allocated, obj.bits_stored, obj.high_bit) {
            if stored > allocated {
                result.add_error("存储位数不能大于分配位数".to_string());
            }
            if high_bit + 1 != stored {
                result.add_error("最高位与存储位数不匹配".to_string());
            }
        }

        match (obj.photometric_interpretation.as_deref(), obj.samples_per_pixel) {
            (Some("RGB"), Some(3)) | (Some("MONOCHROME2"), Some(1)) => {}
            (photometric, samples) => result.add_error(format!(
                "光度解释 {:?} 与每像素样本数 {:?} 不匹配",
                photometric, samples
            )),
        }

        if let (Some(expected), Some(actual)) = (obj.expected_pixel_len(), obj.pixel_data_len) {
            // 奇数长度补齐一个字节
            if actual != expected + expected % 2 {
                result.add_error(format!("像素数据长度 {} 与图像尺寸不符，应为 {}", actual, expected));
            }
        } else {
            result.add_error("像素数据缺失".to_string());
        }
    }
}

fn expect_field(result: &mut ValidationResult, name: &str, actual: Option<&str>, expected: &str) {
    if actual != Some(expected) {
        result.add_error(format!("{}不一致: 记录为 {}，对象中为 {:?}", name, expected, actual));
    }
}

/// DICOM 日期 (YYYYMMDD)
pub fn is_valid_dicom_date(date: &str) -> bool {
    date.len() == 8
        && date.chars().all(|c| c.is_ascii_digit())
        && chrono::NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
}

/// DICOM 时间 (HHMMSS.FFFFFF)，允许省略分秒与小数部分
pub fn is_valid_dicom_time(time: &str) -> bool {
    let (whole, fraction) = match time.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (time, None),
    };

    if !matches!(whole.len(), 2 | 4 | 6) || !whole.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || fraction.len() > 6 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    let field = |range: std::ops::Range<usize>| whole.get(range).and_then(|s| s.parse::<u32>().ok());
    let hour_ok = field(0..2).map_or(false, |h| h <= 23);
    let minute_ok = field(2..4).map_or(true, |m| m <= 59);
    // 允许闰秒
    let second_ok = field(4..6).map_or(true, |s| s <= 60);

    hour_ok && minute_ok && second_ok
}

/// 验证结果
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 获取验证报告摘要
    pub fn get_summary(&self) -> String {
        if self.is_valid {
            if self.has_warnings() {
                format!("验证通过，但有 {} 个警告", self.warnings.len())
            } else {
                "验证完全通过".to_string()
            }
        } else {
            format!("验证失败：{} 个错误，{} 个警告", self.errors.len(), self.warnings.len())
        }
    }
}
