//! DICOM 元数据提取
//!
//! 从内存数据集或 Part 10 字节中提取一致性检查所需的字段。

use coherent_core::{Result, SynthError};
use dicom::object::{from_reader, InMemDicomObject};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use std::path::Path;
use tracing::debug;

/// Part 10 文件前导区长度
const PREAMBLE_LEN: usize = 128;

/// DICOM 解析器
pub struct DicomParser;

impl DicomParser {
    /// 解析 Part 10 字节 (含 128 字节前导区与 DICM 标记)
    pub fn parse_bytes(data: &[u8]) -> Result<ParsedImagingObject> {
        if data.len() < PREAMBLE_LEN + 4 || &data[PREAMBLE_LEN..PREAMBLE_LEN + 4] != b"DICM" {
            return Err(SynthError::Dicom("缺少 DICM 文件标记".to_string()));
        }

        let obj = from_reader(&data[PREAMBLE_LEN..])
            .map_err(|e| SynthError::Dicom(format!("无法解析DICOM数据: {}", e)))?;

        let mut parsed = Self::extract_metadata(&obj);
        parsed.transfer_syntax_uid = Some(obj.meta().transfer_syntax().trim_end_matches('\0').to_string());
        Ok(parsed)
    }

    /// 读取并解析 DICOM 文件
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedImagingObject> {
        let path = path.as_ref();
        debug!("解析DICOM文件: {:?}", path);
        let data = std::fs::read(path)?;
        Self::parse_bytes(&data)
    }

    /// 从数据集中提取元数据
    pub fn extract_metadata(obj: &InMemDicomObject) -> ParsedImagingObject {
        let frame_laterality = obj
            .element(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE)
            .ok()
            .and_then(|e| e.items())
            .and_then(|items| items.first())
            .and_then(|group| group.element(tags::FRAME_ANATOMY_SEQUENCE).ok())
            .and_then(|e| e.items())
            .and_then(|items| items.first())
            .and_then(|anatomy| string_element(anatomy, tags::FRAME_LATERALITY));

        ParsedImagingObject {
            patient_id: string_element(obj, tags::PATIENT_ID),
            patient_name: string_element(obj, tags::PATIENT_NAME),
            patient_birth_date: string_element(obj, tags::PATIENT_BIRTH_DATE),
            patient_sex: string_element(obj, tags::PATIENT_SEX),
            study_instance_uid: string_element(obj, tags::STUDY_INSTANCE_UID),
            study_date: string_element(obj, tags::STUDY_DATE),
            study_time: string_element(obj, tags::STUDY_TIME),
            acquisition_date: string_element(obj, tags::ACQUISITION_DATE),
            series_instance_uid: string_element(obj, tags::SERIES_INSTANCE_UID),
            modality: string_element(obj, tags::MODALITY),
            sop_instance_uid: string_element(obj, tags::SOP_INSTANCE_UID),
            sop_class_uid: string_element(obj, tags::SOP_CLASS_UID),
            instance_number: string_element(obj, tags::INSTANCE_NUMBER),
            image_laterality: string_element(obj, tags::IMAGE_LATERALITY),
            frame_laterality,
            synthetic_data: string_element(obj, tags::SYNTHETIC_DATA),
            photometric_interpretation: string_element(obj, tags::PHOTOMETRIC_INTERPRETATION),
            rows: integer_element(obj, tags::ROWS),
            columns: integer_element(obj, tags::COLUMNS),
            samples_per_pixel: integer_element(obj, tags::SAMPLES_PER_PIXEL),
            bits_allocated: integer_element(obj, tags::BITS_ALLOCATED),
            bits_stored: integer_element(obj, tags::BITS_STORED),
            high_bit: integer_element(obj, tags::HIGH_BIT),
            pixel_data_len: obj
                .element(tags::PIXEL_DATA)
                .ok()
                .and_then(|e| e.to_bytes().ok())
                .map(|bytes| bytes.len()),
            transfer_syntax_uid: None,
        }
    }
}

fn string_element(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let element = obj.element(tag).ok()?;
    let value = element.to_str().ok()?;
    Some(value.trim_end_matches(['\0', ' ']).to_string())
}

fn integer_element(obj: &InMemDicomObject, tag: Tag) -> Option<u32> {
    obj.element(tag).ok()?.to_int::<u32>().ok()
}

/// 提取出的影像对象元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedImagingObject {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_sex: Option<String>,

    pub study_instance_uid: Option<String>,
    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub acquisition_date: Option<String>,

    pub series_instance_uid: Option<String>,
    pub modality: Option<String>,

    pub sop_instance_uid: Option<String>,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<String>,
    pub image_laterality: Option<String>,
    /// OCT 共享功能组中的帧眼别
    pub frame_laterality: Option<String>,
    pub synthetic_data: Option<String>,

    pub photometric_interpretation: Option<String>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub samples_per_pixel: Option<u32>,
    pub bits_allocated: Option<u32>,
    pub bits_stored: Option<u32>,
    pub high_bit: Option<u32>,
    pub pixel_data_len: Option<usize>,

    /// 只有从文件字节解析时才有
    pub transfer_syntax_uid: Option<String>,
}

impl ParsedImagingObject {
    /// 图像尺寸 (行数, 列数)
    pub fn image_size(&self) -> Option<(u32, u32)> {
        Some((self.rows?, self.columns?))
    }

    /// 按尺寸与通道数应有的像素字节数，不含偶数补齐
    pub fn expected_pixel_len(&self) -> Option<usize> {
        let (rows, columns) = self.image_size()?;
        let samples = self.samples_per_pixel?;
        Some(rows as usize * columns as usize * samples as usize)
    }

    pub fn summary(&self) -> String {
        format!(
            "DICOM对象: 患者ID={}, 检查UID={}, 实例UID={}, 模态={}",
            self.patient_id.as_deref().unwrap_or("未知"),
            self.study_instance_uid.as_deref().unwrap_or("未知"),
            self.sop_instance_uid.as_deref().unwrap_or("未知"),
            self.modality.as_deref().unwrap_or("未知")
        )
    }
}
