//! 通用工具函数

use crate::error::{Result, SynthError};
use chrono::{DateTime, NaiveDate};
use sha2::{Digest, Sha256};

/// 基于 UUID 派生 UID 的根 (ISO/IEC 9834-8)
const DERIVED_UID_ROOT: &str = "2.25";

/// FHIR 内部引用前缀
pub const URN_UUID_PREFIX: &str = "urn:uuid:";

/// FHIR OID 标识符前缀
pub const URN_OID_PREFIX: &str = "urn:oid:";

/// 由若干标识字符串确定性地派生 DICOM UID
///
/// 相同输入总是得到相同 UID，保证重复运行的输出可复现。
pub fn derive_dicom_uid(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    format!("{}.{}", DERIVED_UID_ROOT, u128::from_be_bytes(bytes))
}

/// 验证DICOM UID格式
pub fn is_valid_dicom_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= 64
        && uid.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !uid.starts_with('.')
        && !uid.ends_with('.')
        && !uid.contains("..")
}

/// FHIR 日期 (yyyy-mm-dd) 转 DICOM DA (yyyymmdd)
///
/// 只精确到年或年月的日期 (yyyy、yyyy-mm) 没有对应的 DA 取值，返回空串。
pub fn fhir_date_to_dicom(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default()
}

/// 将检查开始时间拆分为 DICOM DA 与 TM，保留原始时区下的墙上时间
pub fn started_to_dicom(started: &str) -> Result<(String, String)> {
    let parsed = DateTime::parse_from_rfc3339(started).map_err(|e| {
        SynthError::MalformedResource(format!("无法解析检查开始时间 {}: {}", started, e))
    })?;

    Ok((
        parsed.format("%Y%m%d").to_string(),
        parsed.format("%H%M%S%.6f").to_string(),
    ))
}

/// 去掉 urn:uuid: 前缀，得到资源 id
pub fn reference_id(reference: &str) -> &str {
    reference.strip_prefix(URN_UUID_PREFIX).unwrap_or(reference)
}

/// 由资源 id 构造 bundle 内部引用
pub fn uuid_reference(id: &str) -> String {
    format!("{}{}", URN_UUID_PREFIX, id)
}

/// 去掉 urn:oid: 前缀
pub fn strip_oid(value: &str) -> &str {
    value.strip_prefix(URN_OID_PREFIX).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_dicom_uid() {
        let uid = derive_dicom_uid(&["study", "instance-1"]);
        assert!(is_valid_dicom_uid(&uid));
        assert!(uid.starts_with("2.25."));
        assert_eq!(uid, derive_dicom_uid(&["study", "instance-1"]));
        assert_ne!(uid, derive_dicom_uid(&["study", "instance-2"]));
        // 分隔符避免拼接歧义
        assert_ne!(derive_dicom_uid(&["ab", "c"]), derive_dicom_uid(&["a", "bc"]));
    }

    #[test]
    fn test_is_valid_dicom_uid() {
        assert!(is_valid_dicom_uid("1.2.840.10008.5.1.4.1.1.4"));
        assert!(!is_valid_dicom_uid(""));
        assert!(!is_valid_dicom_uid("invalid.uid.with.letters"));
        assert!(!is_valid_dicom_uid("1..2"));
    }

    #[test]
    fn test_started_to_dicom() {
        let (date, time) = started_to_dicom("2019-03-04T10:15:30-05:00").unwrap();
        assert_eq!(date, "20190304");
        assert_eq!(time, "101530.000000");

        assert!(matches!(
            started_to_dicom("yesterday"),
            Err(SynthError::MalformedResource(_))
        ));
    }

    #[test]
    fn test_reference_helpers() {
        assert_eq!(reference_id("urn:uuid:abc"), "abc");
        assert_eq!(uuid_reference("abc"), "urn:uuid:abc");
        assert_eq!(strip_oid("urn:oid:1.2.3"), "1.2.3");
        assert_eq!(fhir_date_to_dicom("1970-01-02"), "19700102");
    }

    #[test]
    fn test_partial_fhir_date_has_no_dicom_form() {
        assert_eq!(fhir_date_to_dicom("1960"), "");
        assert_eq!(fhir_date_to_dicom("1960-02"), "");
        assert_eq!(fhir_date_to_dicom(""), "");
    }
}
