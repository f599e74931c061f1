//! 临床编码表
//!
//! 上游合成人群生成器使用的固定编码。编码表与生成器不同步时属于致命错误。

/// 光学相干断层扫描 (OCT) 检查的 SNOMED 编码
pub const OCT_PROCEDURE_CODE: &str = "700070005";

/// 眼底照相检查的 SNOMED 编码
pub const FUNDUS_PROCEDURE_CODE: &str = "314971001";

/// OCT 诊断报告的 LOINC 编码
pub const OCT_DIAGREPORT_CODE: &str = "87674-8";

/// 非增殖性糖尿病视网膜病变
pub const NPDR_CONDITION_CODE: &str = "1551000119108";

/// 增殖性糖尿病视网膜病变
pub const PDR_CONDITION_CODE: &str = "1501000119109";

/// 糖尿病黄斑水肿
pub const DME_CONDITION_CODE: &str = "97331000119101";

/// 糖尿病视网膜病变分期观察 (左眼编码，模型中双眼一致)
pub const DR_STAGE_OBS_CODE: &str = "71490-7";

/// 分期观察取值，按序号 0-4 排列
pub const DR_STAGE_VALUE_CODES: [&str; 5] = [
    "LA18643-9", // 0
    "LA18644-7", // 1
    "LA18645-4", // 2
    "LA18646-2", // 3
    "LA18648-8", // 4
];

/// 文件名中包含这些标记的 bundle 为机构/人员信息，不参与处理
pub const ADMINISTRATIVE_MARKERS: [&str; 2] = ["hospitalInformation", "practitionerInformation"];

/// 查找分期取值编码对应的序号
pub fn stage_ordinal(code: &str) -> Option<u8> {
    DR_STAGE_VALUE_CODES
        .iter()
        .position(|c| *c == code)
        .map(|i| i as u8)
}
