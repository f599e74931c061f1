//! FHIR R4 资源视图
//!
//! 只建模引擎实际读取的字段。Bundle 与 entry 保留所有未建模字段，
//! 写回时不丢失上游生成器的内容。

use coherent_core::{Result, SynthError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 临床记录 bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bundle {
    /// 从 JSON 文本解析 bundle
    pub fn from_json(text: &str) -> Result<Self> {
        let bundle: Bundle = serde_json::from_str(text)?;
        if bundle.resource_type != "Bundle" {
            return Err(SynthError::MalformedResource(format!(
                "顶层资源类型应为 Bundle，实际为 {}",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }

    /// 序列化为带缩进的 JSON
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// bundle 条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BundleEntry {
    /// 资源类型
    pub fn resource_type(&self) -> Option<&str> {
        self.resource.get("resourceType").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(default)]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// 主编码
    pub fn primary_code(&self) -> Option<&str> {
        self.coding.first().and_then(|c| c.code.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default)]
    pub system: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    pub start: String,
}

/// 影像检查事件 (ImagingStudy)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagingStudy {
    pub id: String,
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    #[serde(default)]
    pub subject: Option<Reference>,
    pub encounter: Reference,
    pub started: String,
    #[serde(default)]
    pub procedure_code: Vec<CodeableConcept>,
    #[serde(default)]
    pub series: Vec<ImagingSeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagingSeries {
    pub uid: String,
    #[serde(default)]
    pub instance: Vec<ImagingInstance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagingInstance {
    pub uid: String,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub period: Period,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,
    pub code: CodeableConcept,
    #[serde(default)]
    pub encounter: Option<Reference>,
    #[serde(default)]
    pub onset_date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    pub code: CodeableConcept,
    #[serde(default)]
    pub encounter: Option<Reference>,
    #[serde(default)]
    pub value_codeable_concept: Option<CodeableConcept>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticReport {
    pub id: String,
    pub code: CodeableConcept,
    #[serde(default)]
    pub encounter: Option<Reference>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HumanName {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub name: Vec<HumanName>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// 将资源 JSON 解析为类型化视图，失败时标注资源类型
pub fn parse_resource<'a, T: Deserialize<'a>>(value: &'a Value, kind: &str) -> Result<T> {
    T::deserialize(value)
        .map_err(|e| SynthError::MalformedResource(format!("{} 资源格式错误: {}", kind, e)))
}

/// 读取 `field` (CodeableConcept 或其数组) 的主编码
pub fn primary_code<'a>(resource: &'a Value, field: &str) -> Option<&'a str> {
    let concept = match resource.get(field)? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    concept
        .get("coding")?
        .as_array()?
        .first()?
        .get("code")?
        .as_str()
}
