//! Bundle 扫描
//!
//! 单次遍历 bundle 条目，按类型和编码分桶，并建立 fullUrl → 条目 的索引。

use crate::resources::{
    parse_resource, primary_code, Bundle, Condition, DiagnosticReport, ImagingStudy, Observation,
};
use coherent_core::codes;
use coherent_core::utils::reference_id;
use coherent_core::{DiagnosisKind, Modality, Result};
use std::collections::HashMap;
use tracing::debug;

/// bundle 中的一次影像检查
#[derive(Debug, Clone)]
pub struct ImagingEvent {
    pub modality: Modality,
    pub study: ImagingStudy,
}

impl ImagingEvent {
    /// 检查标识，用于输出文件命名
    pub fn event_id(&self) -> &str {
        self.study
            .identifier
            .first()
            .map(|i| coherent_core::utils::strip_oid(&i.value))
            .unwrap_or(&self.study.id)
    }

    /// 就诊 id
    pub fn encounter_id(&self) -> &str {
        reference_id(&self.study.encounter.reference)
    }
}

/// 扫描结果
#[derive(Debug, Default)]
pub struct ScannedBundle {
    /// 按出现顺序排列的影像检查
    pub imaging_events: Vec<ImagingEvent>,
    /// 按出现顺序排列的 OCT 诊断报告
    pub reports: Vec<DiagnosticReport>,
    /// 与 imaging_events 对齐的报告配对，值为 reports 中的位置
    pub report_slots: Vec<Option<usize>>,
    /// 三槽诊断表，同类型后出现者覆盖先出现者
    pub diagnoses: [Option<Condition>; 3],
    /// 分期观察
    pub stage_observations: Vec<Observation>,
    /// fullUrl → 条目位置
    pub index: HashMap<String, usize>,
    /// 第一个 Patient 条目
    pub patient_entry: Option<usize>,
}

impl ScannedBundle {
    /// 没有影像检查的 bundle 直接跳过
    pub fn has_imaging(&self) -> bool {
        !self.imaging_events.is_empty()
    }

    pub fn diagnosis(&self, kind: DiagnosisKind) -> Option<&Condition> {
        self.diagnoses[kind.slot()].as_ref()
    }

    /// 与检查配对的诊断报告
    pub fn report_for(&self, event: usize) -> Option<&DiagnosticReport> {
        self.report_slots
            .get(event)
            .copied()
            .flatten()
            .and_then(|i| self.reports.get(i))
    }

    /// 按检查开始时间排序后的处理顺序，时间相同时保持出现顺序
    pub fn processing_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.imaging_events.len()).collect();
        order.sort_by(|a, b| {
            self.imaging_events[*a]
                .study
                .started
                .cmp(&self.imaging_events[*b].study.started)
        });
        order
    }
}

/// Bundle 扫描器
pub struct BundleScanner;

impl BundleScanner {
    /// 扫描 bundle，不修改 bundle
    pub fn scan(bundle: &Bundle) -> Result<ScannedBundle> {
        let mut scanned = ScannedBundle::default();

        for (i, entry) in bundle.entry.iter().enumerate() {
            scanned.index.insert(entry.full_url.clone(), i);
            let resource = &entry.resource;

            match entry.resource_type() {
                Some("Patient") => {
                    if scanned.patient_entry.is_none() {
                        scanned.patient_entry = Some(i);
                    }
                }
                Some("ImagingStudy") => {
                    let modality = primary_code(resource, "procedureCode")
                        .and_then(Modality::from_procedure_code);
                    if let Some(modality) = modality {
                        let study: ImagingStudy = parse_resource(resource, "ImagingStudy")?;
                        scanned.imaging_events.push(ImagingEvent { modality, study });
                    }
                }
                Some("DiagnosticReport") => {
                    if primary_code(resource, "code") == Some(codes::OCT_DIAGREPORT_CODE) {
                        scanned.reports.push(parse_resource(resource, "DiagnosticReport")?);
                    }
                }
                Some("Condition") => {
                    let kind = primary_code(resource, "code").and_then(DiagnosisKind::from_condition_code);
                    if let Some(kind) = kind {
                        scanned.diagnoses[kind.slot()] = Some(parse_resource(resource, "Condition")?);
                    }
                }
                Some("Observation") => {
                    if primary_code(resource, "code") == Some(codes::DR_STAGE_OBS_CODE) {
                        scanned.stage_observations.push(parse_resource(resource, "Observation")?);
                    }
                }
                _ => {}
            }
        }

        scanned.report_slots = Self::pair_reports(&scanned.imaging_events, &scanned.reports);

        debug!(
            "扫描完成: {} 个影像检查, {} 个诊断报告, {} 个分期观察",
            scanned.imaging_events.len(),
            scanned.reports.len(),
            scanned.stage_observations.len()
        );

        Ok(scanned)
    }

    /// OCT 检查与同一就诊中第一个未配对的 OCT 报告配对，眼底照相不配对
    fn pair_reports(events: &[ImagingEvent], reports: &[DiagnosticReport]) -> Vec<Option<usize>> {
        let mut claimed = vec![false; reports.len()];

        events
            .iter()
            .map(|event| {
                if event.modality != Modality::Oct {
                    return None;
                }
                let found = reports.iter().enumerate().position(|(i, report)| {
                    !claimed[i]
                        && report
                            .encounter
                            .as_ref()
                            .map(|r| reference_id(&r.reference) == event.encounter_id())
                            .unwrap_or(false)
                });
                if let Some(i) = found {
                    claimed[i] = true;
                }
                found
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub fn entry(resource: Value) -> Value {
        let id = resource["id"].as_str().unwrap().to_string();
        json!({ "fullUrl": format!("urn:uuid:{}", id), "resource": resource })
    }

    pub fn imaging_study(id: &str, code: &str, encounter: &str, started: &str) -> Value {
        let n: u32 = id.bytes().map(u32::from).sum();
        json!({
            "resourceType": "ImagingStudy",
            "id": id,
            "identifier": [{ "system": "urn:ietf:rfc:3986", "value": format!("urn:oid:1.2.840.99999999.{}", n) }],
            "subject": { "reference": "urn:uuid:p1" },
            "encounter": { "reference": format!("urn:uuid:{}", encounter) },
            "started": started,
            "procedureCode": [{ "coding": [{ "system": "http://snomed.info/sct", "code": code }] }],
            "series": [{
                "uid": format!("1.2.840.99999999.{}.1", n),
                "instance": [
                    { "uid": format!("1.2.840.99999999.{}.1.1", n), "number": 1, "title": "Left eye" },
                    { "uid": format!("1.2.840.99999999.{}.1.2", n), "number": 2, "title": "Right eye" }
                ]
            }]
        })
    }

    pub fn bundle_of(resources: Vec<Value>) -> Bundle {
        let entries: Vec<Value> = resources.into_iter().map(entry).collect();
        serde_json::from_value(json!({ "resourceType": "Bundle", "type": "transaction", "entry": entries }))
            .unwrap()
    }

    fn condition(id: &str, code: &str) -> Value {
        json!({
            "resourceType": "Condition",
            "id": id,
            "code": { "coding": [{ "code": code }] },
            "encounter": { "reference": "urn:uuid:e1" },
            "onsetDateTime": "2020-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_scan_classifies_resources() {
        let bundle = bundle_of(vec![
            json!({ "resourceType": "Patient", "id": "p1" }),
            json!({ "resourceType": "Encounter", "id": "e1", "period": { "start": "2020-06-01T09:00:00Z" } }),
            imaging_study("s1", codes::FUNDUS_PROCEDURE_CODE, "e1", "2020-06-01T09:10:00Z"),
            imaging_study("s2", codes::OCT_PROCEDURE_CODE, "e1", "2020-06-01T09:20:00Z"),
            imaging_study("s3", "399208008", "e1", "2020-06-01T09:30:00Z"),
            json!({
                "resourceType": "DiagnosticReport", "id": "r1",
                "code": { "coding": [{ "code": codes::OCT_DIAGREPORT_CODE }] },
                "encounter": { "reference": "urn:uuid:e1" }
            }),
            condition("c1", codes::DME_CONDITION_CODE),
            condition("c2", "44054006"),
            json!({
                "resourceType": "Observation", "id": "o1",
                "code": { "coding": [{ "code": codes::DR_STAGE_OBS_CODE }] },
                "encounter": { "reference": "urn:uuid:e1" },
                "valueCodeableConcept": { "coding": [{ "code": "LA18645-4" }] }
            }),
        ]);

        let scanned = BundleScanner::scan(&bundle).unwrap();
        assert!(scanned.has_imaging());
        assert_eq!(scanned.imaging_events.len(), 2);
        assert_eq!(scanned.imaging_events[0].modality, Modality::Fundus);
        assert_eq!(scanned.imaging_events[1].modality, Modality::Oct);
        assert_eq!(scanned.reports.len(), 1);
        assert_eq!(scanned.stage_observations.len(), 1);
        assert!(scanned.diagnosis(DiagnosisKind::Dme).is_some());
        assert!(scanned.diagnosis(DiagnosisKind::Npdr).is_none());
        assert_eq!(scanned.index.len(), 9);
        assert_eq!(scanned.patient_entry, Some(0));

        // 报告只与 OCT 检查配对
        assert!(scanned.report_for(0).is_none());
        assert_eq!(scanned.report_for(1).map(|r| r.id.as_str()), Some("r1"));
    }

    #[test]
    fn test_last_condition_of_a_kind_wins() {
        let mut later = condition("c2", codes::PDR_CONDITION_CODE);
        later["onsetDateTime"] = json!("2021-05-05T00:00:00Z");
        let bundle = bundle_of(vec![condition("c1", codes::PDR_CONDITION_CODE), later]);

        let scanned = BundleScanner::scan(&bundle).unwrap();
        assert_eq!(scanned.diagnosis(DiagnosisKind::Pdr).map(|c| c.id.as_str()), Some("c2"));
    }

    #[test]
    fn test_bundle_without_imaging() {
        let bundle = bundle_of(vec![json!({ "resourceType": "Patient", "id": "p1" })]);
        let scanned = BundleScanner::scan(&bundle).unwrap();
        assert!(!scanned.has_imaging());
    }

    #[test]
    fn test_malformed_imaging_study_is_fatal() {
        let mut study = imaging_study("s1", codes::FUNDUS_PROCEDURE_CODE, "e1", "2020-06-01T09:10:00Z");
        study.as_object_mut().unwrap().remove("encounter");
        let bundle = bundle_of(vec![study]);
        assert!(matches!(
            BundleScanner::scan(&bundle),
            Err(coherent_core::SynthError::MalformedResource(_))
        ));
    }

    #[test]
    fn test_processing_order_follows_start_time() {
        let bundle = bundle_of(vec![
            imaging_study("late", codes::FUNDUS_PROCEDURE_CODE, "e2", "2021-01-01T00:00:00Z"),
            imaging_study("early", codes::FUNDUS_PROCEDURE_CODE, "e1", "2020-01-01T00:00:00Z"),
        ]);
        let scanned = BundleScanner::scan(&bundle).unwrap();
        assert_eq!(scanned.processing_order(), vec![1, 0]);
    }
}
