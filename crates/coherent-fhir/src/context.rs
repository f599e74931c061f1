//! 临床上下文解析
//!
//! 对单次影像检查解析出选图与合成所需的全部临床状态：
//! 模态、就诊、三种诊断是否成立、分期序号、配对的诊断报告以及各实例的眼别。

use crate::resources::{parse_resource, Bundle, Condition, Encounter, Observation, Patient};
use crate::scanner::{ImagingEvent, ScannedBundle};
use coherent_core::codes;
use coherent_core::utils::reference_id;
use coherent_core::{
    ClinicalContext, DiagnosisFlags, DiagnosisKind, InstanceContext, Laterality, PatientIdentity,
    ReportSummary, Result, SynthError,
};
use serde_json::Value;
use tracing::debug;

/// 上下文解析器
///
/// 借用 bundle 与扫描结果，交叉引用统一经过扫描时建立的索引。
pub struct ContextResolver<'a> {
    bundle: &'a Bundle,
    scanned: &'a ScannedBundle,
}

impl<'a> ContextResolver<'a> {
    pub fn new(bundle: &'a Bundle, scanned: &'a ScannedBundle) -> Self {
        Self { bundle, scanned }
    }

    /// 解析第 `event` 个影像检查的临床上下文
    pub fn resolve(&self, event: usize) -> Result<ClinicalContext> {
        let imaging = self.scanned.imaging_events.get(event).ok_or_else(|| {
            SynthError::MissingReference(format!("影像检查序号越界: {}", event))
        })?;

        let encounter: Encounter = parse_resource(self.lookup(&imaging.study.encounter.reference)?, "Encounter")?;
        let patient = self.resolve_patient(imaging)?;

        let mut diagnoses = DiagnosisFlags::default();
        for kind in DiagnosisKind::ALL {
            diagnoses.set(
                kind,
                has_diagnosis(self.scanned.diagnosis(kind), &encounter.period.start, &encounter.id),
            );
        }

        let stage = get_stage(&self.scanned.stage_observations, &encounter.id)?;

        let report = self.scanned.report_for(event).map(|r| ReportSummary {
            id: r.id.clone(),
            conclusion: r.conclusion.clone(),
        });

        debug!(
            "检查 {} 上下文: 模态={}, 就诊={}, 分期={}, 诊断={:?}",
            imaging.event_id(),
            imaging.modality,
            encounter.id,
            stage,
            diagnoses
        );

        Ok(ClinicalContext {
            modality: imaging.modality,
            patient,
            encounter_id: encounter.id,
            encounter_date: encounter.period.start,
            diagnoses,
            stage,
            report,
        })
    }

    /// 按 fullUrl 查找资源，未命中说明 bundle 不一致
    pub fn lookup(&self, reference: &str) -> Result<&'a Value> {
        self.scanned
            .index
            .get(reference)
            .and_then(|i| self.bundle.entry.get(*i))
            .map(|e| &e.resource)
            .ok_or_else(|| SynthError::MissingReference(reference.to_string()))
    }

    fn resolve_patient(&self, imaging: &ImagingEvent) -> Result<PatientIdentity> {
        let resource = match &imaging.study.subject {
            Some(subject) => self.lookup(&subject.reference)?,
            None => self
                .scanned
                .patient_entry
                .and_then(|i| self.bundle.entry.get(i))
                .map(|e| &e.resource)
                .ok_or_else(|| SynthError::MissingReference("Patient".to_string()))?,
        };
        let patient: Patient = parse_resource(resource, "Patient")?;

        let name = patient.name.first();
        Ok(PatientIdentity {
            family_name: name.and_then(|n| n.family.clone()).unwrap_or_default(),
            given_name: name.and_then(|n| n.given.first().cloned()).unwrap_or_default(),
            birth_date: patient.birth_date.unwrap_or_default(),
            gender: patient.gender.unwrap_or_default(),
            id: patient.id,
        })
    }
}

/// 展开检查中的全部影像实例，每个实例携带自己的眼别
pub fn resolve_instances(imaging: &ImagingEvent) -> Result<Vec<InstanceContext>> {
    let mut instances = Vec::new();

    for series in &imaging.study.series {
        for instance in &series.instance {
            let slot = instances.len();
            let title = instance.title.as_deref().unwrap_or("");
            instances.push(InstanceContext {
                slot,
                series_uid: series.uid.clone(),
                uid: instance.uid.clone(),
                number: instance.number.unwrap_or(slot as u32 + 1),
                laterality: Laterality::from_title(title)?,
            });
        }
    }

    Ok(instances)
}

/// 诊断在本次检查时是否成立
///
/// 在本次就诊中诊断，或发病日期严格早于就诊日期。日期均为定宽 ISO-8601，
/// 直接按字符串比较。
pub fn has_diagnosis(condition: Option<&Condition>, encounter_date: &str, encounter_id: &str) -> bool {
    let Some(condition) = condition else {
        return false;
    };

    let same_encounter = condition
        .encounter
        .as_ref()
        .map(|r| reference_id(&r.reference) == encounter_id)
        .unwrap_or(false);
    if same_encounter {
        return true;
    }

    condition
        .onset_date_time
        .as_deref()
        .map(|onset| onset < encounter_date)
        .unwrap_or(false)
}

/// 本次就诊的分期序号，没有分期观察时为 0，未知取值编码为致命错误
pub fn get_stage(observations: &[Observation], encounter_id: &str) -> Result<u8> {
    let observation = observations.iter().find(|o| {
        o.encounter
            .as_ref()
            .map(|r| reference_id(&r.reference) == encounter_id)
            .unwrap_or(false)
    });

    let Some(observation) = observation else {
        return Ok(0);
    };

    let code = observation
        .value_codeable_concept
        .as_ref()
        .and_then(|v| v.primary_code())
        .ok_or_else(|| {
            SynthError::MalformedResource(format!("分期观察 {} 缺少 valueCodeableConcept", observation.id))
        })?;

    codes::stage_ordinal(code).ok_or_else(|| SynthError::UnknownStageCode(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tests::{bundle_of, imaging_study};
    use crate::scanner::BundleScanner;
    use serde_json::json;

    fn condition(encounter: &str, onset: &str) -> Condition {
        serde_json::from_value(json!({
            "id": "c1",
            "code": { "coding": [{ "code": codes::DME_CONDITION_CODE }] },
            "encounter": { "reference": format!("urn:uuid:{}", encounter) },
            "onsetDateTime": onset
        }))
        .unwrap()
    }

    fn stage_observation(encounter: &str, value: &str) -> Observation {
        serde_json::from_value(json!({
            "id": "o1",
            "code": { "coding": [{ "code": codes::DR_STAGE_OBS_CODE }] },
            "encounter": { "reference": format!("urn:uuid:{}", encounter) },
            "valueCodeableConcept": { "coding": [{ "code": value }] }
        }))
        .unwrap()
    }

    #[test]
    fn test_has_diagnosis_temporal_rule() {
        let earlier = condition("other", "2020-01-01");
        assert!(has_diagnosis(Some(&earlier), "2020-06-01", "e1"));

        let later = condition("other", "2021-01-01");
        assert!(!has_diagnosis(Some(&later), "2020-06-01", "e1"));

        // 当次就诊诊断，即使发病日期更晚
        let same_visit = condition("e1", "2021-01-01");
        assert!(has_diagnosis(Some(&same_visit), "2020-06-01", "e1"));

        // 同一天不算“更早”
        let same_day = condition("other", "2020-06-01");
        assert!(!has_diagnosis(Some(&same_day), "2020-06-01", "e1"));

        assert!(!has_diagnosis(None, "2020-06-01", "e1"));
    }

    #[test]
    fn test_get_stage() {
        let observations = vec![stage_observation("e1", "LA18645-4"), stage_observation("e2", "LA18648-8")];
        assert_eq!(get_stage(&observations, "e1").unwrap(), 2);
        assert_eq!(get_stage(&observations, "e2").unwrap(), 4);
        assert_eq!(get_stage(&observations, "e3").unwrap(), 0);
    }

    #[test]
    fn test_unknown_stage_code_is_fatal() {
        let observations = vec![stage_observation("e1", "LA00000-0")];
        assert!(matches!(
            get_stage(&observations, "e1"),
            Err(SynthError::UnknownStageCode(code)) if code == "LA00000-0"
        ));
    }

    #[test]
    fn test_resolve_context() {
        let bundle = bundle_of(vec![
            json!({
                "resourceType": "Patient", "id": "p1",
                "name": [{ "family": "Smith", "given": ["Jane", "Q"] }],
                "birthDate": "1960-02-03", "gender": "female"
            }),
            json!({ "resourceType": "Encounter", "id": "e1", "period": { "start": "2020-06-01T09:00:00Z" } }),
            imaging_study("s1", codes::FUNDUS_PROCEDURE_CODE, "e1", "2020-06-01T09:10:00Z"),
            json!({
                "resourceType": "Condition", "id": "c1",
                "code": { "coding": [{ "code": codes::NPDR_CONDITION_CODE }] },
                "encounter": { "reference": "urn:uuid:e0" },
                "onsetDateTime": "2019-01-01T00:00:00Z"
            }),
            json!({
                "resourceType": "Observation", "id": "o1",
                "code": { "coding": [{ "code": codes::DR_STAGE_OBS_CODE }] },
                "encounter": { "reference": "urn:uuid:e1" },
                "valueCodeableConcept": { "coding": [{ "code": "LA18644-7" }] }
            }),
        ]);
        let scanned = BundleScanner::scan(&bundle).unwrap();
        let resolver = ContextResolver::new(&bundle, &scanned);

        let context = resolver.resolve(0).unwrap();
        assert_eq!(context.modality, coherent_core::Modality::Fundus);
        assert_eq!(context.encounter_id, "e1");
        assert_eq!(context.stage, 1);
        assert!(context.diagnoses.npdr);
        assert!(!context.diagnoses.dme);
        assert_eq!(context.patient.family_name, "Smith");
        assert_eq!(context.patient.given_name, "Jane");
        assert!(context.report.is_none());

        let instances = resolve_instances(&scanned.imaging_events[0]).unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].laterality, Laterality::Left);
        assert_eq!(instances[1].laterality, Laterality::Right);
        assert_eq!(instances[1].slot, 1);
        assert_eq!(instances[1].number, 2);
    }

    #[test]
    fn test_missing_encounter_is_fatal() {
        let bundle = bundle_of(vec![
            json!({ "resourceType": "Patient", "id": "p1" }),
            imaging_study("s1", codes::FUNDUS_PROCEDURE_CODE, "missing", "2020-06-01T09:10:00Z"),
        ]);
        let scanned = BundleScanner::scan(&bundle).unwrap();
        let resolver = ContextResolver::new(&bundle, &scanned);
        assert!(matches!(resolver.resolve(0), Err(SynthError::MissingReference(r)) if r == "urn:uuid:missing"));
    }

    #[test]
    fn test_unrecognized_laterality_is_fatal() {
        let mut study = imaging_study("s1", codes::OCT_PROCEDURE_CODE, "e1", "2020-06-01T09:10:00Z");
        study["series"][0]["instance"][0]["title"] = json!("Both eyes");
        let bundle = bundle_of(vec![study]);
        let scanned = BundleScanner::scan(&bundle).unwrap();
        assert!(matches!(
            resolve_instances(&scanned.imaging_events[0]),
            Err(SynthError::InvalidLaterality(_))
        ));
    }
}
