//! Media 资源构建
//!
//! 将选中的影像包装为引用检查、患者和就诊的 Media 资源，追加到 bundle。

use crate::resources::BundleEntry;
use crate::scanner::ImagingEvent;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use coherent_core::utils::uuid_reference;
use coherent_core::{ClinicalContext, InstanceContext, Laterality, Result};
use rand::Rng;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// 内联影像的内容类型
pub const MEDIA_CONTENT_TYPE: &str = "image/jpeg";

const DICOM_DCM_URI: &str = "http://dicom.nema.org/resources/ontology/DCM";
const SNOMED_URI: &str = "http://snomed.info/sct";

/// 编码后的影像
#[derive(Debug, Clone, Copy)]
pub struct MediaPayload<'a> {
    /// JPEG 编码字节，与输出目录中的原始影像相同
    pub jpeg: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Media 构建器
pub struct MediaEmitter;

impl MediaEmitter {
    /// 构建 Media 资源
    ///
    /// id 取自注入的随机源，固定种子时整个 bundle 输出可复现。
    pub fn build_media<R: Rng + ?Sized>(
        imaging: &ImagingEvent,
        context: &ClinicalContext,
        instance: &InstanceContext,
        payload: &MediaPayload<'_>,
        rng: &mut R,
    ) -> Result<Value> {
        let id: Uuid = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
        let (site_code, site_display) = match instance.laterality {
            Laterality::Left => ("8966001", "Left eye structure"),
            Laterality::Right => ("18944008", "Right eye structure"),
        };

        Ok(json!({
            "resourceType": "Media",
            "id": id.to_string(),
            "identifier": serde_json::to_value(&imaging.study.identifier)?,
            "partOf": [{ "reference": uuid_reference(&imaging.study.id) }],
            "status": "completed",
            "modality": {
                "coding": [{
                    "system": DICOM_DCM_URI,
                    "code": context.modality.dicom_code(),
                    "display": context.modality.display()
                }]
            },
            "subject": { "reference": uuid_reference(&context.patient.id) },
            "encounter": { "reference": uuid_reference(&context.encounter_id) },
            "bodySite": {
                "coding": [{ "system": SNOMED_URI, "code": site_code, "display": site_display }]
            },
            "height": payload.height,
            "width": payload.width,
            "frames": 1,
            "content": {
                "contentType": MEDIA_CONTENT_TYPE,
                "data": STANDARD.encode(payload.jpeg)
            }
        }))
    }

    /// 包装为带创建意图的 bundle 条目
    pub fn wrap_in_entry(resource: Value) -> BundleEntry {
        let id = resource.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("Media")
            .to_string();

        BundleEntry {
            full_url: uuid_reference(&id),
            resource,
            request: Some(json!({ "method": "POST", "url": resource_type })),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{resolve_instances, ContextResolver};
    use crate::resources::Bundle;
    use crate::scanner::tests::{bundle_of, imaging_study};
    use crate::scanner::BundleScanner;
    use coherent_core::codes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> Bundle {
        bundle_of(vec![
            json!({ "resourceType": "Patient", "id": "p1" }),
            json!({ "resourceType": "Encounter", "id": "e1", "period": { "start": "2020-06-01T09:00:00Z" } }),
            imaging_study("s1", codes::FUNDUS_PROCEDURE_CODE, "e1", "2020-06-01T09:10:00Z"),
        ])
    }

    #[test]
    fn test_media_entry() {
        let bundle = fixture();
        let scanned = BundleScanner::scan(&bundle).unwrap();
        let context = ContextResolver::new(&bundle, &scanned).resolve(0).unwrap();
        let imaging = &scanned.imaging_events[0];
        let instance = &resolve_instances(imaging).unwrap()[1];
        let payload = MediaPayload { jpeg: b"\xff\xd8fake", width: 4, height: 3 };
        let mut rng = StdRng::seed_from_u64(7);

        let media = MediaEmitter::build_media(imaging, &context, instance, &payload, &mut rng).unwrap();
        let id = media["id"].as_str().unwrap().to_string();
        let entry = MediaEmitter::wrap_in_entry(media);
        assert_eq!(entry.full_url, format!("urn:uuid:{}", id));
        assert_eq!(entry.request.as_ref().unwrap()["method"], "POST");
        assert_eq!(entry.request.as_ref().unwrap()["url"], "Media");

        let media = &entry.resource;
        assert_eq!(media["resourceType"], "Media");
        assert_eq!(media["partOf"][0]["reference"], "urn:uuid:s1");
        assert_eq!(media["subject"]["reference"], "urn:uuid:p1");
        assert_eq!(media["encounter"]["reference"], "urn:uuid:e1");
        assert_eq!(media["modality"]["coding"][0]["code"], "OP");
        assert_eq!(media["bodySite"]["coding"][0]["code"], "18944008");
        assert_eq!(media["content"]["contentType"], "image/jpeg");
        assert_eq!(media["content"]["data"], STANDARD.encode(b"\xff\xd8fake"));
        assert_eq!(media["identifier"], serde_json::to_value(&imaging.study.identifier).unwrap());
    }

    #[test]
    fn test_media_id_follows_seed() {
        let bundle = fixture();
        let scanned = BundleScanner::scan(&bundle).unwrap();
        let context = ContextResolver::new(&bundle, &scanned).resolve(0).unwrap();
        let imaging = &scanned.imaging_events[0];
        let instance = &resolve_instances(imaging).unwrap()[0];
        let payload = MediaPayload { jpeg: b"x", width: 1, height: 1 };

        let a = MediaEmitter::build_media(imaging, &context, instance, &payload, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = MediaEmitter::build_media(imaging, &context, instance, &payload, &mut StdRng::seed_from_u64(1)).unwrap();
        let c = MediaEmitter::build_media(imaging, &context, instance, &payload, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(a["id"], b["id"]);
        assert_ne!(a["id"], c["id"]);
    }
}
