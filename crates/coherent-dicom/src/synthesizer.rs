//! 影像对象合成
//!
//! 按模态模板构建 DICOM 数据集，并替换与检查相关的字段：
//! 日期时间、患者身份、UID、实例号、眼别和像素数据。
//! 数据集按标签有序存放，相同输入序列化后逐字节一致。

use crate::templates::{self, CodedEntry};
use coherent_core::utils::{derive_dicom_uid, fhir_date_to_dicom, is_valid_dicom_uid, started_to_dicom};
use coherent_core::{ClinicalContext, InstanceContext, Modality, Result, SynthError};
use coherent_fhir::ImagingEvent;
use coherent_library::SelectedImage;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use tracing::debug;

/// 一个合成影像对象使用的全部 UID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUids {
    pub study: String,
    pub series: String,
    pub sop_instance: String,
    /// OCT 定位图所引用的眼底照相实例
    pub localizer: String,
    pub frame_of_reference: String,
}

impl ObjectUids {
    /// 由检查标识与实例标识确定性地得到 UID
    ///
    /// 记录中的标识本身是合法 UID 时直接使用，否则按标识派生 2.25 UID。
    pub fn resolve(imaging: &ImagingEvent, instance: &InstanceContext) -> Self {
        let event_id = imaging.event_id();

        let study = usable_uid(event_id).unwrap_or_else(|| derive_dicom_uid(&["study", &imaging.study.id]));
        let series = usable_uid(&instance.series_uid)
            .unwrap_or_else(|| derive_dicom_uid(&["series", event_id, &instance.series_uid]));
        let sop_instance =
            usable_uid(&instance.uid).unwrap_or_else(|| derive_dicom_uid(&["sop", event_id, &instance.uid]));
        let localizer = derive_dicom_uid(&[&study, instance.laterality.dicom_code(), "localizer"]);
        let frame_of_reference = derive_dicom_uid(&[&study, instance.laterality.dicom_code(), "frame-of-reference"]);

        Self {
            study,
            series,
            sop_instance,
            localizer,
            frame_of_reference,
        }
    }
}

fn usable_uid(value: &str) -> Option<String> {
    is_valid_dicom_uid(value).then(|| value.to_string())
}

/// 合成的影像对象：元数据 + 像素数据
#[derive(Debug, Clone)]
pub struct ImagingObject {
    pub modality: Modality,
    pub sop_class_uid: &'static str,
    pub uids: ObjectUids,
    dataset: InMemDicomObject,
}

impl ImagingObject {
    pub fn dataset(&self) -> &InMemDicomObject {
        &self.dataset
    }

    pub fn sop_instance_uid(&self) -> &str {
        &self.uids.sop_instance
    }

    /// 序列化为 DICOM Part 10 文件字节
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = self
            .dataset
            .clone()
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(templates::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(self.sop_class_uid)
                    .media_storage_sop_instance_uid(self.uids.sop_instance.as_str()),
            )
            .map_err(|e| SynthError::Dicom(format!("文件元信息构建失败: {}", e)))?;

        let mut buffer = Vec::new();
        file.write_all(&mut buffer)
            .map_err(|e| SynthError::Dicom(format!("DICOM 序列化失败: {}", e)))?;
        Ok(buffer)
    }
}

/// 影像对象合成器
pub struct ImagingObjectSynthesizer;

impl ImagingObjectSynthesizer {
    /// 按模态分派到对应模板
    pub fn synthesize(
        imaging: &ImagingEvent,
        context: &ClinicalContext,
        instance: &InstanceContext,
        image: &SelectedImage,
    ) -> Result<ImagingObject> {
        let uids = ObjectUids::resolve(imaging, instance);
        let mut dataset = common_dataset(imaging, context, instance, &uids, image)?;

        match context.modality {
            Modality::Fundus => apply_fundus_template(&mut dataset, image),
            Modality::Oct => apply_oct_template(&mut dataset, context, instance, &uids, image),
        }

        debug!(
            "已合成 {} 影像对象 {} (检查 {}, 实例 {})",
            context.modality,
            uids.sop_instance,
            imaging.event_id(),
            instance.number
        );

        Ok(ImagingObject {
            modality: context.modality,
            sop_class_uid: templates::sop_class_uid(context.modality),
            uids,
            dataset,
        })
    }
}

fn common_dataset(
    imaging: &ImagingEvent,
    context: &ClinicalContext,
    instance: &InstanceContext,
    uids: &ObjectUids,
    image: &SelectedImage,
) -> Result<InMemDicomObject> {
    let modality = context.modality;
    let (date, time) = started_to_dicom(&imaging.study.started)?;
    let rows = dimension(image.height(), "行数")?;
    let columns = dimension(image.width(), "列数")?;
    let patient = &context.patient;

    let mut ds = InMemDicomObject::new_empty();

    put_str(&mut ds, tags::SPECIFIC_CHARACTER_SET, VR::CS, templates::SPECIFIC_CHARACTER_SET);
    put_str(&mut ds, tags::SOP_CLASS_UID, VR::UI, templates::sop_class_uid(modality));
    put_str(&mut ds, tags::SOP_INSTANCE_UID, VR::UI, &uids.sop_instance);
    put_str(&mut ds, tags::SYNTHETIC_DATA, VR::CS, "YES");

    // 日期时间取自检查开始时间
    for tag in [tags::STUDY_DATE, tags::SERIES_DATE, tags::ACQUISITION_DATE, tags::CONTENT_DATE] {
        put_str(&mut ds, tag, VR::DA, &date);
    }
    for tag in [tags::STUDY_TIME, tags::SERIES_TIME, tags::ACQUISITION_TIME, tags::CONTENT_TIME] {
        put_str(&mut ds, tag, VR::TM, &time);
    }
    put_str(&mut ds, tags::ACQUISITION_DATE_TIME, VR::DT, &format!("{}{}", date, time));

    put_str(&mut ds, tags::MODALITY, VR::CS, modality.dicom_code());
    put_str(&mut ds, tags::MANUFACTURER, VR::LO, templates::MANUFACTURER);
    put_str(&mut ds, tags::INSTITUTION_NAME, VR::LO, templates::INSTITUTION_NAME);
    put_str(&mut ds, tags::SERIES_DESCRIPTION, VR::LO, templates::series_description(modality));
    put_str(&mut ds, tags::MANUFACTURER_MODEL_NAME, VR::LO, templates::MANUFACTURER_MODEL_NAME);
    put_str(&mut ds, tags::DEVICE_SERIAL_NUMBER, VR::LO, templates::DEVICE_SERIAL_NUMBER);
    put_str(&mut ds, tags::SOFTWARE_VERSIONS, VR::LO, templates::SOFTWARE_VERSIONS);
    put_seq(&mut ds, tags::ANATOMIC_REGION_SEQUENCE, vec![code_item(templates::RETINA)]);
    put_seq(
        &mut ds,
        tags::ACQUISITION_DEVICE_TYPE_CODE_SEQUENCE,
        vec![code_item(templates::acquisition_device(modality))],
    );

    // 患者模块
    put_str(
        &mut ds,
        tags::PATIENT_NAME,
        VR::PN,
        &format!("{}^{}", patient.family_name, patient.given_name),
    );
    put_str(&mut ds, tags::PATIENT_ID, VR::LO, &patient.id);
    put_str(&mut ds, tags::PATIENT_BIRTH_DATE, VR::DA, &fhir_date_to_dicom(&patient.birth_date));
    put_str(&mut ds, tags::PATIENT_SEX, VR::CS, &sex_code(&patient.gender));

    put_str(&mut ds, tags::STUDY_INSTANCE_UID, VR::UI, &uids.study);
    put_str(&mut ds, tags::SERIES_INSTANCE_UID, VR::UI, &uids.series);
    put_str(&mut ds, tags::STUDY_ID, VR::SH, "1");
    put_str(&mut ds, tags::SERIES_NUMBER, VR::IS, "1");
    put_str(&mut ds, tags::ACQUISITION_NUMBER, VR::IS, "1");
    put_str(&mut ds, tags::INSTANCE_NUMBER, VR::IS, &instance.number.to_string());
    put_str(&mut ds, tags::IMAGE_LATERALITY, VR::CS, instance.laterality.dicom_code());

    // 图像像素模块
    put_u16(&mut ds, tags::ROWS, rows);
    put_u16(&mut ds, tags::COLUMNS, columns);
    put_u16(&mut ds, tags::BITS_ALLOCATED, 8);
    put_u16(&mut ds, tags::BITS_STORED, 8);
    put_u16(&mut ds, tags::HIGH_BIT, 7);
    put_u16(&mut ds, tags::PIXEL_REPRESENTATION, 0);
    put_str(&mut ds, tags::NUMBER_OF_FRAMES, VR::IS, "1");
    put_str(&mut ds, tags::BURNED_IN_ANNOTATION, VR::CS, "NO");
    put_str(&mut ds, tags::LOSSY_IMAGE_COMPRESSION, VR::CS, "00");

    Ok(ds)
}

/// 广角眼底照相：三通道 RGB，交错存放
fn apply_fundus_template(ds: &mut InMemDicomObject, image: &SelectedImage) {
    put_strs(ds, tags::IMAGE_TYPE, VR::CS, &["ORIGINAL", "PRIMARY", "3D Wide"]);
    put_strs(ds, tags::PATIENT_ORIENTATION, VR::CS, &["L", "F"]);
    put_str(ds, tags::FRAME_TIME, VR::DS, "0.0");
    ds.put(DataElement::new(
        tags::FRAME_INCREMENT_POINTER,
        VR::AT,
        PrimitiveValue::Tags([tags::FRAME_TIME].into_iter().collect()),
    ));

    put_u16(ds, tags::SAMPLES_PER_PIXEL, 3);
    put_str(ds, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB");
    put_u16(ds, tags::PLANAR_CONFIGURATION, 0);
    put_pixel_data(ds, image.rgb_pixels());
}

/// OCT 断层扫描：单通道灰度，附带共享与逐帧功能组
fn apply_oct_template(
    ds: &mut InMemDicomObject,
    context: &ClinicalContext,
    instance: &InstanceContext,
    uids: &ObjectUids,
    image: &SelectedImage,
) {
    put_strs(ds, tags::IMAGE_TYPE, VR::CS, &["ORIGINAL", "PRIMARY"]);
    put_str(ds, tags::DETECTOR_TYPE, VR::CS, "CCD");
    put_str(ds, tags::FRAME_OF_REFERENCE_UID, VR::UI, &uids.frame_of_reference);
    put_f32s(ds, tags::DEPTH_SPATIAL_RESOLUTION, &[templates::OCT_DEPTH_SPATIAL_RESOLUTION]);
    put_f32s(ds, tags::ILLUMINATION_WAVE_LENGTH, &[templates::OCT_ILLUMINATION_WAVE_LENGTH]);
    put_f32s(ds, tags::ILLUMINATION_POWER, &[templates::OCT_ILLUMINATION_POWER]);
    put_f32s(ds, tags::ILLUMINATION_BANDWIDTH, &[templates::OCT_ILLUMINATION_BANDWIDTH]);

    if let Some(conclusion) = context.report.as_ref().and_then(|r| r.conclusion.as_deref()) {
        put_str(ds, tags::IMAGE_COMMENTS, VR::LT, conclusion);
    }

    put_seq(ds, tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, vec![shared_functional_group(instance, uids)]);
    put_seq(ds, tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, vec![per_frame_functional_group(uids)]);

    put_u16(ds, tags::SAMPLES_PER_PIXEL, 1);
    put_str(ds, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
    put_pixel_data(ds, image.gray_pixels());
}

/// 共享功能组：定位图引用、帧解剖与眼别、平面方向、像素尺寸
fn shared_functional_group(instance: &InstanceContext, uids: &ObjectUids) -> InMemDicomObject {
    let mut group = InMemDicomObject::new_empty();

    put_seq(&mut group, tags::REFERENCED_IMAGE_SEQUENCE, vec![localizer_reference(uids)]);

    let mut anatomy = InMemDicomObject::new_empty();
    put_seq(&mut anatomy, tags::ANATOMIC_REGION_SEQUENCE, vec![code_item(templates::RETINA)]);
    put_str(&mut anatomy, tags::FRAME_LATERALITY, VR::CS, instance.laterality.dicom_code());
    put_seq(&mut group, tags::FRAME_ANATOMY_SEQUENCE, vec![anatomy]);

    let mut orientation = InMemDicomObject::new_empty();
    put_strs(&mut orientation, tags::IMAGE_ORIENTATION_PATIENT, VR::DS, &templates::OCT_IMAGE_ORIENTATION);
    put_seq(&mut group, tags::PLANE_ORIENTATION_SEQUENCE, vec![orientation]);

    let mut measures = InMemDicomObject::new_empty();
    put_str(&mut measures, tags::SLICE_THICKNESS, VR::DS, templates::OCT_SLICE_THICKNESS);
    put_strs(&mut measures, tags::PIXEL_SPACING, VR::DS, &templates::OCT_PIXEL_SPACING);
    put_seq(&mut group, tags::PIXEL_MEASURES_SEQUENCE, vec![measures]);

    group
}

/// 逐帧功能组：帧内容、平面位置、眼科帧定位
fn per_frame_functional_group(uids: &ObjectUids) -> InMemDicomObject {
    let mut group = InMemDicomObject::new_empty();

    let mut content = InMemDicomObject::new_empty();
    put_str(&mut content, tags::STACK_ID, VR::SH, "1");
    put_u32s(&mut content, tags::IN_STACK_POSITION_NUMBER, &[1]);
    put_u32s(&mut content, tags::DIMENSION_INDEX_VALUES, &[1, 1]);
    put_seq(&mut group, tags::FRAME_CONTENT_SEQUENCE, vec![content]);

    let mut position = InMemDicomObject::new_empty();
    put_seq(
        &mut position,
        tags::PURPOSE_OF_REFERENCE_CODE_SEQUENCE,
        vec![code_item(templates::LOCALIZER)],
    );
    put_seq(&mut group, tags::PLANE_POSITION_SEQUENCE, vec![position]);

    let mut location = localizer_reference(uids);
    put_f32s(&mut location, tags::REFERENCE_COORDINATES, &templates::OCT_REFERENCE_COORDINATES);
    put_str(&mut location, tags::OPHTHALMIC_IMAGE_ORIENTATION, VR::CS, "LINEAR");
    put_seq(&mut group, tags::OPHTHALMIC_FRAME_LOCATION_SEQUENCE, vec![location]);

    group
}

fn localizer_reference(uids: &ObjectUids) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    put_str(&mut item, tags::REFERENCED_SOP_CLASS_UID, VR::UI, templates::OPHTHALMIC_PHOTOGRAPHY_8BIT);
    put_str(&mut item, tags::REFERENCED_SOP_INSTANCE_UID, VR::UI, &uids.localizer);
    put_seq(
        &mut item,
        tags::PURPOSE_OF_REFERENCE_CODE_SEQUENCE,
        vec![code_item(templates::LOCALIZER)],
    );
    item
}

fn code_item(entry: CodedEntry) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    put_str(&mut item, tags::CODE_VALUE, VR::SH, entry.value);
    put_str(&mut item, tags::CODING_SCHEME_DESIGNATOR, VR::SH, entry.scheme);
    put_str(&mut item, tags::CODE_MEANING, VR::LO, entry.meaning);
    item
}

/// FHIR administrative gender 首字母大写
fn sex_code(gender: &str) -> String {
    gender
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

fn dimension(value: u32, name: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| SynthError::Dicom(format!("图像{}超出 DICOM 上限: {}", name, value)))
}

fn put_str(ds: &mut InMemDicomObject, tag: Tag, vr: VR, value: &str) {
    ds.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn put_strs(ds: &mut InMemDicomObject, tag: Tag, vr: VR, values: &[&str]) {
    ds.put(DataElement::new(
        tag,
        vr,
        PrimitiveValue::Strs(values.iter().map(|v| v.to_string()).collect()),
    ));
}

fn put_u16(ds: &mut InMemDicomObject, tag: Tag, value: u16) {
    ds.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
}

fn put_u32s(ds: &mut InMemDicomObject, tag: Tag, values: &[u32]) {
    ds.put(DataElement::new(tag, VR::UL, PrimitiveValue::U32(values.iter().copied().collect())));
}

fn put_f32s(ds: &mut InMemDicomObject, tag: Tag, values: &[f32]) {
    ds.put(DataElement::new(tag, VR::FL, PrimitiveValue::F32(values.iter().copied().collect())));
}

fn put_seq(ds: &mut InMemDicomObject, tag: Tag, items: Vec<InMemDicomObject>) {
    ds.put(DataElement::new(tag, VR::SQ, DataSetSequence::from(items)));
}

/// OB 值长度必须为偶数
fn put_pixel_data(ds: &mut InMemDicomObject, mut pixels: Vec<u8>) {
    if pixels.len() % 2 == 1 {
        pixels.push(0);
    }
    ds.put(DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::U8(pixels.into())));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use coherent_core::{DiagnosisFlags, Laterality, PatientIdentity, ReportSummary};
    use coherent_library::RowId;
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::json;

    pub fn imaging_event(modality: Modality, oid: &str) -> ImagingEvent {
        let study = serde_json::from_value(json!({
            "id": "study-1",
            "identifier": [{ "system": "urn:ietf:rfc:3986", "value": format!("urn:oid:{}", oid) }],
            "encounter": { "reference": "urn:uuid:e1" },
            "started": "2021-03-04T10:20:30+00:00",
            "series": [{
                "uid": "1.2.840.99999999.7.1",
                "instance": [{ "uid": "1.2.840.99999999.7.1.1", "number": 3, "title": "Right eye" }]
            }]
        }))
        .unwrap();
        ImagingEvent { modality, study }
    }

    pub fn clinical_context(modality: Modality, conclusion: Option<&str>) -> ClinicalContext {
        ClinicalContext {
            modality,
            patient: PatientIdentity {
                id: "p-123".to_string(),
                family_name: "Doe".to_string(),
                given_name: "Jane".to_string(),
                birth_date: "1960-02-03".to_string(),
                gender: "female".to_string(),
            },
            encounter_id: "e1".to_string(),
            encounter_date: "2021-03-04T10:00:00+00:00".to_string(),
            diagnoses: DiagnosisFlags::default(),
            stage: 2,
            report: conclusion.map(|c| ReportSummary {
                id: "r1".to_string(),
                conclusion: Some(c.to_string()),
            }),
        }
    }

    pub fn instance() -> InstanceContext {
        InstanceContext {
            slot: 0,
            series_uid: "1.2.840.99999999.7.1".to_string(),
            uid: "1.2.840.99999999.7.1.1".to_string(),
            number: 3,
            laterality: Laterality::Right,
        }
    }

    pub fn selected_image(modality: Modality) -> SelectedImage {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 70, 10]));
        SelectedImage::from_image(RowId { modality, index: 0 }, "fixture.png", DynamicImage::ImageRgb8(image))
    }

    fn text(ds: &InMemDicomObject, tag: Tag) -> String {
        ds.element(tag).unwrap().to_str().unwrap().trim_end_matches(['\0', ' ']).to_string()
    }

    #[test]
    fn test_fundus_object_fields() {
        let object = ImagingObjectSynthesizer::synthesize(
            &imaging_event(Modality::Fundus, "1.2.840.99999999.7"),
            &clinical_context(Modality::Fundus, None),
            &instance(),
            &selected_image(Modality::Fundus),
        )
        .unwrap();
        let ds = object.dataset();

        assert_eq!(object.sop_class_uid, templates::OPHTHALMIC_PHOTOGRAPHY_8BIT);
        assert_eq!(text(ds, tags::MODALITY), "OP");
        assert_eq!(text(ds, tags::SYNTHETIC_DATA), "YES");
        assert_eq!(text(ds, tags::PATIENT_NAME), "Doe^Jane");
        assert_eq!(text(ds, tags::PATIENT_ID), "p-123");
        assert_eq!(text(ds, tags::PATIENT_BIRTH_DATE), "19600203");
        assert_eq!(text(ds, tags::PATIENT_SEX), "F");
        assert_eq!(text(ds, tags::STUDY_DATE), "20210304");
        assert_eq!(text(ds, tags::ACQUISITION_TIME), "102030.000000");
        assert_eq!(text(ds, tags::STUDY_INSTANCE_UID), "1.2.840.99999999.7");
        assert_eq!(text(ds, tags::SERIES_INSTANCE_UID), "1.2.840.99999999.7.1");
        assert_eq!(text(ds, tags::SOP_INSTANCE_UID), "1.2.840.99999999.7.1.1");
        assert_eq!(text(ds, tags::INSTANCE_NUMBER), "3");
        assert_eq!(text(ds, tags::IMAGE_LATERALITY), "R");
        assert_eq!(text(ds, tags::PHOTOMETRIC_INTERPRETATION), "RGB");

        assert_eq!(ds.element(tags::ROWS).unwrap().to_int::<u16>().unwrap(), 3);
        assert_eq!(ds.element(tags::COLUMNS).unwrap().to_int::<u16>().unwrap(), 5);
        assert_eq!(ds.element(tags::SAMPLES_PER_PIXEL).unwrap().to_int::<u16>().unwrap(), 3);
        // 5 x 3 x 3 = 45 字节，补齐为偶数
        assert_eq!(ds.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap().len(), 46);
        assert!(ds.element(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).is_err());
    }

    #[test]
    fn test_oct_object_has_functional_groups() {
        let object = ImagingObjectSynthesizer::synthesize(
            &imaging_event(Modality::Oct, "1.2.840.99999999.7"),
            &clinical_context(Modality::Oct, Some("Diabetic macular edema")),
            &instance(),
            &selected_image(Modality::Oct),
        )
        .unwrap();
        let ds = object.dataset();

        assert_eq!(object.sop_class_uid, templates::OPHTHALMIC_TOMOGRAPHY);
        assert_eq!(text(ds, tags::MODALITY), "OPT");
        assert_eq!(text(ds, tags::PHOTOMETRIC_INTERPRETATION), "MONOCHROME2");
        assert_eq!(ds.element(tags::SAMPLES_PER_PIXEL).unwrap().to_int::<u16>().unwrap(), 1);
        assert_eq!(ds.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap().len(), 16);
        assert_eq!(text(ds, tags::IMAGE_COMMENTS), "Diabetic macular edema");

        let shared = &ds.element(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).unwrap().items().unwrap()[0];
        let anatomy = &shared.element(tags::FRAME_ANATOMY_SEQUENCE).unwrap().items().unwrap()[0];
        assert_eq!(text(anatomy, tags::FRAME_LATERALITY), "R");

        let reference = &shared.element(tags::REFERENCED_IMAGE_SEQUENCE).unwrap().items().unwrap()[0];
        assert_eq!(text(reference, tags::REFERENCED_SOP_INSTANCE_UID), object.uids.localizer);

        let per_frame = &ds.element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE).unwrap().items().unwrap()[0];
        let location = &per_frame.element(tags::OPHTHALMIC_FRAME_LOCATION_SEQUENCE).unwrap().items().unwrap()[0];
        assert_eq!(text(location, tags::OPHTHALMIC_IMAGE_ORIENTATION), "LINEAR");
        assert_eq!(text(location, tags::REFERENCED_SOP_INSTANCE_UID), object.uids.localizer);
    }

    #[test]
    fn test_oct_without_report_has_no_comments() {
        let object = ImagingObjectSynthesizer::synthesize(
            &imaging_event(Modality::Oct, "1.2.840.99999999.7"),
            &clinical_context(Modality::Oct, None),
            &instance(),
            &selected_image(Modality::Oct),
        )
        .unwrap();
        assert!(object.dataset().element(tags::IMAGE_COMMENTS).is_err());
    }

    #[test]
    fn test_synthesis_is_byte_identical() {
        let build = || {
            ImagingObjectSynthesizer::synthesize(
                &imaging_event(Modality::Oct, "1.2.840.99999999.7"),
                &clinical_context(Modality::Oct, Some("Normal")),
                &instance(),
                &selected_image(Modality::Oct),
            )
            .unwrap()
            .to_bytes()
            .unwrap()
        };

        let first = build();
        assert_eq!(first, build());
        assert_eq!(&first[128..132], b"DICM");
    }

    #[test]
    fn test_invalid_identifiers_fall_back_to_derived_uids() {
        let mut event = imaging_event(Modality::Fundus, "not-a-uid");
        event.study.identifier.clear();
        let mut inst = instance();
        inst.uid = "instance-abc".to_string();

        let uids = ObjectUids::resolve(&event, &inst);
        assert!(uids.study.starts_with("2.25."));
        assert!(uids.sop_instance.starts_with("2.25."));
        assert_eq!(uids.series, "1.2.840.99999999.7.1");
        assert_eq!(uids, ObjectUids::resolve(&event, &inst));

        let mut other = inst.clone();
        other.uid = "instance-def".to_string();
        assert_ne!(ObjectUids::resolve(&event, &other).sop_instance, uids.sop_instance);
    }

    #[test]
    fn test_sex_code() {
        assert_eq!(sex_code("male"), "M");
        assert_eq!(sex_code("other"), "O");
        assert_eq!(sex_code(""), "");
    }
}
