//! 模态模板常量
//!
//! 两种模态的固定结构：SOP 类、设备信息与编码条目。每次合成只替换与检查相关的字段。

use coherent_core::Modality;

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

/// Ophthalmic Photography 8 Bit Image Storage
pub const OPHTHALMIC_PHOTOGRAPHY_8BIT: &str = "1.2.840.10008.5.1.4.1.1.77.1.5.1";

/// Ophthalmic Tomography Image Storage
pub const OPHTHALMIC_TOMOGRAPHY: &str = "1.2.840.10008.5.1.4.1.1.77.1.5.4";

pub const MANUFACTURER: &str = "Topcon Healthcare";
pub const MANUFACTURER_MODEL_NAME: &str = "Maestro2";
pub const INSTITUTION_NAME: &str = "THINC";
pub const DEVICE_SERIAL_NUMBER: &str = "3070395";
pub const SOFTWARE_VERSIONS: &str = "2.54.24153";
pub const SPECIFIC_CHARACTER_SET: &str = "ISO_IR 100";

/// 编码条目 (Code Sequence Macro)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedEntry {
    pub value: &'static str,
    pub scheme: &'static str,
    pub meaning: &'static str,
}

pub const RETINA: CodedEntry = CodedEntry {
    value: "5665001",
    scheme: "SCT",
    meaning: "Retina",
};

pub const FUNDUS_CAMERA: CodedEntry = CodedEntry {
    value: "R-1021A",
    scheme: "SRT",
    meaning: "Fundus Camera",
};

pub const OCT_SCANNER: CodedEntry = CodedEntry {
    value: "A-00FBE",
    scheme: "SRT",
    meaning: "Optical Coherence Tomography Scanner",
};

pub const LOCALIZER: CodedEntry = CodedEntry {
    value: "121311",
    scheme: "DCM",
    meaning: "Localizer",
};

/// OCT 扫描几何
pub const OCT_DEPTH_SPATIAL_RESOLUTION: f32 = 6.0;
pub const OCT_ILLUMINATION_WAVE_LENGTH: f32 = 840.0;
pub const OCT_ILLUMINATION_POWER: f32 = 650.0;
pub const OCT_ILLUMINATION_BANDWIDTH: f32 = 50.0;
pub const OCT_SLICE_THICKNESS: &str = "0.0703125";
pub const OCT_PIXEL_SPACING: [&str; 2] = ["0.0026", "0.023438"];
pub const OCT_IMAGE_ORIENTATION: [&str; 6] = ["1", "0", "0", "0", "1", "0"];
pub const OCT_REFERENCE_COORDINATES: [f32; 4] = [296.0, 371.0, 296.0, 2165.0];

/// 模态对应的 SOP 类
pub fn sop_class_uid(modality: Modality) -> &'static str {
    match modality {
        Modality::Fundus => OPHTHALMIC_PHOTOGRAPHY_8BIT,
        Modality::Oct => OPHTHALMIC_TOMOGRAPHY,
    }
}

/// 模态对应的采集设备类型
pub fn acquisition_device(modality: Modality) -> CodedEntry {
    match modality {
        Modality::Fundus => FUNDUS_CAMERA,
        Modality::Oct => OCT_SCANNER,
    }
}

/// 序列描述
pub fn series_description(modality: Modality) -> &'static str {
    match modality {
        Modality::Fundus => "Fundus",
        Modality::Oct => "OCT",
    }
}
