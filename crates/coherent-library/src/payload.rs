//! 选中影像的像素载荷

use crate::index::{ImageLibraryRow, RowId};
use coherent_core::{Result, SynthError};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// 已解码的影像及其来源行
///
/// 只在处理一次检查期间持有；连续性沿用时由控制器带到下一次检查。
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub row: RowId,
    pub path: PathBuf,
    image: DynamicImage,
}

impl SelectedImage {
    /// 读取并解码行指向的影像文件
    pub fn load(row_id: RowId, row: &ImageLibraryRow) -> Result<Self> {
        let image = image::open(&row.path)
            .map_err(|e| SynthError::Image(format!("无法读取影像 {:?}: {}", row.path, e)))?;
        Ok(Self {
            row: row_id,
            path: row.path.clone(),
            image,
        })
    }

    /// 由已解码的影像构建
    pub fn from_image(row: RowId, path: impl AsRef<Path>, image: DynamicImage) -> Self {
        Self {
            row,
            path: path.as_ref().to_path_buf(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.image.dimensions().1
    }

    /// 按行交错的 8 位 RGB 像素
    pub fn rgb_pixels(&self) -> Vec<u8> {
        self.image.to_rgb8().into_raw()
    }

    /// 8 位灰度像素
    pub fn gray_pixels(&self) -> Vec<u8> {
        self.image.to_luma8().into_raw()
    }

    /// 重新编码为 JPEG，作为内联 Media 内容和输出目录中的原始影像
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(self.image.to_rgb8())
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(90))
            .map_err(|e| SynthError::Image(format!("JPEG 编码失败 {:?}: {}", self.path, e)))?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ImageLabels;
    use coherent_core::Modality;
    use image::{Rgb, RgbImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 60, y as u8 * 80, 200])))
    }

    #[test]
    fn test_pixel_buffers_match_dimensions() {
        let id = RowId { modality: Modality::Fundus, index: 0 };
        let selected = SelectedImage::from_image(id, "a.png", sample());

        assert_eq!(selected.width(), 4);
        assert_eq!(selected.height(), 3);
        assert_eq!(selected.rgb_pixels().len(), 4 * 3 * 3);
        assert_eq!(selected.gray_pixels().len(), 4 * 3);
    }

    #[test]
    fn test_load_and_encode_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        sample().save(&path).unwrap();

        let row = ImageLibraryRow {
            path: path.clone(),
            labels: ImageLabels::Oct { class: "Normal".to_string() },
            selected: false,
        };
        let id = RowId { modality: Modality::Oct, index: 0 };
        let selected = SelectedImage::load(id, &row).unwrap();
        assert_eq!(selected.path, path);

        let jpeg = selected.jpeg_bytes().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_missing_file_is_image_error() {
        let row = ImageLibraryRow {
            path: PathBuf::from("/nonexistent/a.jpg"),
            labels: ImageLabels::Oct { class: "DME".to_string() },
            selected: false,
        };
        let id = RowId { modality: Modality::Oct, index: 0 };
        assert!(matches!(SelectedImage::load(id, &row), Err(SynthError::Image(_))));
    }
}
