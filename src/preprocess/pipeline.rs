//! 正規化パイプライン本体

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

use crate::error::{DigitError, Result};
use crate::model::config::PreprocessSettings;
use crate::preprocess::tensor::{CanonicalTensor, CANVAS_SIZE};
use crate::preprocess::{blur, centering, grayscale, morphology, threshold};

/// ビットマップ → 標準テンソル 変換器
///
/// 状態を持たず、同じ入力には常にビット単位で同じ出力を返します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageNormalizer {
    blur_radius: u32,
    closing_iterations: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::from_settings(&PreprocessSettings::default())
    }
}

impl ImageNormalizer {
    pub fn new(blur_radius: u32, closing_iterations: u32) -> Self {
        Self {
            blur_radius,
            closing_iterations,
        }
    }

    pub fn from_settings(settings: &PreprocessSettings) -> Self {
        Self::new(settings.blur_radius, settings.closing_iterations)
    }

    /// ビットマップを標準テンソルに変換
    ///
    /// 幅または高さが0の画像は白紙として扱います。
    pub fn normalize(&self, bitmap: &DynamicImage) -> CanonicalTensor {
        let canvas = self.prepare_canvas(bitmap);
        CanonicalTensor::from_canvas(&canvas)
    }

    /// 画像ファイルを読み込んで変換
    pub fn normalize_path<P: AsRef<Path>>(&self, path: P) -> Result<CanonicalTensor> {
        let path = path.as_ref();
        let bitmap = image::open(path).map_err(|e| {
            DigitError::InvalidInput(format!("画像を読み込めません {}: {}", path.display(), e))
        })?;
        Ok(self.normalize(&bitmap))
    }

    /// エンコード済み画像バイト列（PNG等）をデコードして変換
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<CanonicalTensor> {
        let bitmap = image::load_from_memory(bytes)
            .map_err(|e| DigitError::InvalidInput(format!("画像をデコードできません: {}", e)))?;
        Ok(self.normalize(&bitmap))
    }

    /// 1〜6段目: 28x28 のセンタリング済み二値キャンバスを作る
    fn prepare_canvas(&self, bitmap: &DynamicImage) -> GrayImage {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return GrayImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Luma([255]));
        }

        let gray = grayscale::to_grayscale(bitmap);
        let blurred = blur::gaussian_blur(&gray, self.blur_radius);
        let resized = image::imageops::resize(
            &blurred,
            CANVAS_SIZE,
            CANVAS_SIZE,
            FilterType::CatmullRom,
        );

        let t = threshold::otsu_threshold(&resized);
        let binary = threshold::binarize(&resized, t);
        let closed = morphology::close(&binary, self.closing_iterations);
        let centered = centering::center_by_centroid(&closed);

        debug!(
            width = bitmap.width(),
            height = bitmap.height(),
            threshold = t,
            "画像を正規化しました"
        );
        centered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::INPUT_SIZE;
    use image::{Rgb, RgbImage};

    fn disk_image(size: u32, cx: f64, cy: f64, radius: f64) -> DynamicImage {
        let gray = GrayImage::from_fn(size, size, |x, y| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= radius * radius {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn test_output_has_fixed_length_for_any_size() {
        let normalizer = ImageNormalizer::default();
        for (w, h) in [(1, 1), (5, 90), (28, 28), (300, 120)] {
            let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 128])
            }));
            assert_eq!(normalizer.normalize(&img).len(), INPUT_SIZE);
        }
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        assert_eq!(normalizer.normalize(&empty).len(), INPUT_SIZE);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalizer = ImageNormalizer::default();
        let img = disk_image(64, 20.0, 40.0, 9.0);

        let a = normalizer.normalize(&img);
        let b = normalizer.normalize(&img);
        let a_bits: Vec<u32> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn test_uniform_inputs_give_all_zero_tensor() {
        let normalizer = ImageNormalizer::default();
        for value in [0u8, 255] {
            let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 40, Luma([value])));
            let tensor = normalizer.normalize(&img);
            assert!(
                tensor.as_slice().iter().all(|v| *v == 0.0),
                "uniform {value} gave non-zero output"
            );
        }
    }

    #[test]
    fn test_centered_disk_peaks_at_canvas_center() {
        let normalizer = ImageNormalizer::default();
        let tensor = normalizer.normalize(&disk_image(100, 49.5, 49.5, 25.0));

        let max = tensor
            .as_slice()
            .iter()
            .cloned()
            .fold(f32::NEG_INFINITY, f32::max);
        let min = tensor
            .as_slice()
            .iter()
            .cloned()
            .fold(f32::INFINITY, f32::min);
        assert!(max > 0.0 && max.abs() > min.abs());

        for (row, col) in [(13, 13), (13, 14), (14, 13), (14, 14)] {
            let value = tensor.get(row, col).unwrap();
            assert!((value - max).abs() < 1e-4, "({row},{col}) = {value}, max = {max}");
        }
        // 角は背景
        assert!(tensor.get(0, 0).unwrap() < 0.0);
    }

    #[test]
    fn test_off_center_stroke_is_recentered() {
        let normalizer = ImageNormalizer::default();
        let tensor = normalizer.normalize(&disk_image(100, 20.0, 25.0, 12.0));

        let mut sum = 0.0f64;
        let mut sum_r = 0.0f64;
        let mut sum_c = 0.0f64;
        for row in 0..28 {
            for col in 0..28 {
                let v = tensor.get(row, col).unwrap() as f64;
                if v > 0.0 {
                    sum += v;
                    sum_r += row as f64 * v;
                    sum_c += col as f64 * v;
                }
            }
        }
        assert!(sum > 0.0);
        assert!((sum_r / sum - 14.0).abs() <= 1.5);
        assert!((sum_c / sum - 14.0).abs() <= 1.5);
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        let normalizer = ImageNormalizer::default();
        let err = normalizer.normalize_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, DigitError::InvalidInput(_)));
    }
}
