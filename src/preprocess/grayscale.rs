//! グレースケール変換

use image::{DynamicImage, GrayImage, Luma};

/// ITU-R BT.709 の輝度係数（`image` クレートの `to_luma8` と同じ）
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// 画像を1チャンネルの輝度画像に変換
///
/// すでに8bitグレースケールならそのまま複製します。
/// アルファ付きの画像（キャンバスから書き出したPNGなど）は白背景に合成してから変換します。
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other if other.color().has_alpha() => flatten_on_white(other),
        other => other.to_luma8(),
    }
}

fn flatten_on_white(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
        let alpha = a as f32 / 255.0;
        let value = luma * alpha + 255.0 * (1.0 - alpha);
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}
