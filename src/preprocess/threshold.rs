//! 大津の方法による二値化

use image::{GrayImage, Luma};

/// 有効な閾値が見つからない場合（全画素が1つのビンに入る場合など）の既定値
pub const FALLBACK_THRESHOLD: u8 = 128;

/// 256ビンの輝度ヒストグラム
pub fn histogram(image: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        hist[pixel[0] as usize] += 1;
    }
    hist
}

/// ヒストグラムから大津の閾値を求める
///
/// 閾値 t に対して `> t` を前景、`<= t` を背景とし、
/// クラス間分散 `w_fg * w_bg * (mean_fg - mean_bg)^2` が最大となる t を返します。
/// 同値の場合は小さい t を優先します。片側が空になる t は候補から外します。
pub fn otsu_threshold_from_histogram(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return FALLBACK_THRESHOLD;
    }
    let total_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(value, count)| value as f64 * *count as f64)
        .sum();

    let mut best_variance = 0.0f64;
    let mut best_threshold = FALLBACK_THRESHOLD;

    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;

    for t in 0..256usize {
        background_count += hist[t];
        background_sum += t as f64 * hist[t] as f64;
        let foreground_count = total - background_count;

        if background_count == 0 || foreground_count == 0 {
            continue;
        }

        let background_mean = background_sum / background_count as f64;
        let foreground_mean = (total_sum - background_sum) / foreground_count as f64;
        let w_bg = background_count as f64 / total as f64;
        let w_fg = foreground_count as f64 / total as f64;
        let variance = w_fg * w_bg * (foreground_mean - background_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// 画像に対する大津の閾値
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    otsu_threshold_from_histogram(&histogram(image))
}

/// `> threshold` を白(255)、それ以外を黒(0)にした新しい画像を返す
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
