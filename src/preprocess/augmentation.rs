//! 学習データの水増し
//!
//! 28x28 の特徴量ベクトルに 輝度スケール → 平行移動と小角度回転 → ガウスノイズ の順で
//! 適用します。はみ出した領域はその画像の最小値（標準化後の背景値）で埋めます。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::preprocess::tensor::{CANVAS_SIZE, INPUT_SIZE};

/// 水増し設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationSettings {
    /// 水増しを行うか
    pub enabled: bool,
    /// 平行移動の最大量（ピクセル）
    pub max_shift: u32,
    /// 回転の最大角度（度）
    pub max_rotation_degrees: f32,
    /// ガウスノイズの標準偏差
    pub noise_level: f32,
    /// 輝度スケールの下限
    pub min_scale: f32,
    /// 輝度スケールの上限
    pub max_scale: f32,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_shift: 2,
            max_rotation_degrees: 10.0,
            noise_level: 0.05,
            min_scale: 0.9,
            max_scale: 1.1,
        }
    }
}

/// シード付きの水増し器
pub struct Augmenter {
    settings: AugmentationSettings,
    rng: StdRng,
}

impl Augmenter {
    pub fn new(settings: AugmentationSettings, seed: u64) -> Self {
        Self {
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 特徴量を書き換える。長さが `INPUT_SIZE` でなければ何もしない
    pub fn apply(&mut self, features: &mut [f32]) {
        if !self.settings.enabled || features.len() != INPUT_SIZE {
            return;
        }

        self.scale(features);
        self.transform(features);
        self.add_noise(features);
    }

    /// `[min_scale, max_scale]` から選んだ倍率を全画素に掛ける
    fn scale(&mut self, features: &mut [f32]) {
        let (low, high) = (self.settings.min_scale, self.settings.max_scale);
        let factor = if low < high {
            self.rng.gen_range(low..high)
        } else {
            low
        };
        if factor != 1.0 {
            features.iter_mut().for_each(|value| *value *= factor);
        }
    }

    fn transform(&mut self, features: &mut [f32]) {
        let fill = features.iter().cloned().fold(f32::INFINITY, f32::min);
        let side = CANVAS_SIZE as i32;

        let max_shift = self.settings.max_shift as i32;
        let (dx, dy) = if max_shift > 0 {
            (
                self.rng.gen_range(-max_shift..=max_shift),
                self.rng.gen_range(-max_shift..=max_shift),
            )
        } else {
            (0, 0)
        };

        let max_angle = self.settings.max_rotation_degrees.abs();
        let angle = if max_angle > 0.0 {
            self.rng.gen_range(-max_angle..=max_angle).to_radians()
        } else {
            0.0
        };
        let (sin, cos) = angle.sin_cos();
        let center = (side as f32 - 1.0) / 2.0;

        let source = features.to_vec();
        for y in 0..side {
            for x in 0..side {
                // 出力画素から入力画素への逆写像（回転 → 平行移動の逆）
                let tx = (x - dx) as f32 - center;
                let ty = (y - dy) as f32 - center;
                let sx = (cos * tx + sin * ty + center).round() as i32;
                let sy = (-sin * tx + cos * ty + center).round() as i32;

                let value = if (0..side).contains(&sx) && (0..side).contains(&sy) {
                    source[(sy * side + sx) as usize]
                } else {
                    fill
                };
                features[(y * side + x) as usize] = value;
            }
        }
    }

    /// 標準正規乱数 × `noise_level` を各画素に足す
    fn add_noise(&mut self, features: &mut [f32]) {
        let level = self.settings.noise_level.abs();
        if level == 0.0 {
            return;
        }
        for value in features.iter_mut() {
            let noise: f32 = self.rng.sample(StandardNormal);
            *value += noise * level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f32> {
        (0..INPUT_SIZE).map(|i| (i % 13) as f32).collect()
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut features = sample();
        Augmenter::new(AugmentationSettings::default(), 1).apply(&mut features);
        assert_eq!(features, sample());
    }

    #[test]
    fn test_same_seed_same_output() {
        let settings = AugmentationSettings {
            enabled: true,
            ..AugmentationSettings::default()
        };
        let mut a = sample();
        let mut b = sample();
        Augmenter::new(settings.clone(), 7).apply(&mut a);
        Augmenter::new(settings, 7).apply(&mut b);
        assert_eq!(a, b);
    }

    /// 有効だがどの変換も起きない設定
    fn identity() -> AugmentationSettings {
        AugmentationSettings {
            enabled: true,
            max_shift: 0,
            max_rotation_degrees: 0.0,
            noise_level: 0.0,
            min_scale: 1.0,
            max_scale: 1.0,
        }
    }

    #[test]
    fn test_zero_ranges_are_identity() {
        let mut features = sample();
        Augmenter::new(identity(), 3).apply(&mut features);
        assert_eq!(features, sample());
    }


    #[test]
    fn test_scale_multiplies_every_pixel_by_one_factor() {
        let settings = AugmentationSettings {
            min_scale: 0.5,
            max_scale: 1.5,
            ..identity()
        };
        let original = sample();
        let mut features = original.clone();
        Augmenter::new(settings.clone(), 11).apply(&mut features);

        // 値が 1 の画素から倍率を読み取る
        let factor = features[1] / original[1];
        assert!((0.5..1.5).contains(&factor), "factor {}", factor);
        for (scaled, source) in features.iter().zip(original.iter()) {
            assert!((scaled - source * factor).abs() < 1e-4);
        }

        let mut again = original.clone();
        Augmenter::new(settings, 11).apply(&mut again);
        assert_eq!(features, again);
    }

    #[test]
    fn test_fixed_scale_is_applied_exactly() {
        let settings = AugmentationSettings {
            min_scale: 2.0,
            max_scale: 2.0,
            ..identity()
        };
        let mut features = sample();
        Augmenter::new(settings, 5).apply(&mut features);
        let expected: Vec<f32> = sample().iter().map(|v| v * 2.0).collect();
        assert_eq!(features, expected);
    }

    #[test]
    fn test_shift_moves_pixels() {
        let settings = AugmentationSettings {
            max_shift: 2,
            ..identity()
        };
        let mut features = vec![0.0f32; INPUT_SIZE];
        features[14 * CANVAS_SIZE as usize + 14] = 1.0;
        Augmenter::new(settings.clone(), 21).apply(&mut features);

        // 1画素はそのまま残り、中心から最大2画素の範囲に動く
        assert_eq!(features.iter().filter(|v| **v == 1.0).count(), 1);
        let index = features.iter().position(|v| *v == 1.0).unwrap();
        let (x, y) = (index % CANVAS_SIZE as usize, index / CANVAS_SIZE as usize);
        assert!((12..=16).contains(&x) && (12..=16).contains(&y));

        let mut again = vec![0.0f32; INPUT_SIZE];
        again[14 * CANVAS_SIZE as usize + 14] = 1.0;
        Augmenter::new(settings, 21).apply(&mut again);
        assert_eq!(features, again);
    }

    #[test]
    fn test_rotation_keeps_center_pixel() {
        let settings = AugmentationSettings {
            max_rotation_degrees: 10.0,
            ..identity()
        };
        let mut features = vec![0.0f32; INPUT_SIZE];
        let side = CANVAS_SIZE as usize;
        // 中心付近の2x2ブロックは小角度の回転では動かない
        for (x, y) in [(13, 13), (14, 13), (13, 14), (14, 14)] {
            features[y * side + x] = 1.0;
        }
        let original = features.clone();
        Augmenter::new(settings, 4).apply(&mut features);
        assert_eq!(features, original);
    }

    #[test]
    fn test_noise_is_gaussian_with_configured_level() {
        let settings = AugmentationSettings {
            noise_level: 0.5,
            ..identity()
        };
        let mut features = vec![0.0f32; INPUT_SIZE];
        Augmenter::new(settings, 9).apply(&mut features);

        let n = features.len() as f32;
        let mean = features.iter().sum::<f32>() / n;
        let std = (features.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
        assert!(mean.abs() < 0.1, "mean {}", mean);
        assert!((std - 0.5).abs() < 0.1, "std {}", std);
        // 一様ノイズと違い、振幅を超える値も出る
        assert!(features.iter().any(|v| v.abs() > 0.5));
    }
}
