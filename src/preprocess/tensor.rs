//! 標準テンソル（分類器への入力）

use image::GrayImage;
use serde::Serialize;

use crate::error::{DigitError, Result};

/// 標準キャンバスの一辺
pub const CANVAS_SIZE: u32 = 28;

/// 標準テンソルの要素数 (28 * 28)
pub const INPUT_SIZE: usize = (CANVAS_SIZE * CANVAS_SIZE) as usize;

/// これ以下の標準偏差は一様画像として扱う
pub const DEGENERATE_STD: f64 = 1e-6;

/// 28x28 単一チャンネル、行優先、画像ごとに平均0・分散1へ標準化した値
///
/// 前景（インク）が高い値になる極性で、学習データと揃えています。
/// 正規化パイプラインを通してのみ生成されます。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTensor {
    values: Vec<f32>,
}

impl CanonicalTensor {
    /// 正規化済みの 28x28 キャンバスからテンソルを作る（パイプラインの最終段）
    pub(crate) fn from_canvas(canvas: &GrayImage) -> Self {
        debug_assert_eq!(canvas.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));

        let mut values: Vec<f32> = canvas
            .pixels()
            .map(|pixel| (255 - pixel[0]) as f32 / 255.0)
            .collect();
        standardize(&mut values);

        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// 常に `INPUT_SIZE`
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(row, col)` の値
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= CANVAS_SIZE as usize || col >= CANVAS_SIZE as usize {
            return None;
        }
        self.values.get(row * CANVAS_SIZE as usize + col).copied()
    }
}

/// 値を平均0・分散1に標準化する（母標準偏差）
///
/// 標準偏差が `DEGENERATE_STD` 以下なら割り算はせず、平均を引くだけにします。
/// 一様画像はすべて0になります。
pub fn standardize(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();

    if std > DEGENERATE_STD {
        for value in values.iter_mut() {
            *value = ((*value as f64 - mean) / std) as f32;
        }
    } else {
        for value in values.iter_mut() {
            *value = (*value as f64 - mean) as f32;
        }
    }
}

/// 分類器に渡す特徴量の長さを検証
pub fn check_input_len(values: &[f32]) -> Result<()> {
    if values.len() != INPUT_SIZE {
        return Err(DigitError::TensorLength {
            expected: INPUT_SIZE,
            actual: values.len(),
        });
    }
    Ok(())
}
