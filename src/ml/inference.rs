//! 推論結果

use serde::{Deserialize, Serialize};

use crate::ml::classifier::{argmax, Probabilities, NUM_CLASSES};

/// 予測候補の数
pub const TOP_K: usize = 3;

/// 1枚の画像に対する予測
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// 予測した数字
    pub class_id: usize,
    /// その確率
    pub confidence: f32,
    /// 全クラスの確率
    pub probabilities: Probabilities,
    /// 確率の高い順の上位3件 `(数字, 確率)`。同率は小さい数字が先
    pub top3: Vec<(usize, f32)>,
    /// 確信度がしきい値未満
    pub low_confidence: bool,
}

impl PredictionResult {
    /// 確率ベクトルから組み立てる。非有限値を含む場合は `None`
    pub fn from_probabilities(
        probabilities: Probabilities,
        low_confidence_threshold: f32,
    ) -> Option<Self> {
        if probabilities.iter().any(|p| !p.is_finite()) {
            return None;
        }

        let class_id = argmax(&probabilities);
        let confidence = probabilities[class_id];

        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        // sort_by は安定ソート
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(TOP_K.min(NUM_CLASSES));

        Some(Self {
            class_id,
            confidence,
            probabilities,
            top3: ranked,
            low_confidence: confidence < low_confidence_threshold,
        })
    }
}
