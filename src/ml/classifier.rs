//! 分類器の抽象
//!
//! ライフサイクル側は学習フレームワークを直接知らず、このトレイト越しに
//! 学習・推論・シリアライズを行います。

use serde::{Deserialize, Serialize};

use crate::ml::dataset::DigitDataset;
use crate::model::hyperparameters::Hyperparameters;

/// クラス数（数字 0〜9）
pub const NUM_CLASSES: usize = 10;

/// クラスごとの確率（合計はほぼ1）
pub type Probabilities = [f32; NUM_CLASSES];

/// 1エポック分の学習結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 通算エポック番号（1始まり）
    pub epoch: usize,
    /// 平均損失
    pub loss: f64,
    /// 学習データでの正解率
    pub accuracy: f64,
}

/// 学習可能な10クラス分類器
pub trait Classifier: Send {
    /// データセットを1周学習する
    fn fit_epoch(
        &mut self,
        data: &dyn DigitDataset,
        epoch: usize,
    ) -> anyhow::Result<EpochMetrics>;

    /// 長さ784の特徴量1件を推論
    fn infer(&self, features: &[f32]) -> anyhow::Result<Probabilities>;

    /// まとめて推論
    fn infer_batch(&self, batch: &[&[f32]]) -> anyhow::Result<Vec<Probabilities>> {
        batch.iter().map(|features| self.infer(features)).collect()
    }

    /// 重みをバイト列に書き出す
    fn to_bytes(&self) -> anyhow::Result<Vec<u8>>;

    /// `to_bytes` の出力から重みを復元する
    fn load_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()>;

    /// 構成の一行要約
    fn summary(&self) -> String;
}

/// ハイパーパラメータから新しい分類器を組み立てる
pub trait ClassifierFactory: Send + Sync {
    type Classifier: Classifier;

    fn build(&self, hyperparameters: &Hyperparameters) -> anyhow::Result<Self::Classifier>;
}

/// 最大確率のクラス
pub fn argmax(probabilities: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in probabilities.iter().enumerate() {
        if *value > probabilities[best] {
            best = index;
        }
    }
    best
}
