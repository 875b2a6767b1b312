//! チェックポイントのメタデータ
//!
//! tar.gz 内の `metadata.json` として保存されます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ml::classifier::EpochMetrics;
use crate::model::hyperparameters::Hyperparameters;

/// 現在のチェックポイント形式
pub const FORMAT_VERSION: u32 = 1;

/// チェックポイントのメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// 形式のバージョン
    pub format_version: u32,

    /// 重みを作ったときのハイパーパラメータ（読み込み時はこれで分類器を組み立てる）
    pub model_hyperparameters: Hyperparameters,

    /// 保存時点のハイパーパラメータ（チューニング済みで未リビルドなら上と異なる）
    pub current_hyperparameters: Hyperparameters,

    /// エポックごとの学習履歴
    #[serde(default)]
    pub history: Vec<EpochMetrics>,

    /// 保存時刻（RFC3339形式）
    pub saved_at: String,
}

impl CheckpointMetadata {
    pub fn new(
        model_hyperparameters: Hyperparameters,
        current_hyperparameters: Hyperparameters,
        history: Vec<EpochMetrics>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model_hyperparameters,
            current_hyperparameters,
            history,
            saved_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// 学習済みエポック数
    pub fn epochs(&self) -> usize {
        self.history.len()
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        let metadata: Self =
            serde_json::from_str(json).context("Failed to deserialize metadata from JSON")?;
        if metadata.format_version != FORMAT_VERSION {
            anyhow::bail!(
                "unsupported checkpoint format version {} (expected {})",
                metadata.format_version,
                FORMAT_VERSION
            );
        }
        Ok(metadata)
    }
}
