//! アプリケーション設定管理モジュール
//!
//! チェックポイントの場所、学習・前処理の設定、既定のハイパーパラメータを
//! JSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::hyperparameters::Hyperparameters;
use crate::preprocess::AugmentationSettings;

/// モデル設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// チェックポイント（tar.gz）のパス
    pub checkpoint_path: PathBuf,
    /// 何エポックごとに途中保存するか（0なら学習終了時のみ）
    pub checkpoint_interval: usize,
    /// これ未満の確信度の予測に低確信度フラグを立てる
    pub low_confidence_threshold: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("models/mnist-model.tar.gz"),
            checkpoint_interval: 3,
            low_confidence_threshold: 0.7,
        }
    }
}

/// トレーニング設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// エポック数（CLIで省略されたとき）
    pub default_epochs: usize,
    /// 評価時のバッチサイズ
    pub eval_batch_size: usize,
    /// IDX形式のMNISTファイルを置いたディレクトリ（未指定ならダウンロード）
    pub data_dir: Option<PathBuf>,
    /// データ水増し
    pub augmentation: AugmentationSettings,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            default_epochs: 15,
            eval_batch_size: 64,
            data_dir: None,
            augmentation: AugmentationSettings::default(),
        }
    }
}

/// 前処理設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// ガウシアンぼかしの半径（0でぼかしなし）
    pub blur_radius: u32,
    /// クロージングの反復回数
    pub closing_iterations: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            blur_radius: 1,
            closing_iterations: 1,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// モデル設定
    pub model: ModelSettings,
    /// トレーニング設定
    pub training: TrainingSettings,
    /// 前処理設定
    pub preprocess: PreprocessSettings,
    /// モデルを新規作成するときのハイパーパラメータ
    pub hyperparameters: Hyperparameters,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.hyperparameters.validate()?;
        Ok(config)
    }

    /// 設定を読み込む、存在しない・読めない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {:#}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("設定ファイルを保存しました: {}", path.display());
        Ok(())
    }

    /// 設定情報の要約（複数行）
    pub fn describe(&self) -> String {
        [
            "=== アプリケーション設定 ===".to_string(),
            format!("チェックポイント: {}", self.model.checkpoint_path.display()),
            format!("途中保存の間隔: {} エポック", self.model.checkpoint_interval),
            format!("低確信度しきい値: {}", self.model.low_confidence_threshold),
            format!("既定エポック数: {}", self.training.default_epochs),
            format!("水増し: {}", if self.training.augmentation.enabled { "有効" } else { "無効" }),
            format!(
                "前処理: ぼかし半径 {}, クロージング {} 回",
                self.preprocess.blur_radius, self.preprocess.closing_iterations
            ),
            format!("隠れ層: {:?}", self.hyperparameters.hidden_layer_sizes),
        ]
        .join("\n")
    }
}
