//! ハイパーパラメータのスナップショットと部分更新

use serde::{Deserialize, Serialize};

use crate::error::{DigitError, Result};

/// ハイパーパラメータ（不変スナップショット）
///
/// 更新は [`Hyperparameters::apply`] で新しいスナップショットを作って置き換えます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hyperparameters {
    /// 学習率
    pub learning_rate: f64,
    /// バッチサイズ
    pub batch_size: usize,
    /// 隠れ層の幅（入力側から順に）
    pub hidden_layer_sizes: Vec<usize>,
    /// 隠れ層ごとのドロップアウト率。足りない層は0、余りは無視
    pub dropout_rates: Vec<f64>,
    /// L2正則化係数
    pub l2_regularization: f64,
    /// 乱数シード
    pub rng_seed: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 64,
            hidden_layer_sizes: vec![128, 64],
            dropout_rates: vec![0.0, 0.0],
            l2_regularization: 0.0,
            rng_seed: 123,
        }
    }
}

impl Hyperparameters {
    /// 値の範囲を検証
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid(format!("learningRate must be > 0, got {}", self.learning_rate)));
        }
        if self.batch_size == 0 {
            return Err(invalid("batchSize must be at least 1".to_string()));
        }
        if self.hidden_layer_sizes.iter().any(|size| *size == 0) {
            return Err(invalid(format!(
                "hiddenLayerSizes must be positive, got {:?}",
                self.hidden_layer_sizes
            )));
        }
        if let Some(rate) = self
            .dropout_rates
            .iter()
            .find(|rate| !(0.0..1.0).contains(*rate))
        {
            return Err(invalid(format!("dropoutRates must be in [0, 1), got {}", rate)));
        }
        if !(self.l2_regularization.is_finite() && self.l2_regularization >= 0.0) {
            return Err(invalid(format!(
                "l2Regularization must be >= 0, got {}",
                self.l2_regularization
            )));
        }
        Ok(())
    }

    /// 指定された項目だけを上書きした新しいスナップショット（検証済み）を返す
    pub fn apply(&self, update: &HyperparameterUpdate) -> Result<Self> {
        let next = Self {
            learning_rate: update.learning_rate.unwrap_or(self.learning_rate),
            batch_size: update.batch_size.unwrap_or(self.batch_size),
            hidden_layer_sizes: update
                .hidden_layer_sizes
                .clone()
                .unwrap_or_else(|| self.hidden_layer_sizes.clone()),
            dropout_rates: update
                .dropout_rates
                .clone()
                .unwrap_or_else(|| self.dropout_rates.clone()),
            l2_regularization: update.l2_regularization.unwrap_or(self.l2_regularization),
            rng_seed: update.rng_seed.unwrap_or(self.rng_seed),
        };
        next.validate()?;
        Ok(next)
    }

    /// `layer` 番目の隠れ層のドロップアウト率
    pub fn dropout_for(&self, layer: usize) -> f64 {
        self.dropout_rates.get(layer).copied().unwrap_or(0.0)
    }
}

fn invalid(message: String) -> DigitError {
    DigitError::InvalidHyperparameters(message)
}

/// ハイパーパラメータの部分更新
///
/// 指定のない項目（`None`）は現在値を引き継ぎます。未知のキーは無視します。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperparameterUpdate {
    pub learning_rate: Option<f64>,
    pub batch_size: Option<usize>,
    pub hidden_layer_sizes: Option<Vec<usize>>,
    pub dropout_rates: Option<Vec<f64>>,
    pub l2_regularization: Option<f64>,
    pub rng_seed: Option<u64>,
}

impl HyperparameterUpdate {
    /// JSONペイロードから読み込む
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| invalid(format!("hyperparameter payload is not valid JSON: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// `key=value` 形式の1項目を取り込む（CLI用）
    ///
    /// リストは `128,64` のようにカンマ区切り。未知のキーは警告して無視します。
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected key=value, got '{}'", assignment)))?;
        let value = value.trim();

        match key.trim() {
            "learningRate" => self.learning_rate = Some(parse(key, value)?),
            "batchSize" => self.batch_size = Some(parse(key, value)?),
            "hiddenLayerSizes" => self.hidden_layer_sizes = Some(parse_list(key, value)?),
            "dropoutRates" => self.dropout_rates = Some(parse_list(key, value)?),
            "l2Regularization" => self.l2_regularization = Some(parse(key, value)?),
            "rngSeed" => self.rng_seed = Some(parse(key, value)?),
            other => tracing::warn!(key = other, "未知のハイパーパラメータを無視します"),
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| invalid(format!("{}: cannot parse '{}': {}", key, value, e)))
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value.split(',').map(|part| parse(key, part.trim())).collect()
}
