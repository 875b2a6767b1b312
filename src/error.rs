//! ライブラリ境界のエラー型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigitError {
    /// 呼び出し側の入力が不正（デコードできない画像、長さの合わないテンソルなど）
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tensor must hold {expected} values, got {actual}")]
    TensorLength { expected: usize, actual: usize },

    #[error("epochs must be at least 1")]
    InvalidEpochs,

    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    /// 分類器（外部の学習フレームワーク）が失敗した
    #[error("classifier error: {0:#}")]
    Classifier(anyhow::Error),

    #[error("checkpoint error: {0:#}")]
    Checkpoint(anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DigitError>;
