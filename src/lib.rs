//! 手書き数字認識
//!
//! - [`preprocess`]: 任意のビットマップ → 28x28 標準テンソル
//! - [`model::ModelLifecycle`]: 分類器の作成・復元・学習・推論・チューニング・保存
//! - [`orchestrator::TrainingOrchestrator`]: 学習 → 評価 のサイクル

pub mod error;
pub mod logging;
pub mod ml;
pub mod model;
pub mod orchestrator;
pub mod preprocess;

pub use error::{DigitError, Result};
pub use ml::{ConfusionMatrix, PredictionResult};
pub use model::{AppConfig, HyperparameterUpdate, Hyperparameters, ModelLifecycle, ModelStatus};
pub use orchestrator::{TrainingOrchestrator, TrainingReport};
pub use preprocess::{CanonicalTensor, ImageNormalizer};
