//! 学習サイクルの調整
//!
//! 学習 → 評価 をひとまとめにし、呼び出し側には成功・失敗どちらでも
//! 整形済みの結果を返します。

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::ml::classifier::{ClassifierFactory, EpochMetrics};
use crate::ml::dataset::DigitDataset;
use crate::model::hyperparameters::{HyperparameterUpdate, Hyperparameters};
use crate::model::lifecycle::ModelLifecycle;

/// 学習サイクルの評価結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// 学習にかかった時間（秒、切り捨て）
    pub training_time_seconds: u64,
    /// この呼び出しで学習したエポック数
    pub epochs: usize,
    /// 混同行列（テキスト表）
    pub confusion_matrix: String,
    pub per_class_precision: BTreeMap<usize, f64>,
    /// この呼び出しのエポックごとの結果
    pub history: Vec<EpochMetrics>,
}

/// 学習サイクルの結果（成功なら `metrics`、失敗なら `error`）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub success: bool,
    #[serde(flatten)]
    pub metrics: Option<TrainingMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingReport {
    fn succeeded(metrics: TrainingMetrics) -> Self {
        Self {
            success: true,
            metrics: Some(metrics),
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            metrics: None,
            error: Some(message),
        }
    }
}

/// モデルの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusReport {
    pub trained: bool,
    pub model_info: String,
}

/// 学習と評価の調整役
pub struct TrainingOrchestrator<F: ClassifierFactory> {
    lifecycle: Arc<ModelLifecycle<F>>,
    train_data: Arc<dyn DigitDataset>,
    eval_data: Arc<dyn DigitDataset>,
    eval_batch_size: usize,
    is_training: AtomicBool,
}

impl<F: ClassifierFactory> TrainingOrchestrator<F> {
    pub fn new(
        lifecycle: Arc<ModelLifecycle<F>>,
        train_data: Arc<dyn DigitDataset>,
        eval_data: Arc<dyn DigitDataset>,
        eval_batch_size: usize,
    ) -> Self {
        Self {
            lifecycle,
            train_data,
            eval_data,
            eval_batch_size: eval_batch_size.max(1),
            is_training: AtomicBool::new(false),
        }
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle<F>> {
        &self.lifecycle
    }

    /// `epochs` エポック学習して評価する。失敗もパニックも結果として返す
    pub fn run_training_cycle(&self, epochs: usize) -> TrainingReport {
        if self.is_training.swap(true, Ordering::SeqCst) {
            return TrainingReport::failed("training is already in progress".to_string());
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.train_and_evaluate(epochs)));
        self.is_training.store(false, Ordering::SeqCst);

        match outcome {
            Ok(Ok(metrics)) => {
                info!(
                    accuracy = metrics.accuracy,
                    f1 = metrics.f1,
                    seconds = metrics.training_time_seconds,
                    "学習サイクルが完了しました"
                );
                TrainingReport::succeeded(metrics)
            }
            Ok(Err(e)) => {
                error!("学習サイクルに失敗しました: {}", e);
                TrainingReport::failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("学習サイクル中にパニックしました: {}", message);
                TrainingReport::failed(format!("training panicked: {}", message))
            }
        }
    }

    fn train_and_evaluate(&self, epochs: usize) -> Result<TrainingMetrics> {
        let started = Instant::now();
        let history = self.lifecycle.train(epochs, self.train_data.as_ref())?;
        let training_time_seconds = started.elapsed().as_secs();

        let matrix = self
            .lifecycle
            .evaluate(self.eval_data.as_ref(), self.eval_batch_size)?;

        Ok(TrainingMetrics {
            accuracy: matrix.accuracy(),
            precision: matrix.macro_precision(),
            recall: matrix.macro_recall(),
            f1: matrix.macro_f1(),
            training_time_seconds,
            epochs,
            confusion_matrix: matrix.to_string(),
            per_class_precision: matrix.per_class_precision(),
            history,
        })
    }

    /// ハイパーパラメータを更新してリビルドする（学習結果は破棄される）
    pub fn tune_and_rebuild(&self, update: &HyperparameterUpdate) -> Result<Hyperparameters> {
        self.lifecycle.tune_and_rebuild(update)
    }

    pub fn model_status(&self) -> ModelStatusReport {
        ModelStatusReport {
            trained: self.lifecycle.is_trained(),
            model_info: self.lifecycle.model_info(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
