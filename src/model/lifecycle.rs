//! モデルのライフサイクル管理
//!
//! 分類器・ハイパーパラメータ・学習履歴をひとつの状態として所有し、
//! 起動時の復元、学習、推論、チューニング、リビルド、保存を受け持ちます。
//!
//! 状態遷移:
//! - 起動: チェックポイントを読めれば Trained、なければ（読めなければ）Untrained
//! - `train`: Untrained / Trained → Trained（履歴に追記）
//! - `rebuild` / `tune_and_rebuild`: 任意 → Untrained（重みと履歴を破棄）
//! - `save`: 状態は変わらない
//!
//! `train` / `tune_parameters` / `rebuild` / `tune_and_rebuild` は書き込みロック、
//! `predict` は読み込みロックで実行されます。

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{DigitError, Result};
use crate::ml::classifier::{argmax, Classifier, ClassifierFactory, EpochMetrics};
use crate::ml::dataset::DigitDataset;
use crate::ml::evaluation::ConfusionMatrix;
use crate::ml::inference::PredictionResult;
use crate::model::config::ModelSettings;
use crate::model::hyperparameters::{HyperparameterUpdate, Hyperparameters};
use crate::model::model_metadata::CheckpointMetadata;
use crate::model::model_storage;
use crate::preprocess::tensor::check_input_len;
use crate::preprocess::CanonicalTensor;

/// モデルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelStatus {
    Untrained,
    Trained,
}

/// 新規作成になった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshReason {
    /// チェックポイントが存在しない
    NoCheckpoint,
    /// 読み込みに失敗した（内容はエラーメッセージ）
    LoadFailed(String),
}

/// 起動時の初期化結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// チェックポイントから復元した
    Restored { path: PathBuf, epochs: usize },
    /// 新しいモデルを作った
    Fresh(FreshReason),
}

struct ModelState<C> {
    classifier: C,
    /// 現在の重みを作ったときのハイパーパラメータ
    built_from: Hyperparameters,
    /// 次のリビルドで使うハイパーパラメータ
    hyperparameters: Hyperparameters,
    status: ModelStatus,
    history: Vec<EpochMetrics>,
}

impl<C> ModelState<C> {
    fn fresh(classifier: C, hyperparameters: Hyperparameters) -> Self {
        Self {
            classifier,
            built_from: hyperparameters.clone(),
            hyperparameters,
            status: ModelStatus::Untrained,
            history: Vec::new(),
        }
    }
}

/// 分類器のライフサイクル
pub struct ModelLifecycle<F: ClassifierFactory> {
    factory: F,
    settings: ModelSettings,
    state: RwLock<ModelState<F::Classifier>>,
    startup: StartupOutcome,
}

impl<F: ClassifierFactory> ModelLifecycle<F> {
    /// チェックポイントから復元し、できなければ `defaults` で新規作成する
    ///
    /// チェックポイントの読み込み失敗はエラーにしません（ログに残して新規作成）。
    /// エラーになるのは新規作成そのものに失敗した場合だけです。
    pub fn load_or_create(
        factory: F,
        settings: ModelSettings,
        defaults: Hyperparameters,
    ) -> Result<Self> {
        let path = settings.checkpoint_path.clone();
        if !path.exists() {
            info!("チェックポイントがありません。新しいモデルを作成します: {}", path.display());
            return Self::create(factory, settings, defaults, FreshReason::NoCheckpoint);
        }

        match restore(&factory, &path) {
            Ok(state) => {
                let epochs = state.history.len();
                info!(
                    epochs,
                    "チェックポイントを読み込みました: {}",
                    path.display()
                );
                Ok(Self {
                    factory,
                    settings,
                    state: RwLock::new(state),
                    startup: StartupOutcome::Restored { path, epochs },
                })
            }
            Err(e) => {
                warn!(
                    "チェックポイントの読み込みに失敗しました ({}): {:#}。新しいモデルを作成します",
                    path.display(),
                    e
                );
                let reason = FreshReason::LoadFailed(format!("{:#}", e));
                Self::create(factory, settings, defaults, reason)
            }
        }
    }

    fn create(
        factory: F,
        settings: ModelSettings,
        hyperparameters: Hyperparameters,
        reason: FreshReason,
    ) -> Result<Self> {
        hyperparameters.validate()?;
        let classifier = factory
            .build(&hyperparameters)
            .map_err(DigitError::Classifier)?;
        info!("モデルを作成しました: {}", classifier.summary());
        Ok(Self {
            factory,
            settings,
            state: RwLock::new(ModelState::fresh(classifier, hyperparameters)),
            startup: StartupOutcome::Fresh(reason),
        })
    }

    /// 指定のハイパーパラメータで分類器を作り直す（Untrained になる）
    pub fn create_model(&self, hyperparameters: Hyperparameters) -> Result<()> {
        hyperparameters.validate()?;
        let classifier = self
            .factory
            .build(&hyperparameters)
            .map_err(DigitError::Classifier)?;
        info!("モデルを作成しました: {}", classifier.summary());
        *self.write() = ModelState::fresh(classifier, hyperparameters);
        Ok(())
    }

    /// `epochs` 回データセットを学習する
    ///
    /// `checkpoint_interval` エポックごとと最後に保存します（保存の失敗はログのみ）。
    /// 途中で分類器が失敗した場合はエラーを返し、それまでに完了したエポックの状態が残ります。
    pub fn train(&self, epochs: usize, data: &dyn DigitDataset) -> Result<Vec<EpochMetrics>> {
        if epochs == 0 {
            return Err(DigitError::InvalidEpochs);
        }

        let mut state = self.write();
        let interval = self.settings.checkpoint_interval;
        let mut completed = Vec::with_capacity(epochs);
        info!(epochs, samples = data.len(), "学習を開始します");

        for local in 1..=epochs {
            let epoch = state.history.len() + 1;
            let metrics = match state.classifier.fit_epoch(data, epoch) {
                Ok(metrics) => metrics,
                Err(e) => {
                    error!(epoch, "学習に失敗しました: {:#}", e);
                    return Err(DigitError::Classifier(e));
                }
            };

            info!(
                epoch,
                loss = metrics.loss,
                accuracy = metrics.accuracy,
                "エポック {}/{} 完了",
                local,
                epochs
            );
            state.history.push(metrics.clone());
            state.status = ModelStatus::Trained;
            completed.push(metrics);

            if interval > 0 && local % interval == 0 && local != epochs {
                self.save_state(&state);
            }
        }

        self.save_state(&state);
        Ok(completed)
    }

    /// 標準テンソル1枚を分類する
    ///
    /// 未学習でもエラーにはせず、警告を出して初期重みのまま推論します。
    pub fn predict(&self, tensor: &CanonicalTensor) -> Result<PredictionResult> {
        self.predict_values(tensor.as_slice())
    }

    /// 長さ784の特徴量を分類する
    pub fn predict_values(&self, values: &[f32]) -> Result<PredictionResult> {
        check_input_len(values)?;

        let state = self.read();
        if state.status == ModelStatus::Untrained {
            warn!("未学習のモデルで推論します（結果は信頼できません）");
        }
        let probabilities = state
            .classifier
            .infer(values)
            .map_err(DigitError::Classifier)?;

        let threshold = self.settings.low_confidence_threshold;
        PredictionResult::from_probabilities(probabilities, threshold).ok_or_else(|| {
            DigitError::Classifier(anyhow!("classifier returned non-finite probabilities"))
        })
    }

    /// ハイパーパラメータを部分更新する（リビルドはしない）
    pub fn tune_parameters(&self, update: &HyperparameterUpdate) -> Result<Hyperparameters> {
        let mut state = self.write();
        let next = state.hyperparameters.apply(update)?;
        info!(?update, "ハイパーパラメータを更新しました（次のリビルドで反映）");
        state.hyperparameters = next.clone();
        Ok(next)
    }

    /// 現在のハイパーパラメータで分類器を作り直す（重みと履歴を破棄）
    pub fn rebuild(&self) -> Result<Hyperparameters> {
        let mut state = self.write();
        let hyperparameters = state.hyperparameters.clone();
        let classifier = self
            .factory
            .build(&hyperparameters)
            .map_err(DigitError::Classifier)?;

        info!("モデルをリビルドしました: {}", classifier.summary());
        *state = ModelState::fresh(classifier, hyperparameters.clone());
        Ok(hyperparameters)
    }

    /// 部分更新とリビルドを1つの書き込みロックの中で行う
    ///
    /// 更新が不正な場合や分類器の作成に失敗した場合は、ハイパーパラメータも
    /// 重みも元のまま残ります。
    pub fn tune_and_rebuild(&self, update: &HyperparameterUpdate) -> Result<Hyperparameters> {
        let mut state = self.write();
        let next = state.hyperparameters.apply(update)?;
        let classifier = self
            .factory
            .build(&next)
            .map_err(DigitError::Classifier)?;

        info!(?update, "モデルをリビルドしました: {}", classifier.summary());
        *state = ModelState::fresh(classifier, next.clone());
        Ok(next)
    }

    /// 保存する（失敗はログに残すだけ）
    pub fn save(&self) {
        let state = self.read();
        self.save_state(&state);
    }

    /// 保存して、失敗ならエラーを返す
    pub fn try_save(&self) -> Result<PathBuf> {
        let state = self.read();
        self.write_checkpoint(&state)
    }

    fn save_state(&self, state: &ModelState<F::Classifier>) {
        match self.write_checkpoint(state) {
            Ok(path) => info!(
                epochs = state.history.len(),
                "チェックポイントを保存しました: {}",
                path.display()
            ),
            Err(e) => error!("チェックポイントの保存に失敗しました: {}", e),
        }
    }

    fn write_checkpoint(&self, state: &ModelState<F::Classifier>) -> Result<PathBuf> {
        let path = self.settings.checkpoint_path.clone();
        let binary = state
            .classifier
            .to_bytes()
            .map_err(DigitError::Checkpoint)?;
        let metadata = CheckpointMetadata::new(
            state.built_from.clone(),
            state.hyperparameters.clone(),
            state.history.clone(),
        );
        model_storage::save_checkpoint(&path, &metadata, &binary)
            .map_err(DigitError::Checkpoint)?;
        Ok(path)
    }

    /// データセット全体を分類して混同行列を作る
    pub fn evaluate(&self, data: &dyn DigitDataset, batch_size: usize) -> Result<ConfusionMatrix> {
        if data.is_empty() {
            return Err(DigitError::InvalidInput("evaluation dataset is empty".to_string()));
        }

        let state = self.read();
        let mut matrix = ConfusionMatrix::new();
        let indices: Vec<usize> = (0..data.len()).collect();

        for chunk in indices.chunks(batch_size.max(1)) {
            let samples = chunk
                .iter()
                .map(|index| {
                    data.get(*index).ok_or_else(|| {
                        DigitError::InvalidInput(format!("evaluation sample {} is missing", index))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let inputs: Vec<&[f32]> = samples.iter().map(|s| s.features.as_slice()).collect();
            let outputs = state
                .classifier
                .infer_batch(&inputs)
                .map_err(DigitError::Classifier)?;

            for (sample, probabilities) in samples.iter().zip(outputs.iter()) {
                matrix.record(sample.label as usize, argmax(probabilities));
            }
        }
        Ok(matrix)
    }

    /// 構成の要約
    pub fn model_info(&self) -> String {
        let state = self.read();
        let mut info = format!(
            "{} | {:?} | {} epochs",
            state.classifier.summary(),
            state.status,
            state.history.len()
        );
        if state.hyperparameters != state.built_from {
            info.push_str(" | ハイパーパラメータ変更あり（未リビルド）");
        }
        info
    }

    /// 現在のハイパーパラメータ
    pub fn current_parameters(&self) -> Hyperparameters {
        self.read().hyperparameters.clone()
    }

    pub fn status(&self) -> ModelStatus {
        self.read().status
    }

    pub fn is_trained(&self) -> bool {
        self.status() == ModelStatus::Trained
    }

    /// 学習履歴
    pub fn history(&self) -> Vec<EpochMetrics> {
        self.read().history.clone()
    }

    pub fn startup_outcome(&self) -> &StartupOutcome {
        &self.startup
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.settings.checkpoint_path
    }

    // ロックが汚染されても状態自体は整合しているので、そのまま使う
    fn read(&self) -> RwLockReadGuard<'_, ModelState<F::Classifier>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelState<F::Classifier>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// チェックポイントから状態を組み立てる
fn restore<F: ClassifierFactory>(
    factory: &F,
    path: &Path,
) -> anyhow::Result<ModelState<F::Classifier>> {
    let (metadata, binary) = model_storage::load_checkpoint(path)?;
    metadata.model_hyperparameters.validate()?;
    let mut classifier = factory.build(&metadata.model_hyperparameters)?;
    classifier.load_bytes(&binary)?;

    Ok(ModelState {
        classifier,
        built_from: metadata.model_hyperparameters,
        hyperparameters: metadata.current_hyperparameters,
        status: ModelStatus::Trained,
        history: metadata.history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::testing::StubFactory;
    use crate::ml::dataset::{DigitSample, InMemoryDataset};
    use crate::preprocess::INPUT_SIZE;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn settings(dir: &Path) -> ModelSettings {
        ModelSettings {
            checkpoint_path: dir.join("models/mnist-model.tar.gz"),
            ..ModelSettings::default()
        }
    }

    fn dataset() -> InMemoryDataset {
        let samples = (0..20)
            .map(|i| {
                let label = (i % 10) as u8;
                let mut features = vec![0.0f32; INPUT_SIZE];
                features[label as usize] = 1.0;
                DigitSample { features, label }
            })
            .collect();
        InMemoryDataset::new(samples).unwrap()
    }

    fn lifecycle(dir: &Path, factory: StubFactory) -> ModelLifecycle<StubFactory> {
        ModelLifecycle::load_or_create(factory, settings(dir), Hyperparameters::default()).unwrap()
    }

    #[test]
    fn test_missing_checkpoint_starts_untrained() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());

        assert_eq!(lc.startup_outcome(), &StartupOutcome::Fresh(FreshReason::NoCheckpoint));
        assert_eq!(lc.status(), ModelStatus::Untrained);
        assert!(lc.history().is_empty());
    }

    #[test]
    fn test_corrupt_checkpoint_falls_back_to_fresh_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings(dir.path()).checkpoint_path;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"corrupted").unwrap();

        let lc = lifecycle(dir.path(), StubFactory::default());
        assert!(matches!(
            lc.startup_outcome(),
            StartupOutcome::Fresh(FreshReason::LoadFailed(_))
        ));
        assert!(!lc.is_trained());
    }

    #[test]
    fn test_predict_on_untrained_model_returns_distribution() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());

        let result = lc.predict_values(&vec![0.0; INPUT_SIZE]).unwrap();
        let sum: f32 = result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(result.top3.len(), 3);
        assert!(result.top3.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(result.low_confidence);
    }

    #[test]
    fn test_predict_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        assert!(matches!(
            lc.predict_values(&[0.0; 100]),
            Err(DigitError::TensorLength { expected: 784, actual: 100 })
        ));
    }

    #[test]
    fn test_train_then_restore_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let data = dataset();
        let sample_features = data.get(3).unwrap().features;

        let lc = lifecycle(dir.path(), StubFactory::default());
        let metrics = lc.train(2, &data).unwrap();
        assert_eq!(metrics.iter().map(|m| m.epoch).collect::<Vec<_>>(), vec![1, 2]);
        assert!(lc.is_trained());
        assert!(lc.checkpoint_path().exists());
        let before = lc.predict_values(&sample_features).unwrap();
        assert_eq!(before.class_id, 3);

        let restored = lifecycle(dir.path(), StubFactory::default());
        assert_eq!(
            restored.startup_outcome(),
            &StartupOutcome::Restored {
                path: lc.checkpoint_path().to_path_buf(),
                epochs: 2
            }
        );
        assert!(restored.is_trained());
        assert_eq!(restored.history(), lc.history());
        assert_eq!(restored.predict_values(&sample_features).unwrap(), before);

        // 続きから学習するとエポック番号が続く
        let more = restored.train(1, &data).unwrap();
        assert_eq!(more[0].epoch, 3);
    }

    #[test]
    fn test_zero_epochs_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        assert!(matches!(lc.train(0, &dataset()), Err(DigitError::InvalidEpochs)));
        assert!(!lc.is_trained());
        assert!(!lc.checkpoint_path().exists());
    }

    #[test]
    fn test_tune_is_partial_and_rebuild_resets_training() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        lc.train(1, &dataset()).unwrap();

        let update = HyperparameterUpdate {
            learning_rate: Some(0.01),
            hidden_layer_sizes: Some(vec![32]),
            ..Default::default()
        };
        let tuned = lc.tune_parameters(&update).unwrap();
        assert_eq!(lc.current_parameters(), tuned);
        assert_eq!(tuned.learning_rate, 0.01);
        assert_eq!(tuned.batch_size, Hyperparameters::default().batch_size);

        // リビルドするまではモデルは変わらない
        assert!(lc.is_trained());
        assert!(lc.model_info().contains("[128, 64]"));

        let rebuilt = lc.rebuild().unwrap();
        assert_eq!(rebuilt, tuned);
        assert!(!lc.is_trained());
        assert!(lc.history().is_empty());
        assert!(lc.model_info().contains("[32]"));
    }

    #[test]
    fn test_invalid_tuning_keeps_previous_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        let update = HyperparameterUpdate {
            batch_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            lc.tune_parameters(&update),
            Err(DigitError::InvalidHyperparameters(_))
        ));
        assert_eq!(lc.current_parameters(), Hyperparameters::default());
    }

    #[test]
    fn test_failure_mid_training_keeps_completed_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let factory = StubFactory {
            fail_at_epoch: Some(5),
            ..Default::default()
        };
        let lc = lifecycle(dir.path(), factory.clone());

        let err = lc.train(7, &dataset()).unwrap_err();
        assert!(matches!(err, DigitError::Classifier(_)));
        assert_eq!(lc.history().len(), 4);
        assert!(lc.is_trained());

        // 3エポック目の途中保存だけが残っている
        let restored = lifecycle(dir.path(), factory);
        assert!(matches!(
            restored.startup_outcome(),
            StartupOutcome::Restored { epochs: 3, .. }
        ));
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let settings = ModelSettings {
            checkpoint_path: blocker.join("model.tar.gz"),
            ..ModelSettings::default()
        };
        let lc = ModelLifecycle::load_or_create(
            StubFactory::default(),
            settings,
            Hyperparameters::default(),
        )
        .unwrap();

        lc.save();
        assert!(matches!(lc.try_save(), Err(DigitError::Checkpoint(_))));
        // 保存できなくても学習と推論は使える
        lc.train(1, &dataset()).unwrap();
        assert!(lc.is_trained());
        assert!(lc.predict_values(&vec![0.0; INPUT_SIZE]).is_ok());
    }

    #[test]
    fn test_tuned_parameters_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        lc.train(1, &dataset()).unwrap();
        lc.tune_parameters(&HyperparameterUpdate {
            rng_seed: Some(7),
            ..Default::default()
        })
        .unwrap();
        lc.save();

        let restored = lifecycle(dir.path(), StubFactory::default());
        assert_eq!(restored.current_parameters().rng_seed, 7);
        assert!(restored.is_trained());
    }

    #[test]
    fn test_build_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let factory = StubFactory::default();
        factory.set_fail_build(true);
        let result = ModelLifecycle::load_or_create(
            factory,
            settings(dir.path()),
            Hyperparameters::default(),
        );
        assert!(matches!(result, Err(DigitError::Classifier(_))));
    }

    #[test]
    fn test_evaluate_builds_confusion_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        let data = dataset();
        lc.train(1, &data).unwrap();

        let matrix = lc.evaluate(&data, 7).unwrap();
        assert_eq!(matrix.total(), 20);
        assert_eq!(matrix.accuracy(), 1.0);
        assert!(lc.evaluate(&InMemoryDataset::default(), 7).is_err());
    }

    #[test]
    fn test_concurrent_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let lc = Arc::new(lifecycle(dir.path(), StubFactory::default()));
        lc.train(1, &dataset()).unwrap();

        std::thread::scope(|scope| {
            for digit in 0..4 {
                let lc = Arc::clone(&lc);
                scope.spawn(move || {
                    let mut features = vec![0.0f32; INPUT_SIZE];
                    features[digit] = 1.0;
                    assert_eq!(lc.predict_values(&features).unwrap().class_id, digit);
                });
            }
        });
    }

    #[test]
    fn test_create_model_replaces_state() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        lc.train(1, &dataset()).unwrap();

        let hp = Hyperparameters {
            hidden_layer_sizes: vec![10],
            ..Default::default()
        };
        lc.create_model(hp.clone()).unwrap();
        assert!(!lc.is_trained());
        assert_eq!(lc.current_parameters(), hp);
    }

    #[test]
    fn test_any_loadable_checkpoint_restores_as_trained() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        lc.try_save().unwrap();

        let restored = lifecycle(dir.path(), StubFactory::default());
        assert!(matches!(
            restored.startup_outcome(),
            StartupOutcome::Restored { epochs: 0, .. }
        ));
        assert_eq!(restored.status(), ModelStatus::Trained);
        assert!(restored.history().is_empty());
    }

    #[test]
    fn test_tune_and_rebuild_applies_update_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let lc = lifecycle(dir.path(), StubFactory::default());
        lc.train(1, &dataset()).unwrap();

        let update = HyperparameterUpdate {
            hidden_layer_sizes: Some(vec![48]),
            ..Default::default()
        };
        let params = lc.tune_and_rebuild(&update).unwrap();
        assert_eq!(params.hidden_layer_sizes, vec![48]);
        assert_eq!(lc.current_parameters(), params);
        assert!(!lc.is_trained());
        assert!(lc.history().is_empty());
        assert!(lc.model_info().contains("[48]"));
        assert!(!lc.model_info().contains("未リビルド"));
    }

    #[test]
    fn test_tune_and_rebuild_build_failure_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let factory = StubFactory::default();
        let lc = lifecycle(dir.path(), factory.clone());
        lc.train(1, &dataset()).unwrap();
        let info_before = lc.model_info();

        factory.set_fail_build(true);
        let update = HyperparameterUpdate {
            hidden_layer_sizes: Some(vec![16]),
            ..Default::default()
        };
        assert!(matches!(
            lc.tune_and_rebuild(&update),
            Err(DigitError::Classifier(_))
        ));

        assert_eq!(lc.current_parameters(), Hyperparameters::default());
        assert!(lc.is_trained());
        assert_eq!(lc.history().len(), 1);
        assert_eq!(lc.model_info(), info_before);
    }
}
