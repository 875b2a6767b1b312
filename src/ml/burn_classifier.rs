//! Burn（NdArray + Autodiff）による分類器の実装

use anyhow::{anyhow, bail, Result};
use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{
        adaptor::OptimizerAdaptor, decay::WeightDecayConfig, Adam, AdamConfig, GradientsParams,
        Optimizer,
    },
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{
        activation::softmax, backend::Backend, ElementConversion, Int, Tensor, TensorData,
    },
};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::ml::classifier::{
    Classifier, ClassifierFactory, EpochMetrics, Probabilities, NUM_CLASSES,
};
use crate::ml::dataset::DigitDataset;
use crate::ml::ml_model::{DigitMlp, DigitMlpConfig};
use crate::model::hyperparameters::Hyperparameters;
use crate::preprocess::tensor::check_input_len;
use crate::preprocess::{AugmentationSettings, Augmenter, INPUT_SIZE};

/// 推論用バックエンド
pub type InferBackend = NdArray;

/// 学習用バックエンド
pub type TrainBackend = Autodiff<NdArray>;

type MlpOptimizer = OptimizerAdaptor<Adam, DigitMlp<TrainBackend>, TrainBackend>;

fn adam(hyperparameters: &Hyperparameters) -> MlpOptimizer {
    AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(
            hyperparameters.l2_regularization as f32,
        )))
        .init()
}

/// Burn の多層パーセプトロンを包んだ分類器
///
/// Adam のモーメントはエポックをまたいで保持し、分類器を作り直したときだけ初期化されます。
pub struct BurnClassifier {
    model: DigitMlp<TrainBackend>,
    optimizer: MlpOptimizer,
    hyperparameters: Hyperparameters,
    augmentation: AugmentationSettings,
    device: NdArrayDevice,
}

impl BurnClassifier {
    pub fn new(
        hyperparameters: &Hyperparameters,
        augmentation: AugmentationSettings,
        device: NdArrayDevice,
    ) -> Self {
        let model = DigitMlpConfig::from_hyperparameters(hyperparameters).init(&device);
        Self {
            model,
            optimizer: adam(hyperparameters),
            hyperparameters: hyperparameters.clone(),
            augmentation,
            device,
        }
    }

    /// 学習データから1バッチ分のテンソルを作る
    fn batch_tensors(
        &self,
        data: &dyn DigitDataset,
        indices: &[usize],
        augmenter: &mut Augmenter,
    ) -> Result<(Tensor<TrainBackend, 2>, Tensor<TrainBackend, 1, Int>)> {
        let mut images = Vec::with_capacity(indices.len() * INPUT_SIZE);
        let mut labels = Vec::with_capacity(indices.len());

        for index in indices {
            let mut sample = data
                .get(*index)
                .ok_or_else(|| anyhow!("データセットのインデックス {} が範囲外です", index))?;
            check_input_len(&sample.features)?;
            augmenter.apply(&mut sample.features);
            images.extend_from_slice(&sample.features);
            labels.push(sample.label as i64);
        }

        let images = Tensor::<TrainBackend, 2>::from_floats(
            TensorData::new(images, [indices.len(), INPUT_SIZE]),
            &self.device,
        );
        let labels = Tensor::<TrainBackend, 1, Int>::from_ints(
            TensorData::new(labels, [indices.len()]),
            &self.device,
        );
        Ok((images, labels))
    }

    /// 全バッチを1周する。戻り値は (更新後のモデル, 損失の合計, 正解数)
    fn run_batches(
        &mut self,
        data: &dyn DigitDataset,
        indices: &[usize],
        epoch: usize,
    ) -> Result<(DigitMlp<TrainBackend>, f64, usize)> {
        let hp = self.hyperparameters.clone();
        let mut augmenter =
            Augmenter::new(self.augmentation.clone(), hp.rng_seed.wrapping_add(epoch as u64));
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);

        let mut model = self.model.clone();
        let mut total_loss = 0.0f64;
        let mut correct = 0usize;

        for chunk in indices.chunks(hp.batch_size) {
            let (images, labels) = self.batch_tensors(data, chunk, &mut augmenter)?;
            let logits = model.forward(images);
            let loss = loss_fn.forward(logits.clone(), labels.clone());

            let batch_loss = loss.clone().into_scalar().elem::<f64>();
            if !batch_loss.is_finite() {
                bail!("損失が発散しました (epoch {})", epoch);
            }
            total_loss += batch_loss * chunk.len() as f64;
            correct += count_correct(logits, labels)?;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = self.optimizer.step(hp.learning_rate, model, grads);
        }

        Ok((model, total_loss, correct))
    }
}

impl Classifier for BurnClassifier {
    fn fit_epoch(&mut self, data: &dyn DigitDataset, epoch: usize) -> Result<EpochMetrics> {
        if data.is_empty() {
            bail!("学習データが空です");
        }

        let mut rng = StdRng::seed_from_u64(self.hyperparameters.rng_seed ^ epoch as u64);
        let mut indices: Vec<usize> = (0..data.len()).collect();
        indices.shuffle(&mut rng);

        // 失敗時はモデルをエポック開始前のまま残し、途中まで進んだモーメントは捨てる
        let (model, total_loss, correct) = match self.run_batches(data, &indices, epoch) {
            Ok(result) => result,
            Err(e) => {
                self.optimizer = adam(&self.hyperparameters);
                return Err(e);
            }
        };
        self.model = model;

        let metrics = EpochMetrics {
            epoch,
            loss: total_loss / data.len() as f64,
            accuracy: correct as f64 / data.len() as f64,
        };
        debug!(
            epoch,
            loss = metrics.loss,
            accuracy = metrics.accuracy,
            "エポック完了"
        );
        Ok(metrics)
    }

    fn infer(&self, features: &[f32]) -> Result<Probabilities> {
        let mut batch = self.infer_batch(&[features])?;
        batch
            .pop()
            .ok_or_else(|| anyhow!("推論結果が空です"))
    }

    fn infer_batch(&self, batch: &[&[f32]]) -> Result<Vec<Probabilities>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut values = Vec::with_capacity(batch.len() * INPUT_SIZE);
        for features in batch {
            check_input_len(features)?;
            values.extend_from_slice(features);
        }

        let model = self.model.valid();
        let inputs = Tensor::<InferBackend, 2>::from_floats(
            TensorData::new(values, [batch.len(), INPUT_SIZE]),
            &self.device,
        );
        let probabilities = softmax(model.forward(inputs), 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("推論結果の取得エラー: {:?}", e))?;

        Ok(probabilities
            .chunks_exact(NUM_CLASSES)
            .map(|row| {
                let mut out = [0.0f32; NUM_CLASSES];
                out.copy_from_slice(row);
                out
            })
            .collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        recorder
            .record(self.model.clone().into_record(), ())
            .map_err(|e| anyhow!("モデル重みの書き出しエラー: {:?}", e))
    }

    fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let expected = self.model.num_params();
        let record = recorder
            .load(bytes.to_vec(), &self.device)
            .map_err(|e| anyhow!("モデル重みの読み込みエラー: {:?}", e))?;

        let model = self.model.clone().load_record(record);
        if model.num_params() != expected {
            bail!(
                "パラメータ数が一致しません: 期待 {}, 実際 {}",
                expected,
                model.num_params()
            );
        }
        self.model = model;
        Ok(())
    }

    fn summary(&self) -> String {
        format!(
            "MLP {} ({} params, dropout {:?}, l2 {}, lr {}, batch {})",
            self.model.describe(),
            self.model.num_params(),
            self.hyperparameters.dropout_rates,
            self.hyperparameters.l2_regularization,
            self.hyperparameters.learning_rate,
            self.hyperparameters.batch_size
        )
    }
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Result<usize> {
    let predicted = logits
        .argmax(1)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("予測の取得エラー: {:?}", e))?;
    let labels = labels
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("ラベルの取得エラー: {:?}", e))?;

    Ok(predicted
        .iter()
        .zip(labels.iter())
        .filter(|(p, l)| p == l)
        .count())
}

/// [`BurnClassifier`] を作るファクトリ
#[derive(Debug, Clone, Default)]
pub struct BurnClassifierFactory {
    pub augmentation: AugmentationSettings,
}

impl BurnClassifierFactory {
    pub fn new(augmentation: AugmentationSettings) -> Self {
        Self { augmentation }
    }
}

impl ClassifierFactory for BurnClassifierFactory {
    type Classifier = BurnClassifier;

    fn build(&self, hyperparameters: &Hyperparameters) -> Result<BurnClassifier> {
        hyperparameters.validate()?;
        Ok(BurnClassifier::new(
            hyperparameters,
            self.augmentation.clone(),
            NdArrayDevice::Cpu,
        ))
    }
}
