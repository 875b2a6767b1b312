//! 数字分類用の多層パーセプトロン
//!
//! 784 → 隠れ層（幅はハイパーパラメータ） → 10 の全結合ネットワーク。

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{Dropout, DropoutConfig, Linear, Relu},
    tensor::{backend::Backend, Tensor, TensorData},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ml::classifier::NUM_CLASSES;
use crate::model::hyperparameters::Hyperparameters;
use crate::preprocess::INPUT_SIZE;

/// モデル設定
#[derive(Config, Debug)]
pub struct DigitMlpConfig {
    /// 隠れ層の幅
    pub hidden_sizes: Vec<usize>,
    /// 隠れ層ごとのドロップアウト率
    pub dropout_rates: Vec<f64>,
    /// 重み初期化のシード
    #[config(default = 123)]
    pub seed: u64,
    #[config(default = 784)]
    pub input_size: usize,
    #[config(default = 10)]
    pub num_classes: usize,
}

impl DigitMlpConfig {
    pub fn from_hyperparameters(hp: &Hyperparameters) -> Self {
        let dropout_rates = (0..hp.hidden_layer_sizes.len())
            .map(|layer| hp.dropout_for(layer))
            .collect();
        Self::new(hp.hidden_layer_sizes.clone(), dropout_rates)
            .with_seed(hp.rng_seed)
            .with_input_size(INPUT_SIZE)
            .with_num_classes(NUM_CLASSES)
    }

    /// モデルを初期化（Xavier一様分布、同じシードなら同じ重み）
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitMlp<B> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut hidden = Vec::with_capacity(self.hidden_sizes.len());
        let mut dropouts = Vec::with_capacity(self.hidden_sizes.len());
        let mut fan_in = self.input_size;
        for (layer, width) in self.hidden_sizes.iter().enumerate() {
            hidden.push(xavier_linear::<B>(&mut rng, device, fan_in, *width));
            let rate = self.dropout_rates.get(layer).copied().unwrap_or(0.0);
            dropouts.push(DropoutConfig::new(rate).init());
            fan_in = *width;
        }

        DigitMlp {
            hidden,
            dropouts,
            output: xavier_linear::<B>(&mut rng, device, fan_in, self.num_classes),
            activation: Relu::new(),
        }
    }
}

/// 数字分類モデル
///
/// # アーキテクチャ
/// - {Linear + ReLU + Dropout} x 隠れ層数
/// - Linear: 最後の隠れ層 -> 10
/// - Softmax（推論時）
#[derive(Module, Debug)]
pub struct DigitMlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    dropouts: Vec<Dropout>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> DigitMlp<B> {
    /// 順伝播
    ///
    /// - `inputs`: [batch_size, 784]
    /// - 戻り値: ロジット [batch_size, 10]
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = inputs;
        for (linear, dropout) in self.hidden.iter().zip(self.dropouts.iter()) {
            x = linear.forward(x);
            x = self.activation.forward(x);
            x = dropout.forward(x);
        }
        self.output.forward(x)
    }

    /// 層構成の要約（例: `784-128-64-10`）
    pub fn describe(&self) -> String {
        let first = self.hidden.first().unwrap_or(&self.output);
        let mut widths = vec![first.weight.dims()[0]];
        for linear in self.hidden.iter().chain(std::iter::once(&self.output)) {
            widths.push(linear.weight.dims()[1]);
        }
        widths
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

fn xavier_linear<B: Backend>(
    rng: &mut StdRng,
    device: &B::Device,
    fan_in: usize,
    fan_out: usize,
) -> Linear<B> {
    let limit = (6.0f32 / (fan_in + fan_out) as f32).sqrt();
    let weights: Vec<f32> = (0..fan_in * fan_out)
        .map(|_| rng.gen_range(-limit..=limit))
        .collect();

    Linear {
        weight: Param::from_tensor(Tensor::<B, 2>::from_floats(
            TensorData::new(weights, [fan_in, fan_out]),
            device,
        )),
        bias: Some(Param::from_tensor(Tensor::<B, 1>::zeros([fan_out], device))),
    }
}
