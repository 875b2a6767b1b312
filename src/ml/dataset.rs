//! 学習・評価用データセット

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};

use crate::error::{DigitError, Result};
use crate::ml::classifier::NUM_CLASSES;
use crate::preprocess::{standardize, INPUT_SIZE};

/// 標準化済み特徴量とラベル
#[derive(Debug, Clone, PartialEq)]
pub struct DigitSample {
    pub features: Vec<f32>,
    pub label: u8,
}

/// ランダムアクセス可能なラベル付きサンプル列
pub trait DigitDataset: Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<DigitSample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// メモリ上のデータセット
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    samples: Vec<DigitSample>,
}

impl InMemoryDataset {
    /// 特徴量の長さとラベルの範囲を検証して作る
    pub fn new(samples: Vec<DigitSample>) -> Result<Self> {
        for (index, sample) in samples.iter().enumerate() {
            if sample.features.len() != INPUT_SIZE {
                return Err(DigitError::InvalidInput(format!(
                    "sample {} has {} features, expected {}",
                    index,
                    sample.features.len(),
                    INPUT_SIZE
                )));
            }
            if sample.label as usize >= NUM_CLASSES {
                return Err(DigitError::InvalidInput(format!(
                    "sample {} has label {}",
                    index, sample.label
                )));
            }
        }
        Ok(Self { samples })
    }
}

impl DigitDataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Option<DigitSample> {
        self.samples.get(index).cloned()
    }
}

/// MNIST のどちらの分割か
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn file_names(self) -> (&'static str, &'static str) {
        match self {
            Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
            Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
        }
    }
}

const IDX_IMAGES_MAGIC: u32 = 2051;
const IDX_LABELS_MAGIC: u32 = 2049;

/// 展開済みの IDX ファイル（`train-images-idx3-ubyte` など）を置いたディレクトリから読み込む
///
/// 画素は 0〜1 に縮めたあと画像ごとに標準化します。
pub fn load_idx_dir(
    dir: &Path,
    split: Split,
    limit: Option<usize>,
) -> anyhow::Result<InMemoryDataset> {
    let (images_name, labels_name) = split.file_names();
    let images = fs::read(dir.join(images_name))
        .with_context(|| format!("Failed to read {}", dir.join(images_name).display()))?;
    let labels = fs::read(dir.join(labels_name))
        .with_context(|| format!("Failed to read {}", dir.join(labels_name).display()))?;
    parse_idx(&images, &labels, limit)
}

fn parse_idx(
    images: &[u8],
    labels: &[u8],
    limit: Option<usize>,
) -> anyhow::Result<InMemoryDataset> {
    let read_u32 = |bytes: &[u8], offset: usize| -> anyhow::Result<u32> {
        let raw: [u8; 4] = bytes
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| anyhow::anyhow!("IDX header is truncated"))?;
        Ok(u32::from_be_bytes(raw))
    };

    if read_u32(images, 0)? != IDX_IMAGES_MAGIC || read_u32(labels, 0)? != IDX_LABELS_MAGIC {
        bail!("not an MNIST IDX file pair");
    }
    let count = read_u32(images, 4)? as usize;
    let rows = read_u32(images, 8)? as usize;
    let cols = read_u32(images, 12)? as usize;
    if rows * cols != INPUT_SIZE {
        bail!("unexpected image size {}x{}", rows, cols);
    }
    if read_u32(labels, 4)? as usize != count {
        bail!("image and label counts differ");
    }

    let count = limit.map_or(count, |limit| limit.min(count));
    let pixels = images
        .get(16..16 + count * INPUT_SIZE)
        .ok_or_else(|| anyhow::anyhow!("IDX image data is truncated"))?;
    let label_bytes = labels
        .get(8..8 + count)
        .ok_or_else(|| anyhow::anyhow!("IDX label data is truncated"))?;

    let samples = pixels
        .chunks_exact(INPUT_SIZE)
        .zip(label_bytes.iter())
        .map(|(image, label)| {
            let mut features: Vec<f32> = image.iter().map(|p| *p as f32 / 255.0).collect();
            standardize(&mut features);
            DigitSample {
                features,
                label: *label,
            }
        })
        .collect();
    Ok(InMemoryDataset::new(samples)?)
}

#[cfg(feature = "ml")]
pub use mnist::MnistSource;

#[cfg(feature = "ml")]
mod mnist {
    use burn_dataset::vision::{MnistDataset, MnistItem};
    use burn_dataset::Dataset;

    use super::{DigitDataset, DigitSample};
    use crate::preprocess::{standardize, INPUT_SIZE};

    /// MNIST（burn-dataset がダウンロード・キャッシュする）
    ///
    /// 各画像は 0〜1 に縮めたあと画像ごとに標準化し、正規化パイプラインの出力と
    /// 同じ分布に揃えます。
    pub struct MnistSource {
        inner: MnistDataset,
        limit: Option<usize>,
    }

    impl MnistSource {
        /// 学習用 60,000 枚
        pub fn train() -> Self {
            Self {
                inner: MnistDataset::train(),
                limit: None,
            }
        }

        /// 評価用 10,000 枚
        pub fn test() -> Self {
            Self {
                inner: MnistDataset::test(),
                limit: None,
            }
        }

        /// 先頭 `limit` 件だけを使う
        pub fn with_limit(mut self, limit: Option<usize>) -> Self {
            self.limit = limit;
            self
        }
    }

    impl DigitDataset for MnistSource {
        fn len(&self) -> usize {
            let len = self.inner.len();
            self.limit.map_or(len, |limit| limit.min(len))
        }

        fn get(&self, index: usize) -> Option<DigitSample> {
            if index >= self.len() {
                return None;
            }
            self.inner.get(index).map(|item| to_sample(&item))
        }
    }

    fn to_sample(item: &MnistItem) -> DigitSample {
        let mut features = Vec::with_capacity(INPUT_SIZE);
        for row in item.image.iter() {
            for pixel in row.iter() {
                features.push(*pixel / 255.0);
            }
        }
        standardize(&mut features);
        DigitSample {
            features,
            label: item.label,
        }
    }
}
