pub mod classifier;
pub mod dataset;
pub mod evaluation;
pub mod inference;
#[cfg(feature = "ml")]
pub mod ml_model;
#[cfg(feature = "ml")]
pub mod burn_classifier;

pub use classifier::{Classifier, ClassifierFactory, EpochMetrics, Probabilities, NUM_CLASSES};
pub use dataset::{load_idx_dir, DigitDataset, DigitSample, InMemoryDataset, Split};
#[cfg(feature = "ml")]
pub use dataset::MnistSource;
pub use evaluation::ConfusionMatrix;
pub use inference::PredictionResult;
#[cfg(feature = "ml")]
pub use ml_model::{DigitMlp, DigitMlpConfig};
#[cfg(feature = "ml")]
pub use burn_classifier::{BurnClassifier, BurnClassifierFactory};
