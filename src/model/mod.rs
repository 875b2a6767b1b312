pub mod config;
pub mod hyperparameters;
pub mod lifecycle;
pub mod model_metadata;
pub mod model_storage;

pub use config::{AppConfig, ModelSettings, PreprocessSettings, TrainingSettings};
pub use hyperparameters::{HyperparameterUpdate, Hyperparameters};
pub use lifecycle::{FreshReason, ModelLifecycle, ModelStatus, StartupOutcome};
pub use model_metadata::CheckpointMetadata;
pub use model_storage::{describe_metadata, load_checkpoint, load_metadata, save_checkpoint};
