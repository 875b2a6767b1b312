//! 手書き数字認識のコマンドラインツール

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use digit_recognizer_lib::logging::init_logging;
use digit_recognizer_lib::ml::{
    load_idx_dir, BurnClassifierFactory, DigitDataset, MnistSource, Split,
};
use digit_recognizer_lib::model::{
    describe_metadata, load_metadata, AppConfig, HyperparameterUpdate, ModelLifecycle,
};
use digit_recognizer_lib::orchestrator::TrainingOrchestrator;
use digit_recognizer_lib::preprocess::ImageNormalizer;

#[derive(Parser)]
#[command(name = "digit_recognizer", version, about = "手書き数字の前処理・学習・推論")]
struct Cli {
    /// 設定ファイル（JSON）
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// デバッグログを出す
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// MNISTで学習して評価する
    Train {
        /// エポック数（省略時は設定の default_epochs）
        #[arg(long)]
        epochs: Option<usize>,
        /// 学習に使うサンプル数の上限
        #[arg(long)]
        limit: Option<usize>,
        /// 評価に使うサンプル数の上限
        #[arg(long)]
        eval_limit: Option<usize>,
    },
    /// 画像ファイルを分類する
    Predict {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// 結果をJSONで出力
        #[arg(long)]
        json: bool,
    },
    /// ハイパーパラメータを更新してモデルを作り直す
    Tune {
        /// `learningRate=0.01` の形式（複数可）
        #[arg(long = "set", value_name = "KEY=VALUE")]
        assignments: Vec<String>,
        /// JSON形式の部分更新 `{"batchSize": 32}`
        #[arg(long)]
        json: Option<String>,
    },
    /// モデルとチェックポイントの情報を表示する
    Info,
    /// 設定を表示する（`--write` でファイルに保存）
    Config {
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load_or_default(&cli.config);

    match cli.command {
        Command::Train {
            epochs,
            limit,
            eval_limit,
        } => train(&config, epochs, limit, eval_limit),
        Command::Predict { images, json } => predict(&config, &images, json),
        Command::Tune { assignments, json } => tune(&config, &assignments, json.as_deref()),
        Command::Info => info(&config),
        Command::Config { write } => {
            println!("{}", config.describe());
            if write {
                config.save(&cli.config)?;
            }
            Ok(())
        }
    }
}

fn open_lifecycle(config: &AppConfig) -> Result<ModelLifecycle<BurnClassifierFactory>> {
    let factory = BurnClassifierFactory::new(config.training.augmentation.clone());
    Ok(ModelLifecycle::load_or_create(
        factory,
        config.model.clone(),
        config.hyperparameters.clone(),
    )?)
}

fn load_dataset(
    config: &AppConfig,
    split: Split,
    limit: Option<usize>,
) -> Result<Arc<dyn DigitDataset>> {
    match &config.training.data_dir {
        Some(dir) => Ok(Arc::new(load_idx_dir(dir, split, limit)?)),
        None => {
            let source = match split {
                Split::Train => MnistSource::train(),
                Split::Test => MnistSource::test(),
            };
            Ok(Arc::new(source.with_limit(limit)))
        }
    }
}

fn train(
    config: &AppConfig,
    epochs: Option<usize>,
    limit: Option<usize>,
    eval_limit: Option<usize>,
) -> Result<()> {
    let lifecycle = Arc::new(open_lifecycle(config)?);
    let train_data = load_dataset(config, Split::Train, limit)?;
    let eval_data = load_dataset(config, Split::Test, eval_limit)?;
    println!(
        "学習データ: {} 枚, 評価データ: {} 枚",
        train_data.len(),
        eval_data.len()
    );

    let orchestrator = TrainingOrchestrator::new(
        lifecycle,
        train_data,
        eval_data,
        config.training.eval_batch_size,
    );
    let epochs = epochs.unwrap_or(config.training.default_epochs);
    let report = orchestrator.run_training_cycle(epochs);

    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(metrics) = &report.metrics {
        println!("\n{}", metrics.confusion_matrix);
    }
    if !report.success {
        anyhow::bail!("学習に失敗しました");
    }
    Ok(())
}

fn predict(config: &AppConfig, images: &[PathBuf], json: bool) -> Result<()> {
    let lifecycle = open_lifecycle(config)?;
    let normalizer = ImageNormalizer::from_settings(&config.preprocess);

    for path in images {
        let tensor = normalizer.normalize_path(path)?;
        let result = lifecycle.predict(&tensor)?;

        if json {
            println!("{}", serde_json::to_string(&result)?);
            continue;
        }
        let top3 = result
            .top3
            .iter()
            .map(|(digit, p)| format!("{}: {:.1}%", digit, p * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} -> {} ({:.1}%){} [{}]",
            path.display(),
            result.class_id,
            result.confidence * 100.0,
            if result.low_confidence { " 低確信度" } else { "" },
            top3
        );
    }
    Ok(())
}

fn tune(config: &AppConfig, assignments: &[String], json: Option<&str>) -> Result<()> {
    let mut update = match json {
        Some(payload) => HyperparameterUpdate::from_json(payload)?,
        None => HyperparameterUpdate::default(),
    };
    for assignment in assignments {
        update.set(assignment)?;
    }
    if update.is_empty() {
        anyhow::bail!(
            "更新するハイパーパラメータがありません（--set または --json を指定してください）"
        );
    }

    let lifecycle = open_lifecycle(config)?;
    let params = lifecycle.tune_and_rebuild(&update)?;
    lifecycle
        .try_save()
        .context("リビルドしたモデルを保存できませんでした")?;

    println!("{}", serde_json::to_string_pretty(&params)?);
    println!("{}", lifecycle.model_info());
    Ok(())
}

fn info(config: &AppConfig) -> Result<()> {
    let lifecycle = open_lifecycle(config)?;
    println!("{}", lifecycle.model_info());
    println!("起動時: {:?}", lifecycle.startup_outcome());

    let path = lifecycle.checkpoint_path();
    if path.exists() {
        match load_metadata(path) {
            Ok(metadata) => println!("{}", describe_metadata(&metadata)),
            Err(e) => eprintln!("警告: メタデータを読めません: {:#}", e),
        }
    }
    Ok(())
}
