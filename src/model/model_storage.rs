//! チェックポイントの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（ハイパーパラメータ、学習履歴など）
//! - model.bin       - モデルの重み（バイナリ）

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder};

use crate::model::model_metadata::CheckpointMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 一時ファイルに書いてからリネームするので、書き込み途中で失敗しても
/// 既存のチェックポイントは壊れません。
pub fn save_checkpoint(
    output_path: &Path,
    metadata: &CheckpointMetadata,
    model_binary: &[u8],
) -> Result<()> {
    // 親ディレクトリが存在しない場合は作成
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }

    let mut temp_name = output_path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let result = write_archive(temp_path, metadata, model_binary).and_then(|_| {
        std::fs::rename(temp_path, output_path)
            .with_context(|| format!("Failed to move checkpoint into place: {:?}", output_path))
    });
    if result.is_err() {
        std::fs::remove_file(temp_path).ok();
    }
    result
}

fn write_archive(path: &Path, metadata: &CheckpointMetadata, model_binary: &[u8]) -> Result<()> {
    let tar_gz_file =
        File::create(path).with_context(|| format!("Failed to create tar.gz file: {:?}", path))?;

    // Gzip圧縮を設定
    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // tarアーカイブを完成させ、gzipの末尾まで書き切る
    let encoder = tar_builder
        .into_inner()
        .context("Failed to finalize tar archive")?;
    let file = encoder.finish().context("Failed to finalize gzip stream")?;
    file.sync_all().context("Failed to flush checkpoint to disk")?;
    Ok(())
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .with_context(|| format!("Failed to add {} to tar", name))
}

/// Tar.gzからチェックポイントのメタデータだけを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<CheckpointMetadata> {
    let (metadata, _) = load_checkpoint(tar_gz_path)?;
    Ok(metadata)
}

/// メタデータとモデルバイナリを共に読み込む
pub fn load_checkpoint(tar_gz_path: &Path) -> Result<(CheckpointMetadata, Vec<u8>)> {
    let tar_gz_file = File::open(tar_gz_path)
        .with_context(|| format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;

    let decoder = GzDecoder::new(tar_gz_file);
    let mut archive = Archive::new(decoder);

    let mut metadata_opt: Option<CheckpointMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    // 両方のファイルを読み込む
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        match path.to_str() {
            Some(METADATA_ENTRY) => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str)?;
                metadata_opt = Some(CheckpointMetadata::from_json_string(&json_str)?);
            }
            Some(MODEL_ENTRY) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(anyhow::anyhow!("metadata.json not found in tar.gz archive")),
        (_, None) => Err(anyhow::anyhow!("model.bin not found in tar.gz archive")),
    }
}

/// メタデータの要約（複数行）
pub fn describe_metadata(metadata: &CheckpointMetadata) -> String {
    let hp = &metadata.model_hyperparameters;
    let mut lines = vec![
        "=== チェックポイント ===".to_string(),
        format!("隠れ層: {:?}", hp.hidden_layer_sizes),
        format!("学習率: {}, バッチサイズ: {}", hp.learning_rate, hp.batch_size),
        format!("学習エポック数: {}", metadata.epochs()),
        format!("保存日時: {}", metadata.saved_at),
    ];
    if let Some(last) = metadata.history.last() {
        lines.push(format!(
            "最終エポック: loss {:.4}, accuracy {:.2}%",
            last.loss,
            last.accuracy * 100.0
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hyperparameters::Hyperparameters;

    fn metadata() -> CheckpointMetadata {
        CheckpointMetadata::new(Hyperparameters::default(), Hyperparameters::default(), Vec::new())
    }

    #[test]
    fn test_save_and_load_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/model.tar.gz");

        save_checkpoint(&path, &metadata(), &[1, 2, 3, 4]).unwrap();
        let (loaded, binary) = load_checkpoint(&path).unwrap();
        assert_eq!(loaded, metadata_with_time(&loaded));
        assert_eq!(binary, vec![1, 2, 3, 4]);
        assert_eq!(load_metadata(&path).unwrap().epochs(), 0);

        // 一時ファイルは残らない
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn metadata_with_time(loaded: &CheckpointMetadata) -> CheckpointMetadata {
        CheckpointMetadata {
            saved_at: loaded.saved_at.clone(),
            ..metadata()
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.tar.gz");
        std::fs::write(&path, b"definitely not gzip").unwrap();
        assert!(load_checkpoint(&path).is_err());
        assert!(load_checkpoint(&dir.path().join("missing.tar.gz")).is_err());
    }

    #[test]
    fn test_describe_metadata_mentions_epochs() {
        let text = describe_metadata(&metadata());
        assert!(text.contains("学習エポック数: 0"));
    }
}
