/// 圧縮コマンド
///
/// 判定が Compress のときだけ再エンコードし、結果をファイルに書き出す。
/// Skip のときは何も書き出さない。
use crate::commands::load_media;
use crate::commands::result::{CommandResult, CompressResult};
use crate::config::Settings;
use crate::domain::cancel::CancelFlag;
use crate::domain::progress::ProgressSink;
use crate::media::{CompressionPipeline, MediaEngine};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// 圧縮コマンドを実行
///
/// # Arguments
/// * `file_path` - 入力動画
/// * `output` - 出力先（省略時は入力と同じディレクトリの `<stem>_compressed.mp4`）
pub async fn execute(
    file_path: &str,
    output: Option<&str>,
    cancel: &CancelFlag,
    on_progress: &mut ProgressSink<'_>,
) -> Result<CommandResult> {
    let settings = Settings::load().context("Failed to load configuration file")?;
    let (validation, asset) = load_media(file_path).await?;

    let pipeline = CompressionPipeline::from_settings(MediaEngine::shared(&settings), &settings)
        .with_cancel(cancel.clone());
    let prepared = pipeline
        .prepare(asset, on_progress)
        .await
        .context("Compression failed")?;

    let output_path = if prepared.was_compressed() {
        let path = match output {
            Some(path) => PathBuf::from(path),
            None => default_output_path(Path::new(&validation.path)),
        };
        tokio::fs::write(&path, prepared.asset.bytes())
            .await
            .with_context(|| format!("Failed to write compressed video: {}", path.display()))?;
        info!(path = %path.display(), size_bytes = prepared.asset.len(), "Compressed video written");
        Some(path.display().to_string())
    } else {
        None
    };

    Ok(CommandResult::Compress(CompressResult {
        file_path: validation.path,
        metadata: prepared.metadata,
        verdict: prepared.verdict,
        reason: prepared.verdict.reason().to_string(),
        original_size: prepared.original_size,
        output_path,
        output_size: prepared.asset.len(),
    }))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input.with_file_name(format!("{}_compressed.mp4", stem))
}
