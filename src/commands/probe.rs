/// プローブコマンド
///
/// 動画のメタデータを読み、アップロード前に圧縮が必要かを判定して表示する。
/// エンコードはしない。
use crate::commands::load_media;
use crate::commands::result::{CommandResult, ProbeResult};
use crate::config::Settings;
use crate::media::{CompressionPipeline, MediaEngine};
use anyhow::{Context, Result};

pub async fn execute(file_path: &str) -> Result<CommandResult> {
    let settings = Settings::load().context("Failed to load configuration file")?;
    let (validation, asset) = load_media(file_path).await?;

    let pipeline = CompressionPipeline::from_settings(MediaEngine::shared(&settings), &settings);
    let (metadata, verdict) = pipeline
        .inspect(&asset)
        .await
        .context("Failed to probe video")?;

    Ok(CommandResult::Probe(ProbeResult {
        file_path: validation.path,
        file_size: validation.size,
        metadata,
        verdict,
        reason: verdict.reason().to_string(),
    }))
}
