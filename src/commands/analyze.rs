/// 解析コマンド
///
/// プローブ → 圧縮判定 → 再エンコード/スキップ → アップロード → 解析 を順に実行する。
/// どの段階で失敗しても部分的な結果は返さない。
use crate::api::{AnalysisRequestDriver, ChunkedUploader, UploadOptions};
use crate::commands::result::{AnalyzeResult, CommandResult};
use crate::commands::{load_media, remote_clients};
use crate::config::Settings;
use crate::domain::cancel::CancelFlag;
use crate::domain::progress::ProgressSink;
use crate::media::{CompressionPipeline, MediaEngine};
use anyhow::{Context, Result};

/// 解析コマンドを実行
///
/// # Arguments
/// * `file_path` - 入力動画
/// * `skip_compression` - true なら判定せずにそのままアップロードする
pub async fn execute(
    file_path: &str,
    skip_compression: bool,
    cancel: &CancelFlag,
    on_progress: &mut ProgressSink<'_>,
) -> Result<CommandResult> {
    let settings = Settings::load().context("Failed to load configuration file")?;
    // 圧縮を始める前にキーの有無を確かめる
    let (client, auth) = remote_clients(&settings)?;
    let (validation, asset) = load_media(file_path).await?;
    let original_size = asset.len();

    let (asset, compressed) = if skip_compression {
        (asset, false)
    } else {
        let pipeline =
            CompressionPipeline::from_settings(MediaEngine::shared(&settings), &settings)
                .with_cancel(cancel.clone());
        let prepared = pipeline
            .prepare(asset, on_progress)
            .await
            .context("Compression failed")?;
        let compressed = prepared.was_compressed();
        (prepared.asset, compressed)
    };

    let uploader = ChunkedUploader::new(
        client.clone(),
        auth.clone(),
        UploadOptions::from_settings(&settings),
    );
    let remote_file = uploader
        .upload(&asset, cancel, on_progress)
        .await
        .context("Upload failed")?;

    let driver = AnalysisRequestDriver::from_settings(client, auth, &settings);
    let analysis = driver
        .request_analysis(&remote_file)
        .await
        .context("Analysis failed")?;

    Ok(CommandResult::Analyze(AnalyzeResult {
        file_path: validation.path,
        original_size,
        uploaded_size: asset.len(),
        compressed,
        remote_file,
        analysis,
    }))
}
