/// アップロードコマンド
///
/// 動画をそのまま（圧縮せずに）チャンク分割でアップロードし、
/// リモートファイルが ACTIVE になるまで待つ。
use crate::api::{ChunkedUploader, UploadOptions};
use crate::commands::result::{CommandResult, UploadResult};
use crate::commands::{load_media, remote_clients};
use crate::config::Settings;
use crate::domain::cancel::CancelFlag;
use crate::domain::formatter::format_timestamp;
use crate::domain::progress::ProgressSink;
use anyhow::{Context, Result};

/// アップロードコマンドを実行する
///
/// # エラー
/// このレイヤーでは anyhow::Result を返し、
/// ドメイン層・インフラ層のエラーを集約する。
pub async fn execute(
    file_path: &str,
    cancel: &CancelFlag,
    on_progress: &mut ProgressSink<'_>,
) -> Result<CommandResult> {
    let settings = Settings::load().context("Failed to load configuration file")?;
    let (client, auth) = remote_clients(&settings)?;
    let (validation, asset) = load_media(file_path).await?;

    let uploader = ChunkedUploader::new(client, auth, UploadOptions::from_settings(&settings));
    let remote_file = uploader
        .upload(&asset, cancel, on_progress)
        .await
        .context("Upload failed")?;

    let expires_at = remote_file
        .expiration_time
        .map(|time| format_timestamp(time, settings.timezone_offset_seconds));

    Ok(CommandResult::Upload(UploadResult {
        file_path: validation.path,
        file_size: validation.size,
        remote_file,
        expires_at,
    }))
}
