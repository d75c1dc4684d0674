pub mod analyze;
pub mod compress;
pub mod login;
pub mod logout;
pub mod probe;
pub mod result;
pub mod status;
pub mod upload;

pub use result::CommandResult;

use crate::api::{ApiClient, AuthManager};
use crate::config::Settings;
use crate::domain::media::MediaAsset;
use crate::domain::validator::{self, ValidationResult};
use anyhow::{Context, Result};
use std::path::Path;

/// ファイルを検証してから読み込む
///
/// 検証に失敗した場合は読み込まない（DomainError がそのまま伝播する）。
pub(crate) async fn load_media(file_path: &str) -> Result<(ValidationResult, MediaAsset)> {
    let validation =
        validator::validate_upload_file(file_path).context("File validation failed")?;

    let asset = MediaAsset::read_from(Path::new(&validation.path), validation.mime_type)
        .await
        .with_context(|| format!("Failed to read file: {}", validation.path))?;

    Ok((validation, asset))
}

/// 設定のAPIキーとベースURLでクライアントを作る
pub(crate) fn remote_clients(settings: &Settings) -> Result<(ApiClient, AuthManager)> {
    let api_key = settings
        .require_api_key()
        .context("Authentication credentials not found")?;
    let client = ApiClient::from_settings(settings).context("Failed to create API client")?;

    Ok((client, AuthManager::new(api_key.to_string())))
}
