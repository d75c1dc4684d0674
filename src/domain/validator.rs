/// ドメインサービス: ファイルバリデーション
///
/// 解析対象の動画ファイルを読み込む前に検証する。
/// 設定値（最大ファイルサイズ、サポート形式）はAPP_CONFIGから取得します。
use crate::config::APP_CONFIG;
use crate::domain::error::DomainError;
use crate::domain::media::mime_type_for_extension;
use std::path::Path;

/// ファイルのバリデーション結果
#[derive(Debug)]
pub struct ValidationResult {
    pub path: String,
    pub size: u64,
    pub extension: String,
    pub mime_type: &'static str,
}

/// 解析対象のファイルをバリデーションする
///
/// # エラー
/// - ファイルが存在しない
/// - ディレクトリが指定された
/// - ファイルが空
/// - ファイルサイズが制限を超過
/// - サポートされていない形式
pub fn validate_upload_file(file_path: &str) -> Result<ValidationResult, DomainError> {
    let path = Path::new(file_path);

    if !path.exists() {
        return Err(DomainError::file_not_found(file_path));
    }

    let metadata =
        std::fs::metadata(path).map_err(|_| DomainError::file_not_found(file_path))?;

    if metadata.is_dir() {
        return Err(DomainError::not_a_file(file_path));
    }

    let size = metadata.len();
    if size == 0 {
        return Err(DomainError::empty_file(file_path));
    }

    let max_file_size = APP_CONFIG.upload.max_file_size;
    if size > max_file_size {
        return Err(DomainError::FileTooLarge {
            size,
            max: max_file_size,
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| DomainError::invalid_format(file_path, "no extension"))?;

    if !APP_CONFIG
        .upload
        .supported_formats
        .contains(&extension.as_str())
    {
        return Err(DomainError::invalid_format(file_path, extension));
    }

    Ok(ValidationResult {
        path: file_path.to_string(),
        size,
        mime_type: mime_type_for_extension(&extension),
        extension,
    })
}
