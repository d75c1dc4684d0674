/// ドメイン層のエラー定義
///
/// アップロード対象ファイルの制約違反を構造化して定義。
/// 外部クレートのエラーは含まない。
use crate::config::APP_CONFIG;
use crate::error_severity::ErrorSeverity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// ファイルが見つからない
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// ファイル形式が無効
    #[error("invalid file format: {path} (expected: {expected}, found: {found})")]
    InvalidFormat {
        path: String,
        expected: String,
        found: String,
    },

    /// ファイルサイズが制限を超過
    #[error("file too large: {size} bytes (maximum allowed: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    /// ファイルが空
    #[error("file is empty: {path}")]
    EmptyFile { path: String },

    /// ディレクトリが指定された（ファイルが期待される場所）
    #[error("'{path}' is a directory, not a file")]
    NotAFile { path: String },
}

impl DomainError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn invalid_format(path: impl Into<String>, found: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            expected: format!("one of: {}", APP_CONFIG.upload.supported_formats.join(", ")),
            found: found.into(),
        }
    }

    pub fn empty_file(path: impl Into<String>) -> Self {
        Self::EmptyFile { path: path.into() }
    }

    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile { path: path.into() }
    }

    /// ドメインエラーはすべて入力ファイルの問題
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::UserError
    }

    /// ユーザー向けのヒントメッセージを返す
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Please check the file path and ensure the file exists.")
            }
            Self::InvalidFormat { .. } => Some("Supported formats: mp4, mov, avi, mkv, webm, m4v"),
            Self::FileTooLarge { .. } => Some("Trim the video or export it at a lower resolution."),
            Self::EmptyFile { .. } => Some("The file appears to be empty or corrupted."),
            Self::NotAFile { .. } => Some("Please specify a file, not a directory."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_lists_supported_formats() {
        let err = DomainError::invalid_format("clip.gif", "gif");
        let message = err.to_string();
        assert!(message.contains("mp4"));
        assert!(message.contains("found: gif"));
    }

    #[test]
    fn test_severity_is_user_error() {
        assert_eq!(
            DomainError::empty_file("a.mp4").severity(),
            ErrorSeverity::UserError
        );
        assert!(DomainError::not_a_file("/tmp").hint().is_some());
    }
}
