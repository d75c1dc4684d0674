/// メディア層のエラー定義
///
/// ffprobe / ffmpeg の起動・実行と、作業用一時ファイルで発生するエラー。
use crate::error_severity::ErrorSeverity;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// メタデータを読み取れない（壊れたファイル、非対応コンテナ、映像ストリームが無い）
    #[error("unreadable media '{path}': {reason}")]
    UnreadableMedia { path: String, reason: String },

    /// メディアエンジンを初期化できない
    #[error("failed to load media engine ({tool}): {reason}")]
    EngineLoad { tool: String, reason: String },

    /// 再エンコードの失敗
    #[error("transcode failed: {reason}")]
    Transcode { reason: String },

    /// 作業用一時ファイルの入出力
    #[error("temporary storage error: {context}")]
    TempStorage {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("transcode cancelled")]
    Cancelled,
}

impl MediaError {
    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn engine_load(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineLoad {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn transcode(reason: impl Into<String>) -> Self {
        Self::Transcode {
            reason: reason.into(),
        }
    }

    pub fn temp_storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::TempStorage {
            context: context.into(),
            source,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnreadableMedia { .. } | Self::Cancelled => ErrorSeverity::UserError,
            // ffmpeg のパスは設定で変えられる
            Self::EngineLoad { .. } => ErrorSeverity::ConfigError,
            Self::Transcode { .. } | Self::TempStorage { .. } => ErrorSeverity::SystemError,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::UnreadableMedia { .. } => {
                Some("The file may be corrupted or use an unsupported container. Try re-exporting it as MP4.")
            }
            Self::EngineLoad { .. } => Some(
                "Install ffmpeg (which includes ffprobe), or set RIDELENS_FFMPEG / RIDELENS_FFPROBE to their paths.",
            ),
            Self::Transcode { .. } => {
                Some("Retry with --no-compress to upload the original file.")
            }
            Self::TempStorage { .. } => Some("Check free disk space in the temporary directory."),
            Self::Cancelled => None,
        }
    }
}
