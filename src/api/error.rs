/// インフラ層のエラー定義
///
/// リモート解析サービスとのやり取り（セッション開始、チャンク転送、
/// 状態ポーリング、解析リクエスト）で発生するエラーを構造化して定義。
/// 呼び出し側が再試行を判断できるよう、オフセット・HTTPステータス・最後の状態を保持する。
use crate::api::types::RemoteFileState;
use crate::error_severity::ErrorSeverity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfraError {
    /// ネットワークエラー
    #[error("network error: {message}")]
    Network { message: String },

    /// API通信エラー
    #[error("API error: {endpoint} - {message}")]
    Api {
        endpoint: String,
        message: String,
        status_code: Option<u16>,
    },

    /// タイムアウトエラー
    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// レスポンスの形式が想定外
    #[error("unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// 再開可能アップロードのセッションを開始できない
    #[error("failed to start upload session: {reason}")]
    SessionStart {
        reason: String,
        status_code: Option<u16>,
    },

    /// チャンク転送の失敗（bytes_sent は変わらない）
    #[error("chunk upload failed at offset {offset}: {message}")]
    ChunkUpload {
        offset: u64,
        status_code: Option<u16>,
        message: String,
    },

    /// 送信済みバイト数と一致しないオフセット
    #[error("chunk offset {actual} does not match the next expected offset {expected}")]
    ChunkOffsetMismatch { expected: u64, actual: u64 },

    /// ポーリング回数の上限に達した
    #[error("remote processing did not finish after {attempts} status checks (last state: {last_state})")]
    ProcessingTimeout {
        last_state: RemoteFileState,
        attempts: u32,
    },

    /// リモート側の処理が FAILED になった
    #[error("remote processing failed for {name}")]
    RemoteProcessingFailed { name: String },

    /// 解析リクエストが成功ステータスを返さなかった
    #[error("analysis service returned HTTP {status_code}: {message}")]
    AnalysisService { status_code: u16, message: String },

    /// 解析結果にテキストが無い
    #[error("analysis service returned no text payload")]
    EmptyResponse,

    /// 解析結果がスキーマに合わない
    #[error("analysis result is malformed: {reason}")]
    MalformedResult { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl InfraError {
    /// ネットワークエラーを作成
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn api(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            message: message.into(),
            status_code,
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn session_start(status_code: Option<u16>, reason: impl Into<String>) -> Self {
        Self::SessionStart {
            reason: reason.into(),
            status_code,
        }
    }

    pub fn chunk_upload(offset: u64, status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::ChunkUpload {
            offset,
            status_code,
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResult {
            reason: reason.into(),
        }
    }

    /// APIキーが無効・権限不足を示すか
    ///
    /// このサービスは無効なキーに 400 (API_KEY_INVALID) を返すことがある。
    pub fn is_auth_failure(&self) -> bool {
        let (status, message) = match self {
            Self::Api {
                status_code: Some(status),
                message,
                ..
            }
            | Self::SessionStart {
                status_code: Some(status),
                reason: message,
            }
            | Self::AnalysisService {
                status_code: status,
                message,
            } => (*status, message.as_str()),
            _ => return false,
        };

        matches!(status, 401 | 403)
            || (status == 400
                && (message.contains("API_KEY_INVALID") || message.contains("API key not valid")))
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. }
            | Self::SessionStart { status_code, .. }
            | Self::ChunkUpload { status_code, .. } => *status_code,
            Self::AnalysisService { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// エラーの深刻度を返す
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_auth_failure() {
            return ErrorSeverity::ConfigError;
        }
        match self {
            Self::Cancelled => ErrorSeverity::UserError,
            Self::RemoteProcessingFailed { .. } => ErrorSeverity::UserError,
            _ => ErrorSeverity::SystemError,
        }
    }

    /// ユーザー向けのヒントメッセージを返す
    pub fn hint(&self) -> Option<&str> {
        if self.is_auth_failure() {
            return Some("Your API key was rejected. Run 'ridelens login' to update it.");
        }
        if self.status_code() == Some(429) {
            return Some("The remote service is rate limiting requests. Wait a minute and try again.");
        }
        match self {
            Self::Network { .. } => Some("Check your internet connection and try again."),
            Self::Timeout { .. } => {
                Some("The request took too long. Check your connection or try a smaller file.")
            }
            Self::SessionStart { .. } | Self::ChunkUpload { .. } => {
                Some("The upload was interrupted. Run the command again to start a new upload.")
            }
            Self::ProcessingTimeout { .. } => Some(
                "The remote service is still processing the video. Try again later or raise RIDELENS_POLL_MAX_ATTEMPTS.",
            ),
            Self::RemoteProcessingFailed { .. } => Some(
                "The remote service could not process this video. Try re-exporting it as MP4.",
            ),
            Self::EmptyResponse | Self::MalformedResult { .. } => {
                Some("The model returned an unexpected answer. Running the analysis again usually helps.")
            }
            _ => None,
        }
    }
}
