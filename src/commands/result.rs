/// コマンド実行結果を表す型
///
/// 各コマンドはこの型を返し、プレゼンテーション層で
/// 人間向けと機械向けの出力フォーマットを決定する。
use crate::api::types::RemoteFileHandle;
use crate::domain::analysis::AnalysisResult;
use crate::domain::media::VideoMetadata;
use crate::domain::policy::TranscodeVerdict;
use serde::Serialize;

/// コマンド実行結果の統一型
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandResult {
    Login(LoginResult),
    Logout(LogoutResult),
    Status(StatusResult),
    Probe(ProbeResult),
    Compress(CompressResult),
    Upload(UploadResult),
    Analyze(AnalyzeResult),
    Help,
}

/// ログインコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    /// 既にログイン済みだったか（上書き更新の場合true）
    pub was_logged_in: bool,
}

/// ログアウトコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResult {
    /// ログイン状態だったか
    pub was_logged_in: bool,
}

/// ステータスコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    /// APIキーが受け付けられたか
    pub is_authenticated: bool,
    /// マスキングされたAPIキー（設定されている場合）
    pub api_key: Option<String>,
    /// 検証に失敗した理由
    pub error: Option<String>,
}

/// プローブコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub file_path: String,
    pub file_size: u64,
    pub metadata: VideoMetadata,
    pub verdict: TranscodeVerdict,
    pub reason: String,
}

/// 圧縮コマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct CompressResult {
    pub file_path: String,
    pub metadata: VideoMetadata,
    pub verdict: TranscodeVerdict,
    pub reason: String,
    pub original_size: u64,
    /// 圧縮した場合のみ
    pub output_path: Option<String>,
    pub output_size: u64,
}

/// アップロードコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub file_path: String,
    pub file_size: u64,
    pub remote_file: RemoteFileHandle,
    /// 設定のタイムゾーンで整形した有効期限
    pub expires_at: Option<String>,
}

/// 解析コマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResult {
    pub file_path: String,
    pub original_size: u64,
    pub uploaded_size: u64,
    pub compressed: bool,
    pub remote_file: RemoteFileHandle,
    pub analysis: AnalysisResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_is_tagged_with_command() {
        let json = serde_json::to_value(CommandResult::Logout(LogoutResult {
            was_logged_in: true,
        }))
        .unwrap();
        assert_eq!(json["command"], "logout");
        assert_eq!(json["was_logged_in"], true);
    }
}
