/// API通信用の型定義
///
/// リモート解析サービス（Files API / generateContent）のリクエスト・レスポンスを
/// シリアライズ・デシリアライズするための構造体を定義します。
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// リモートファイルの状態
///
/// 未知の値（STATE_UNSPECIFIED など）は処理中として扱い、ポーリングを続ける。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum RemoteFileState {
    #[default]
    Processing,
    Active,
    Failed,
}

impl From<String> for RemoteFileState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            _ => Self::Processing,
        }
    }
}

impl RemoteFileState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RemoteFileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// リモートファイルへの参照
///
/// GET /v1beta/files/{id} のレスポンス、および finalize 応答の `file`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileHandle {
    /// "files/abc123" 形式
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: RemoteFileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// int64 は文字列で返る
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// finalize 応答
#[derive(Debug, Clone, Deserialize)]
pub struct FileEnvelope {
    pub file: Option<RemoteFileHandle>,
}

/// セッション開始リクエスト
///
/// POST /upload/v1beta/files
#[derive(Debug, Clone, Serialize)]
pub struct StartUploadRequest {
    pub file: StartUploadFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUploadFile {
    pub display_name: String,
}

impl StartUploadRequest {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            file: StartUploadFile {
                display_name: display_name.into(),
            },
        }
    }
}

/// 解析リクエスト
///
/// POST /v1beta/models/{model}:generateContent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    File { file_data: FileData },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

impl GenerateContentRequest {
    /// アップロード済みファイルと指示文からリクエストを組み立てる
    pub fn for_file(file_uri: &str, mime_type: &str, prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            file_uri: file_uri.to_string(),
                            mime_type: mime_type.to_string(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

/// 解析レスポンス
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// 最初の候補のテキストパートを連結する（空白だけなら None）
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// 最初の候補の終了理由（MAX_TOKENS, SAFETY など）
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_file_handle_deserialization() {
        let json = r#"{
            "name": "files/abc123",
            "displayName": "round.mp4",
            "mimeType": "video/mp4",
            "sizeBytes": "10485760",
            "createTime": "2025-11-29T16:49:10.000000Z",
            "expirationTime": "2025-12-01T16:49:10.000000Z",
            "uri": "https://example.test/v1beta/files/abc123",
            "state": "PROCESSING"
        }"#;

        let handle: RemoteFileHandle = serde_json::from_str(json).expect("Failed to parse");

        assert_eq!(handle.name, "files/abc123");
        assert_eq!(handle.mime_type, "video/mp4");
        assert_eq!(handle.state, RemoteFileState::Processing);
        assert_eq!(handle.size_bytes.as_deref(), Some("10485760"));
        assert!(handle.expiration_time.is_some());
    }

    #[test]
    fn test_unknown_state_is_processing() {
        let json = r#"{ "name": "files/x", "uri": "u", "state": "STATE_UNSPECIFIED" }"#;
        let handle: RemoteFileHandle = serde_json::from_str(json).unwrap();
        assert_eq!(handle.state, RemoteFileState::Processing);

        let json = r#"{ "name": "files/x", "uri": "u" }"#;
        let handle: RemoteFileHandle = serde_json::from_str(json).unwrap();
        assert_eq!(handle.state, RemoteFileState::Processing);
    }

    #[test]
    fn test_state_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&RemoteFileState::Active).unwrap(),
            "\"ACTIVE\""
        );
        assert_eq!(RemoteFileState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_start_upload_request_shape() {
        let body = serde_json::to_value(StartUploadRequest::new("round.mp4")).unwrap();
        assert_eq!(body, serde_json::json!({ "file": { "display_name": "round.mp4" } }));
    }

    #[test]
    fn test_generate_content_request_shape() {
        let request = GenerateContentRequest::for_file("https://f/1", "video/mp4", "Analyze.");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body["contents"][0]["parts"][0],
            serde_json::json!({ "file_data": { "file_uri": "https://f/1", "mime_type": "video/mp4" } })
        );
        assert_eq!(body["contents"][0]["parts"][1]["text"], "Analyze.");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }], "role": "model" },
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_response_without_text() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());

        let json = r#"{ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());

        let json = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.block_reason(), Some("SAFETY"));
        assert!(response.finish_reason().is_none());
    }

    #[test]
    fn test_finish_reason_of_first_candidate() {
        let json = r#"{ "candidates": [
            { "content": { "parts": [] }, "finishReason": "MAX_TOKENS" },
            { "finishReason": "STOP" }
        ] }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());
        assert_eq!(response.finish_reason(), Some("MAX_TOKENS"));
    }
}
