/// HTTPクライアント
///
/// リモート解析サービスとの通信を担当するHTTPクライアント。
/// タイムアウト、エラーハンドリング、APIキーヘッダーの付与を含みます。
use crate::api::auth::AuthManager;
use crate::api::error::InfraError;
use crate::config::{APP_CONFIG, Settings};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// APIクライアントの結果型
type ApiResult<T> = Result<T, InfraError>;

/// APIクライアント
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// 新しいAPIクライアントを作成
    ///
    /// # Arguments
    /// * `base_url` - APIのベースURL（例: "https://generativelanguage.googleapis.com"）
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let timeout = Duration::from_secs(APP_CONFIG.api.timeout_seconds);

        // 308 は再開可能アップロードの応答なので追従しない
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| InfraError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 設定（環境変数による上書きを含む）のベースURLでクライアントを作成
    pub fn from_settings(settings: &Settings) -> ApiResult<Self> {
        Self::new(settings.api_base.clone())
    }

    /// GETリクエストを送信
    ///
    /// # Arguments
    /// * `endpoint` - エンドポイントパス（例: "/v1beta/files/abc123"）
    /// * `auth` - APIキー（オプション）
    pub async fn get(&self, endpoint: &str, auth: Option<&AuthManager>) -> ApiResult<Response> {
        let url = self.build_url(endpoint);
        let request = Self::build_request(self.client.get(&url), auth);

        Self::send_with_error_handling(request, endpoint, "GET").await
    }

    /// JSONボディのPOSTリクエストを送信
    ///
    /// # Arguments
    /// * `endpoint` - エンドポイントパス（例: "/upload/v1beta/files"）
    /// * `body` - リクエストボディ（JSON）
    /// * `headers` - 追加ヘッダー
    /// * `auth` - APIキー（オプション）
    pub async fn post_json<T: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &T,
        headers: &[(&str, String)],
        auth: Option<&AuthManager>,
    ) -> ApiResult<Response> {
        let url = self.build_url(endpoint);
        let mut request = self.client.post(&url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let request = Self::build_request(request, auth);

        Self::send_with_error_handling(request, endpoint, "POST").await
    }

    /// バイト列のPOSTリクエストを送信（チャンク転送用）
    ///
    /// # Arguments
    /// * `url` - 完全なURL（セッション開始で受け取ったアップロードURL）
    /// * `body` - チャンクのバイト列（Content-Length は長さから付与される）
    /// * `headers` - 追加ヘッダー
    /// * `auth` - APIキー（オプション）
    pub async fn post_bytes(
        &self,
        url: &str,
        body: Bytes,
        headers: &[(&str, String)],
        auth: Option<&AuthManager>,
    ) -> ApiResult<Response> {
        let mut request = self.client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let request = Self::build_request(request, auth);

        Self::send_with_error_handling(request, url, "POST").await
    }

    /// URLを構築
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// 認証ヘッダーを付与したリクエストを構築
    fn build_request(request: RequestBuilder, auth: Option<&AuthManager>) -> RequestBuilder {
        match auth {
            Some(auth) => auth.apply(request),
            None => request,
        }
    }

    /// リクエストを送信し、エラーハンドリングを行う
    async fn send_with_error_handling(
        request: RequestBuilder,
        endpoint: &str,
        method: &str,
    ) -> ApiResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                InfraError::timeout(format!("{} {}", method, endpoint))
            } else if e.is_connect() {
                InfraError::network(format!(
                    "Connection failed for {} {}: {}",
                    method, endpoint, e
                ))
            } else {
                InfraError::network(format!("Request failed for {} {}: {}", method, endpoint, e))
            }
        })
    }

    /// レスポンスをチェックしてエラーを返す
    ///
    /// # Arguments
    /// * `response` - HTTPレスポンス
    /// * `endpoint` - エンドポイント名（エラーメッセージ用）
    pub async fn check_response(response: Response, endpoint: &str) -> ApiResult<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = read_error_body(response).await;

        Err(InfraError::api(endpoint, error_body, Some(status_code)))
    }

    /// JSONレスポンスをデシリアライズ
    pub async fn parse_json<T: serde::de::DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> ApiResult<T> {
        response.json().await.map_err(|e| {
            InfraError::invalid_response(endpoint, format!("Failed to parse JSON response: {}", e))
        })
    }
}

/// エラーレスポンスの本文を読む
pub async fn read_error_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}
