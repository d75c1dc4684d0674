/// 認証マネージャー
///
/// リモート解析サービスのAPIキーを管理します。
/// すべてのリクエストに `x-goog-api-key` ヘッダーとして付与します。
use crate::api::client::ApiClient;
use crate::api::error::InfraError;
use reqwest::RequestBuilder;

/// APIキーを運ぶヘッダー名
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// 認証確認に使うエンドポイント
const CREDENTIAL_CHECK_ENDPOINT: &str = "/v1beta/models?pageSize=1";

/// 認証マネージャー
#[derive(Clone)]
pub struct AuthManager {
    api_key: String,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("api_key", &self.get_masked_api_key())
            .finish()
    }
}

impl AuthManager {
    /// 新しい認証マネージャーを作成
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// リクエストにAPIキーヘッダーを付与
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_key)
    }

    /// 認証情報をテスト（GET /v1beta/models で確認）
    ///
    /// # Returns
    /// 認証が成功すればOk、失敗すればErr
    pub async fn test_credentials(&self, client: &ApiClient) -> Result<(), InfraError> {
        let response = client.get(CREDENTIAL_CHECK_ENDPOINT, Some(self)).await?;

        ApiClient::check_response(response, CREDENTIAL_CHECK_ENDPOINT).await?;

        Ok(())
    }

    /// APIキーをマスキングして表示
    pub fn get_masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}***{}", head, tail)
        }
    }
}
