/// ステータスコマンド
///
/// 現在のAPIキー（config.toml または RIDELENS_API_KEY）で解析サービスにアクセスできるかを確認します。
use crate::api::{ApiClient, AuthManager};
use crate::commands::result::{CommandResult, StatusResult};
use crate::config::Settings;
use anyhow::{Context, Result};
use tracing::warn;

/// ステータスコマンドを実行
///
/// キーが拒否されてもエラーにはせず、未認証として結果を返す。
pub async fn execute() -> Result<CommandResult> {
    let settings = Settings::load().context("Failed to load configuration file")?;

    let Some(api_key) = settings.api_key.clone() else {
        return Ok(CommandResult::Status(StatusResult {
            is_authenticated: false,
            api_key: None,
            error: None,
        }));
    };

    let auth_manager = AuthManager::new(api_key);
    let client = ApiClient::from_settings(&settings).context("Failed to create API client")?;
    let masked = Some(auth_manager.get_masked_api_key());

    match auth_manager.test_credentials(&client).await {
        Ok(()) => Ok(CommandResult::Status(StatusResult {
            is_authenticated: true,
            api_key: masked,
            error: None,
        })),
        Err(e) => {
            warn!(error = %e, "Credential check failed");
            Ok(CommandResult::Status(StatusResult {
                is_authenticated: false,
                api_key: masked,
                error: Some(e.to_string()),
            }))
        }
    }
}
