/// ログインコマンド
///
/// APIキーを検証し、認証情報をconfig.tomlに保存します。
/// キーの入力はプレゼンテーション層が担当し、ここでは受け取ったキーだけを扱う。
use crate::api::{ApiClient, AuthManager};
use crate::commands::result::{CommandResult, LoginResult};
use crate::config::{Settings, UserConfig};
use anyhow::{Context, Result, bail};
use tracing::info;

/// ログインコマンドを実行
///
/// # Arguments
/// * `api_key` - 入力されたAPIキー
pub async fn execute(api_key: String) -> Result<CommandResult> {
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key cannot be empty. Please provide a valid API key.");
    }

    let mut config = UserConfig::load().context("Failed to load configuration file")?;
    let settings = Settings::resolve(&config).context("Failed to resolve settings")?;

    let client = ApiClient::from_settings(&settings).context("Failed to create API client")?;
    let auth_manager = AuthManager::new(api_key.clone());

    auth_manager
        .test_credentials(&client)
        .await
        .context("Authentication failed. Please verify your API key is correct.")?;
    info!(api_key = %auth_manager.get_masked_api_key(), "API key verified");

    let was_logged_in = config.has_auth();
    config.set_auth(api_key);
    config.save().context("Failed to save configuration file")?;

    Ok(CommandResult::Login(LoginResult { was_logged_in }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_key_is_rejected_before_any_io() {
        let err = execute("   ".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }
}
