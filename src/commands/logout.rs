/// ログアウトコマンド
///
/// 保存されている認証情報を削除します。
/// 環境変数 RIDELENS_API_KEY はここでは消せないので対象外。
use crate::commands::result::{CommandResult, LogoutResult};
use crate::config::user::UserConfig;
use anyhow::{Context, Result};

/// ログアウトコマンドを実行
///
/// # Returns
/// 成功時はOk(CommandResult)、失敗時はエラー
pub async fn execute() -> Result<CommandResult> {
    let mut config = UserConfig::load().context("Failed to load configuration file")?;

    let was_logged_in = config.has_auth();
    if !was_logged_in {
        return Ok(CommandResult::Logout(LogoutResult {
            was_logged_in: false,
        }));
    }

    config.clear_auth();
    config.save().context("Failed to save configuration file")?;

    Ok(CommandResult::Logout(LogoutResult {
        was_logged_in: true,
    }))
}
