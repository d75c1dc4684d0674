//! 設定ファイルのパーミッション管理
//!
//! config.toml には解析サービスのAPIキーが入るため、所有者のみ読み書きできるようにする。
//! Unix系: 0600 (rw-------)。それ以外のプラットフォームでは何もしない。

use crate::config::error::ConfigError;
use std::path::Path;

/// APIキーを含むファイルのパーミッションを設定
///
/// # Errors
/// ファイルが存在しない場合、またはパーミッション設定に失敗した場合に ConfigError を返します。
pub fn set_credential_file_permissions(file_path: &Path) -> Result<(), ConfigError> {
    if !file_path.exists() {
        return Err(ConfigError::file_system(
            format!("Config file not found: {}", file_path.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "File does not exist"),
        ));
    }

    #[cfg(unix)]
    {
        set_unix_permissions(file_path)
    }

    #[cfg(not(unix))]
    {
        Ok(())
    }
}

#[cfg(unix)]
fn set_unix_permissions(file_path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(file_path, permissions).map_err(|e| {
        ConfigError::file_system(
            format!(
                "Failed to set permissions (0600) for config file: {}",
                file_path.display()
            ),
            e,
        )
    })
}
