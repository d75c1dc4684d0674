/// 設定管理モジュール
///
/// このモジュールは3層の設定構造を提供します:
/// 1. AppConfig - コンパイル時定数として定義される静的設定（APP_CONFIG）
/// 2. UserConfig - 実行時に config.toml から読み込まれる動的設定
/// 3. Settings - UserConfig に環境変数 (RIDELENS_*) を重ねた解決済みの値
///
/// # 使用例
///
/// ```rust,ignore
/// use crate::config::{APP_CONFIG, Settings};
///
/// let max_size = APP_CONFIG.upload.max_file_size;
/// let settings = Settings::load()?;
/// let api_key = settings.require_api_key()?;
/// ```
pub mod app;
pub mod error;
pub mod permissions;
pub mod settings;
pub mod user;

pub use app::APP_CONFIG;
pub use settings::Settings;
pub use user::UserConfig;
