/// ユーザー設定モジュール
///
/// 実行時にユーザーディレクトリから読み込まれる動的設定を管理します。
/// Windows: C:\Users\<User>\AppData\Roaming\ridelens\config.toml
/// macOS:   /Users/<User>/Library/Application Support/ridelens/config.toml
/// Linux:   /home/<user>/.config/ridelens/config.toml
///
/// 初回起動時にデフォルト値から自動的にconfig.tomlを作成します。
use crate::config::app::APP_CONFIG;
use crate::config::error::ConfigError;
use crate::config::permissions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// デフォルトのタイムゾーンオフセット（UTC）
const DEFAULT_TIMEZONE_OFFSET: i32 = 0;

/// タイムゾーンオフセットの最大値（+18時間 = 64800秒）
const MAX_TIMEZONE_OFFSET: i32 = 64800;

/// タイムゾーンオフセットの最小値（-18時間 = -64800秒）
const MIN_TIMEZONE_OFFSET: i32 = -64800;

/// 解析サービスの認証設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub api_key: String,
}

/// `[remote]` 解析サービスの接続先
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub base_url: String,
    pub model: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: APP_CONFIG.api.endpoint.to_string(),
            model: APP_CONFIG.api.default_model.to_string(),
        }
    }
}

/// `[upload]` チャンクアップロード設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// 0 はファイル全体を1チャンクで送る
    pub chunk_size_bytes: u64,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            chunk_size_bytes: APP_CONFIG.upload.chunk_size,
        }
    }
}

/// `[compression]` 圧縮判定と圧縮後の解像度
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSection {
    pub height_threshold: u32,
    pub size_threshold_mb: f64,
    pub target_height: u32,
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self {
            height_threshold: APP_CONFIG.compression.height_threshold,
            size_threshold_mb: APP_CONFIG.compression.size_threshold_mb,
            target_height: APP_CONFIG.compression.target_height,
        }
    }
}

/// `[polling]` リモート処理完了待ちのポーリング設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: APP_CONFIG.polling.interval_ms,
            max_attempts: APP_CONFIG.polling.max_attempts,
        }
    }
}

/// `[engine]` ffmpeg / ffprobe の実行ファイル
///
/// 未指定なら PATH から探す。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

/// ユーザー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// タイムゾーンオフセット(秒単位)
    /// 例: UTC=0, JST(UTC+9)=32400, PST(UTC-8)=-28800
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset_seconds: i32,

    /// 解析サービスの認証情報
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub upload: UploadSection,

    #[serde(default)]
    pub compression: CompressionSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub engine: EngineSection,
}

fn default_timezone_offset() -> i32 {
    DEFAULT_TIMEZONE_OFFSET
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            auth: None,
            timezone_offset_seconds: DEFAULT_TIMEZONE_OFFSET,
            remote: RemoteSection::default(),
            upload: UploadSection::default(),
            compression: CompressionSection::default(),
            polling: PollingSection::default(),
            engine: EngineSection::default(),
        }
    }
}

impl UserConfig {
    /// ユーザー設定ファイルのパスを取得
    ///
    /// # Errors
    /// 設定ディレクトリが取得できない場合に ConfigError::DirectoryNotFound を返します。
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .ok_or_else(|| ConfigError::directory_not_found("Failed to get user config directory"))
            .map(|config_dir| config_dir.join("ridelens").join("config.toml"))
    }

    /// ユーザー設定を読み込む
    ///
    /// 設定ファイルが存在しない場合は、デフォルトテンプレートから自動的に作成します。
    /// 読み込み後、自動的に検証を実行します（Fail Fast）。
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスからユーザー設定を読み込む
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            ConfigError::file_system(
                format!("Failed to read config file: {}", config_path.display()),
                e,
            )
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ConfigError::parse_error(
                format!("Failed to parse config file ({})", config_path.display()),
                e,
            )
        })?;

        config.validate()?;

        Ok(config)
    }

    /// デフォルト設定ファイルを作成
    fn create_default_config(config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::file_system(
                    format!("Failed to create config directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        fs::write(config_path, Self::default_toml_content()).map_err(|e| {
            ConfigError::file_system(
                format!(
                    "Failed to create default config file: {}",
                    config_path.display()
                ),
                e,
            )
        })?;

        Ok(())
    }

    /// デフォルトTOML設定を生成
    ///
    /// APP_CONFIG の値から生成するので、Rust側のデフォルト値とテンプレートがずれない。
    fn default_toml_content() -> String {
        format!(
            r#"# ridelens - User Configuration
# The API key is set with 'ridelens login' (or RIDELENS_API_KEY)

# Timezone offset in seconds used when printing remote expiration times
# Examples: UTC=0, JST(UTC+9)=32400, PST(UTC-8)=-28800
timezone_offset_seconds = {tz}

[remote]
base_url = "{base}"
model = "{model}"

[upload]
# Must be a multiple of 262144 (256 KiB). 0 sends the whole file at once.
chunk_size_bytes = {chunk}

[compression]
height_threshold = {height}
size_threshold_mb = {size:.1}
target_height = {target}

[polling]
interval_ms = {interval}
max_attempts = {attempts}

[engine]
# ffmpeg_path = "/usr/bin/ffmpeg"
# ffprobe_path = "/usr/bin/ffprobe"
"#,
            tz = DEFAULT_TIMEZONE_OFFSET,
            base = APP_CONFIG.api.endpoint,
            model = APP_CONFIG.api.default_model,
            chunk = APP_CONFIG.upload.chunk_size,
            height = APP_CONFIG.compression.height_threshold,
            size = APP_CONFIG.compression.size_threshold_mb,
            target = APP_CONFIG.compression.target_height,
            interval = APP_CONFIG.polling.interval_ms,
            attempts = APP_CONFIG.polling.max_attempts,
        )
    }

    /// ユーザー設定を保存する
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// 指定パスに保存する
    ///
    /// APIキーを含むので保存後にパーミッションを 0600 に絞る。
    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::file_system(
                    format!("Failed to create config directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::serialize_error("Failed to serialize config", e))?;

        fs::write(config_path, content).map_err(|e| {
            ConfigError::file_system(
                format!("Failed to write config file: {}", config_path.display()),
                e,
            )
        })?;

        permissions::set_credential_file_permissions(config_path)
    }

    /// ユーザー設定を検証
    ///
    /// # 検証内容
    /// - auth.api_key: 空文字列でないこと
    /// - timezone_offset_seconds: ±18時間以内
    /// - upload.chunk_size_bytes: 0 または 256 KiB の倍数
    /// - compression: しきい値が正、target_height が正の偶数
    /// - polling: interval_ms > 0, max_attempts >= 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(auth) = &self.auth
            && auth.api_key.trim().is_empty()
        {
            return Err(ConfigError::validation_error(
                "Authentication api_key cannot be empty. Please run 'ridelens login' again.",
            ));
        }

        Self::validate_timezone_offset(self.timezone_offset_seconds)?;

        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::validation_error("remote.base_url cannot be empty"));
        }
        if self.remote.model.trim().is_empty() {
            return Err(ConfigError::validation_error("remote.model cannot be empty"));
        }

        let granularity = APP_CONFIG.upload.chunk_granularity;
        if self.upload.chunk_size_bytes % granularity != 0 {
            return Err(ConfigError::validation_error(format!(
                "upload.chunk_size_bytes ({}) must be 0 or a multiple of {}",
                self.upload.chunk_size_bytes, granularity
            )));
        }

        if self.compression.height_threshold == 0 {
            return Err(ConfigError::validation_error(
                "compression.height_threshold must be greater than 0",
            ));
        }
        if !(self.compression.size_threshold_mb.is_finite()
            && self.compression.size_threshold_mb > 0.0)
        {
            return Err(ConfigError::validation_error(format!(
                "compression.size_threshold_mb ({}) must be a positive number",
                self.compression.size_threshold_mb
            )));
        }
        if self.compression.target_height == 0 || self.compression.target_height % 2 != 0 {
            return Err(ConfigError::validation_error(format!(
                "compression.target_height ({}) must be a positive even number",
                self.compression.target_height
            )));
        }

        if self.polling.interval_ms == 0 {
            return Err(ConfigError::validation_error(
                "polling.interval_ms must be greater than 0",
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(ConfigError::validation_error(
                "polling.max_attempts must be at least 1",
            ));
        }

        Ok(())
    }

    /// タイムゾーンオフセットを検証
    fn validate_timezone_offset(offset: i32) -> Result<(), ConfigError> {
        if !(MIN_TIMEZONE_OFFSET..=MAX_TIMEZONE_OFFSET).contains(&offset) {
            return Err(ConfigError::validation_error(format!(
                "Invalid timezone offset '{}' seconds. Must be between {} and {} (±18 hours)",
                offset, MIN_TIMEZONE_OFFSET, MAX_TIMEZONE_OFFSET
            )));
        }
        Ok(())
    }

    /// APIキーを設定
    pub fn set_auth(&mut self, api_key: String) {
        self.auth = Some(AuthConfig { api_key });
    }

    pub fn has_auth(&self) -> bool {
        self.auth.is_some()
    }

    pub fn clear_auth(&mut self) {
        self.auth = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_path() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("ridelens").join("config.toml");
        (dir, path)
    }

    #[test]
    fn test_has_auth() {
        let mut config = UserConfig::default();
        assert!(!config.has_auth());

        config.set_auth("test_api_key".to_string());
        assert!(config.has_auth());
    }

    #[test]
    fn test_clear_auth() {
        let mut config = UserConfig::default();
        config.set_auth("test_key".to_string());
        config.clear_auth();
        assert!(!config.has_auth());
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = UserConfig::config_path().expect("Failed to get config path");
        assert!(path.to_string_lossy().contains("ridelens"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_load_creates_default_if_not_exists() {
        let (_dir, path) = temp_config_path();
        assert!(!path.exists());

        let config = UserConfig::load_from(&path).expect("Default config should load");

        assert!(path.exists(), "Config file should be created");
        assert!(!config.has_auth());
        assert_eq!(config.upload.chunk_size_bytes, APP_CONFIG.upload.chunk_size);
        assert_eq!(config.polling.max_attempts, 60);
        assert_eq!(config.compression.height_threshold, 480);

        let content = fs::read_to_string(&path).expect("Failed to read config");
        assert!(content.contains("ridelens login"));
        assert!(content.contains("[polling]"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_dir, path) = temp_config_path();

        let mut config = UserConfig {
            timezone_offset_seconds: 32400,
            ..UserConfig::default()
        };
        config.set_auth("key_xyz".to_string());
        config.upload.chunk_size_bytes = 8 * 1024 * 1024;
        config.engine.ffmpeg_path = Some("/opt/ffmpeg/bin/ffmpeg".to_string());

        config.save_to(&path).expect("Failed to save config");
        let loaded = UserConfig::load_from(&path).expect("Failed to load config");

        assert_eq!(loaded.auth.unwrap().api_key, "key_xyz");
        assert_eq!(loaded.timezone_offset_seconds, 32400);
        assert_eq!(loaded.upload.chunk_size_bytes, 8 * 1024 * 1024);
        assert_eq!(
            loaded.engine.ffmpeg_path.as_deref(),
            Some("/opt/ffmpeg/bin/ffmpeg")
        );
        assert!(loaded.engine.ffprobe_path.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let (_dir, path) = temp_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[polling]\ninterval_ms = 250\n").unwrap();

        let config = UserConfig::load_from(&path).expect("Failed to load config");
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.max_attempts, APP_CONFIG.polling.max_attempts);
        assert_eq!(config.remote.model, APP_CONFIG.api.default_model);
    }

    #[test]
    fn test_load_rejects_invalid_chunk_size() {
        let (_dir, path) = temp_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[upload]\nchunk_size_bytes = 1000\n").unwrap();

        let result = UserConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_load_rejects_corrupted_file() {
        let (_dir, path) = temp_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "this is = = not toml").unwrap();

        let result = UserConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_validate_accepts_single_shot_chunking() {
        let mut config = UserConfig::default();
        config.upload.chunk_size_bytes = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_api_key() {
        let mut config = UserConfig::default();
        config.set_auth("  ".to_string());

        if let Err(ConfigError::ValidationError { message }) = config.validate() {
            assert!(message.contains("api_key"));
        } else {
            panic!("Expected ValidationError for empty api_key");
        }
    }

    #[test]
    fn test_validate_rejects_odd_target_height() {
        let mut config = UserConfig::default();
        config.compression.target_height = 481;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = UserConfig::default();
        config.polling.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_timezone_out_of_range() {
        let config = UserConfig {
            timezone_offset_seconds: 90000,
            ..UserConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
