//! 実行時に使う解決済み設定
//!
//! 優先順位: 環境変数 (RIDELENS_*) > config.toml > APP_CONFIG。
//! 上書き後にもう一度 `UserConfig::validate` を通すので、環境変数経由でも不正な値は入らない。

use crate::config::error::ConfigError;
use crate::config::user::UserConfig;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_API_KEY: &str = "RIDELENS_API_KEY";
pub const ENV_API_BASE: &str = "RIDELENS_API_BASE";
pub const ENV_MODEL: &str = "RIDELENS_MODEL";
pub const ENV_CHUNK_SIZE: &str = "RIDELENS_CHUNK_SIZE";
pub const ENV_HEIGHT_THRESHOLD: &str = "RIDELENS_HEIGHT_THRESHOLD";
pub const ENV_SIZE_THRESHOLD_MB: &str = "RIDELENS_SIZE_THRESHOLD_MB";
pub const ENV_POLL_INTERVAL_MS: &str = "RIDELENS_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "RIDELENS_POLL_MAX_ATTEMPTS";
pub const ENV_FFMPEG: &str = "RIDELENS_FFMPEG";
pub const ENV_FFPROBE: &str = "RIDELENS_FFPROBE";

/// 解決済み設定
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timezone_offset_seconds: i32,
    pub chunk_size: u64,
    pub height_threshold: u32,
    pub size_threshold_mb: f64,
    pub target_height: u32,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Settings {
    /// config.toml を読み込み、プロセスの環境変数で上書きする
    pub fn load() -> Result<Self, ConfigError> {
        let user_config = UserConfig::load()?;
        Self::resolve(&user_config)
    }

    pub fn resolve(user_config: &UserConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(user_config, |key| std::env::var(key).ok())
    }

    /// 任意の参照関数で上書きを解決する
    ///
    /// 空文字列の値は未設定として扱う。
    pub fn resolve_with<F>(user_config: &UserConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = user_config.clone();

        if let Some(key) = env(ENV_API_KEY) {
            config.set_auth(key.trim().to_string());
        }
        if let Some(base) = env(ENV_API_BASE) {
            config.remote.base_url = base.trim().to_string();
        }
        if let Some(model) = env(ENV_MODEL) {
            config.remote.model = model.trim().to_string();
        }
        if let Some(raw) = env(ENV_CHUNK_SIZE) {
            config.upload.chunk_size_bytes = parse_env(ENV_CHUNK_SIZE, &raw)?;
        }
        if let Some(raw) = env(ENV_HEIGHT_THRESHOLD) {
            config.compression.height_threshold = parse_env(ENV_HEIGHT_THRESHOLD, &raw)?;
        }
        if let Some(raw) = env(ENV_SIZE_THRESHOLD_MB) {
            config.compression.size_threshold_mb = parse_env(ENV_SIZE_THRESHOLD_MB, &raw)?;
        }
        if let Some(raw) = env(ENV_POLL_INTERVAL_MS) {
            config.polling.interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = env(ENV_POLL_MAX_ATTEMPTS) {
            config.polling.max_attempts = parse_env(ENV_POLL_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(path) = env(ENV_FFMPEG) {
            config.engine.ffmpeg_path = Some(path);
        }
        if let Some(path) = env(ENV_FFPROBE) {
            config.engine.ffprobe_path = Some(path);
        }

        config.validate()?;

        Ok(Self {
            api_key: config.auth.map(|auth| auth.api_key),
            api_base: config.remote.base_url.trim_end_matches('/').to_string(),
            model: config.remote.model,
            timezone_offset_seconds: config.timezone_offset_seconds,
            chunk_size: config.upload.chunk_size_bytes,
            height_threshold: config.compression.height_threshold,
            size_threshold_mb: config.compression.size_threshold_mb,
            target_height: config.compression.target_height,
            poll_interval: Duration::from_millis(config.polling.interval_ms),
            poll_max_attempts: config.polling.max_attempts,
            ffmpeg_path: config
                .engine
                .ffmpeg_path
                .unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: config
                .engine
                .ffprobe_path
                .unwrap_or_else(|| "ffprobe".to_string()),
        })
    }

    /// APIキーを取得
    ///
    /// # Errors
    /// config.toml にも環境変数にも無い場合は ConfigError::TokenNotFound
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or_else(|| {
            ConfigError::token_not_found(format!(
                "API key not found. Run 'ridelens login' or set {}.",
                ENV_API_KEY
            ))
        })
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| {
        ConfigError::validation_error(format!("{} has an invalid value: '{}'", key, raw))
    })
}
