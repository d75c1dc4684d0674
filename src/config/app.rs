//! アプリケーション設定モジュール
//!
//! コンパイル時定数として定義される静的設定を管理します。
//! 実行時に変更したい値（チャンクサイズ、しきい値など）は UserConfig 側で上書きします。

/// 1 MiB（バイト）
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// アプリケーション全体の設定
#[derive(Debug, Clone, Copy)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub upload: UploadConfig,
    pub compression: CompressionConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

/// API関連の設定
#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    /// 解析サービスのベースURL
    pub endpoint: &'static str,

    /// 1リクエストあたりのタイムアウト(秒)
    ///
    /// チャンク転送にはこれ以外のタイムアウトを設けない。
    pub timeout_seconds: u64,

    /// 解析に使用するモデル名
    pub default_model: &'static str,
}

/// アップロード関連の設定
#[derive(Debug, Clone, Copy)]
pub struct UploadConfig {
    /// ローカルで受け付ける最大ファイルサイズ (バイト)
    pub max_file_size: u64,

    /// デフォルトのチャンクサイズ (バイト)
    pub chunk_size: u64,

    /// チャンクサイズの単位（リモートはこの倍数しか受け付けない）
    pub chunk_granularity: u64,

    /// 対応する動画フォーマット（拡張子）
    pub supported_formats: &'static [&'static str],
}

/// 圧縮判定・圧縮処理のデフォルト値
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// この高さ(px)を超えたら圧縮する
    pub height_threshold: u32,

    /// このサイズ(MB, 10^6 バイト)を超えたら圧縮する
    pub size_threshold_mb: f64,

    /// 圧縮後の高さ(px)
    pub target_height: u32,
}

/// ポーリングのデフォルト値
#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

/// ロギング関連の設定
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig {
    /// RUST_LOG が未設定のときのフィルタ
    pub default_level: &'static str,
}

/// グローバルなアプリケーション設定
pub const APP_CONFIG: AppConfig = AppConfig {
    api: ApiConfig {
        endpoint: "https://generativelanguage.googleapis.com",
        timeout_seconds: 300,
        default_model: "gemini-2.0-flash",
    },
    upload: UploadConfig {
        max_file_size: 2 * 1024 * BYTES_PER_MB,
        chunk_size: 3 * BYTES_PER_MB,
        chunk_granularity: 256 * 1024,
        supported_formats: &["mp4", "mov", "avi", "mkv", "webm", "m4v"],
    },
    compression: CompressionConfig {
        height_threshold: 480,
        size_threshold_mb: 3.0,
        target_height: 480,
    },
    polling: PollingConfig {
        interval_ms: 1000,
        max_attempts: 60,
    },
    logging: LoggingConfig {
        default_level: "ridelens=info",
    },
};
