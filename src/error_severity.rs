//! エラー深刻度と終了コード
//!
//! 各層（domain, media, api, config）のエラーは `severity()` でこの型を返し、
//! main.rs はエラーチェーンから最初に見つかった深刻度で終了コードを決める。
//! このモジュール自体はどの層にも依存しない。

use serde::Serialize;
use std::fmt;

/// エラーの深刻度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// 入力ファイルの問題（存在しない、空、非対応形式、壊れた動画など）
    ///
    /// **Exit Code: 1**
    UserError,

    /// 設定・認証情報の問題（APIキー未設定、config.tomlの値が不正など）
    ///
    /// **Exit Code: 2**
    ConfigError,

    /// 外部要因（ネットワーク、リモートサービス、ffmpeg の実行失敗など）
    ///
    /// **Exit Code: 3**
    SystemError,
}

impl ErrorSeverity {
    /// 対応する終了コードを返す
    pub fn exit_code(self) -> i32 {
        match self {
            Self::UserError => 1,
            Self::ConfigError => 2,
            Self::SystemError => 3,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserError => write!(f, "user error"),
            Self::ConfigError => write!(f, "configuration error"),
            Self::SystemError => write!(f, "system error"),
        }
    }
}
