//! メディアエンジン（ffmpeg / ffprobe）のハンドル
//!
//! 初期化は実行ファイルの所在と `-version` の確認。`Arc<MediaEngine>` を
//! `VideoProbe` と `Transcoder` に渡して共有する。
//! 同時に `load` を呼んでも初期化は1回だけ走り、他の呼び出しはその結果を待つ。
//! 失敗した初期化は保存しないので、次の呼び出しで再試行される。

use crate::config::Settings;
use crate::media::error::MediaError;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// 初期化済みエンジンの情報
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub version: String,
}

#[derive(Debug)]
pub struct MediaEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
    loaded: OnceCell<EngineInfo>,
}

impl MediaEngine {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            loaded: OnceCell::new(),
        }
    }

    pub fn shared(settings: &Settings) -> Arc<Self> {
        Arc::new(Self::new(
            settings.ffmpeg_path.clone(),
            settings.ffprobe_path.clone(),
        ))
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// エンジンを初期化する（初期化済みなら即座に返る）
    pub async fn load(&self) -> Result<&EngineInfo, MediaError> {
        self.loaded
            .get_or_try_init(|| async {
                debug!(ffmpeg = %self.ffmpeg_path, ffprobe = %self.ffprobe_path, "Loading media engine");
                let version = verify_tool("ffmpeg", &self.ffmpeg_path).await?;
                verify_tool("ffprobe", &self.ffprobe_path).await?;
                info!(version = %version, "Media engine loaded");

                Ok(EngineInfo {
                    ffmpeg_path: self.ffmpeg_path.clone(),
                    ffprobe_path: self.ffprobe_path.clone(),
                    version,
                })
            })
            .await
    }
}

/// `<tool> -version` を実行してバージョン文字列を返す
async fn verify_tool(tool: &str, path: &str) -> Result<String, MediaError> {
    let output = Command::new(path)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| MediaError::engine_load(tool, format!("cannot execute '{}': {}", path, e)))?;

    if !output.status.success() {
        return Err(MediaError::engine_load(
            tool,
            format!("'{} -version' exited with {}", path, output.status),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version_line(&stdout)
        .ok_or_else(|| MediaError::engine_load(tool, "unrecognized -version output"))
}

/// "ffmpeg version 6.1.1-3ubuntu5 Copyright ..." から "6.1.1-3ubuntu5" を取り出す
fn parse_version_line(output: &str) -> Option<String> {
    let first = output.lines().next()?;
    let mut words = first.split_whitespace();
    let _tool = words.next()?;
    if words.next()? != "version" {
        return None;
    }
    words.next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_line() {
        let output = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc 13\n";
        assert_eq!(parse_version_line(output).as_deref(), Some("6.1.1-3ubuntu5"));

        let output = "ffprobe version n7.0 Copyright (c) 2007-2024\n";
        assert_eq!(parse_version_line(output).as_deref(), Some("n7.0"));

        assert!(parse_version_line("").is_none());
        assert!(parse_version_line("usage: something else").is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_load_error_and_not_cached() {
        let engine = MediaEngine::new("/nonexistent/ridelens/ffmpeg", "/nonexistent/ridelens/ffprobe");

        let err = engine.load().await.unwrap_err();
        assert!(matches!(err, MediaError::EngineLoad { ref tool, .. } if tool == "ffmpeg"));
        assert!(!engine.is_loaded());

        // 失敗は保存されないので再試行できる
        assert!(engine.load().await.is_err());
        assert!(!engine.is_loaded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_loads_initialize_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let calls = dir.path().join("calls");
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho call >> '{}'\necho 'ffmpeg version 9.9-test Copyright'\n",
                calls.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = script.to_string_lossy().into_owned();
        let engine = Arc::new(MediaEngine::new(path.clone(), path));

        let (a, b) = tokio::join!(engine.load(), engine.load());
        assert_eq!(a.unwrap().version, "9.9-test");
        assert_eq!(b.unwrap().version, "9.9-test");
        assert!(engine.is_loaded());

        // 2回目以降は実行ファイルを起動しない
        engine.load().await.unwrap();

        let recorded = std::fs::read_to_string(&calls).unwrap();
        // ffmpeg と ffprobe の確認で1回ずつ
        assert_eq!(recorded.lines().count(), 2);
    }
}
