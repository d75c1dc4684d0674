//! メディア資産と動画メタデータ
//!
//! `MediaAsset` は生バイト列・MIMEタイプ・元のファイル名の不変ビュー。
//! コアは中身を書き換えず、スライスを読むだけ。`Bytes` なのでチャンク切り出しはコピーしない。

use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 10^6 バイト（圧縮判定のしきい値はこの単位）
pub const DECIMAL_MB: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct MediaAsset {
    name: String,
    mime_type: String,
    bytes: Bytes,
    source_path: Option<PathBuf>,
}

impl MediaAsset {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            source_path: None,
        }
    }

    /// ディスク上のファイルを読み込む
    ///
    /// 元パスを覚えておくので、プローブ時に一時ファイルへ書き出さずに済む。
    pub async fn read_from(path: &Path, mime_type: impl Into<String>) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        Ok(Self {
            name,
            mime_type: mime_type.into(),
            bytes: Bytes::from(bytes),
            source_path: Some(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// `offset` から `length` バイトを切り出す（ゼロコピー）
    ///
    /// 範囲外は末尾で切り詰める。
    pub fn slice(&self, offset: u64, length: u64) -> Bytes {
        let start = (offset as usize).min(self.bytes.len());
        let end = start.saturating_add(length as usize).min(self.bytes.len());
        self.bytes.slice(start..end)
    }

    /// 拡張子（小文字）。名前に無ければ MIME から推定する
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| extension_for_mime_type(&self.mime_type).to_string())
    }
}

/// 動画のメタデータ
///
/// 1回のアップロード試行の間だけ使い、永続化はしない。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

impl VideoMetadata {
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// 拡張子からMIMEタイプを求める
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

fn extension_for_mime_type(mime_type: &str) -> &'static str {
    match mime_type {
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-matroska" => "mkv",
        "video/webm" => "webm",
        "video/x-m4v" => "m4v",
        _ => "mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_is_clamped() {
        let asset = MediaAsset::from_bytes("a.mp4", "video/mp4", vec![0u8, 1, 2, 3, 4]);
        assert_eq!(asset.slice(1, 2).as_ref(), &[1, 2]);
        assert_eq!(asset.slice(3, 10).as_ref(), &[3, 4]);
        assert!(asset.slice(10, 2).is_empty());
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        let asset = MediaAsset::from_bytes("capture", "video/quicktime", Vec::new());
        assert_eq!(asset.extension(), "mov");

        let asset = MediaAsset::from_bytes("Jump.MP4", "video/mp4", Vec::new());
        assert_eq!(asset.extension(), "mp4");
    }

    #[test]
    fn test_mime_type_for_extension() {
        assert_eq!(mime_type_for_extension("MOV"), "video/quicktime");
        assert_eq!(mime_type_for_extension("webm"), "video/webm");
        assert_eq!(mime_type_for_extension("xyz"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_from_keeps_source_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("round.mp4");
        std::fs::write(&path, b"fake video").unwrap();

        let asset = MediaAsset::read_from(&path, "video/mp4").await.unwrap();
        assert_eq!(asset.name(), "round.mp4");
        assert_eq!(asset.len(), 10);
        assert_eq!(asset.source_path(), Some(path.as_path()));
    }
}
