//! VideoProbe: ffprobe でメタデータだけを読む
//!
//! 全フレームのデコードはしない。ffprobe の JSON 出力を型付きで受け取り、
//! 表示上の幅・高さ（回転を反映）と長さを返す。

use crate::domain::media::{MediaAsset, VideoMetadata};
use crate::media::engine::{EngineInfo, MediaEngine};
use crate::media::error::MediaError;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: StreamTags,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfprobeStream {
    /// 90度・270度回転なら幅と高さを入れ替える
    fn is_rotated_quarter(&self) -> bool {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0);
        (degrees.abs().round() as i64) % 180 == 90
    }
}

pub struct VideoProbe {
    engine: Arc<MediaEngine>,
}

impl VideoProbe {
    pub fn new(engine: Arc<MediaEngine>) -> Self {
        Self { engine }
    }

    /// 動画のメタデータを取得する
    ///
    /// ディスク上の資産はそのパスを直接読む。メモリ上にしかない資産は一時ファイルに書き出し、
    /// 戻る時点（成功・失敗どちらでも）で削除する。
    pub async fn probe(&self, asset: &MediaAsset) -> Result<VideoMetadata, MediaError> {
        let engine = self.engine.load().await?;

        if let Some(path) = asset.source_path() {
            return probe_path(engine, path).await;
        }

        let spilled = spill_to_temp_file(asset)?;
        let result = probe_path(engine, spilled.path()).await;
        drop(spilled);
        result
    }
}

fn spill_to_temp_file(asset: &MediaAsset) -> Result<tempfile::NamedTempFile, MediaError> {
    let mut file = tempfile::Builder::new()
        .prefix("ridelens-probe-")
        .suffix(&format!(".{}", asset.extension()))
        .tempfile()
        .map_err(|e| MediaError::temp_storage("create probe file", e))?;
    file.write_all(asset.bytes())
        .and_then(|_| file.flush())
        .map_err(|e| MediaError::temp_storage("write probe file", e))?;
    Ok(file)
}

/// ffprobe を実行してメタデータを返す
async fn probe_path(engine: &EngineInfo, path: &Path) -> Result<VideoMetadata, MediaError> {
    let label = path.display().to_string();

    let output = Command::new(&engine.ffprobe_path)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| MediaError::engine_load("ffprobe", e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::unreadable(
            label,
            format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let metadata = parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout), &label)?;
    debug!(
        path = %label,
        resolution = %metadata.resolution_label(),
        duration = metadata.duration_seconds,
        "Probed video"
    );
    Ok(metadata)
}

/// ffprobe の JSON 出力を `VideoMetadata` に変換する
fn parse_ffprobe_output(json: &str, label: &str) -> Result<VideoMetadata, MediaError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| MediaError::unreadable(label, format!("invalid ffprobe output: {}", e)))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::unreadable(label, "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::unreadable(label, "missing frame dimensions")),
    };
    let (width, height) = if stream.is_rotated_quarter() {
        (height, width)
    } else {
        (width, height)
    };

    let duration_seconds = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let duration_seconds = match duration_seconds {
        Some(d) => d,
        None => {
            // 一部のWebMは長さを持たない。進捗率が出せないだけなので続行する
            warn!(path = %label, "Container reports no duration");
            0.0
        }
    };

    Ok(VideoMetadata {
        width,
        height,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE_1080P: &str = r#"{
        "streams": [{
            "index": 0, "codec_name": "h264", "codec_type": "video",
            "width": 1920, "height": 1080, "duration": "40.000000"
        }],
        "format": { "filename": "round.mp4", "duration": "40.040000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2" }
    }"#;

    #[test]
    fn test_parse_landscape() {
        let metadata = parse_ffprobe_output(LANDSCAPE_1080P, "round.mp4").unwrap();
        assert_eq!(metadata.width, 1920);
        assert_eq!(metadata.height, 1080);
        assert!((metadata.duration_seconds - 40.04).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_phone_video_swaps_dimensions() {
        let json = r#"{
            "streams": [{
                "codec_type": "video", "width": 1920, "height": 1080,
                "side_data_list": [{ "side_data_type": "Display Matrix", "rotation": -90 }]
            }],
            "format": { "duration": "12.5" }
        }"#;
        let metadata = parse_ffprobe_output(json, "phone.mov").unwrap();
        assert_eq!((metadata.width, metadata.height), (1080, 1920));

        let json = r#"{
            "streams": [{ "codec_type": "video", "width": 640, "height": 360, "tags": { "rotate": "180" } }],
            "format": { "duration": "3" }
        }"#;
        let metadata = parse_ffprobe_output(json, "flip.mp4").unwrap();
        assert_eq!((metadata.width, metadata.height), (640, 360));
    }

    #[test]
    fn test_stream_duration_fallback_and_missing_duration() {
        let json = r#"{ "streams": [{ "codec_type": "video", "width": 640, "height": 360, "duration": "20.0" }] }"#;
        let metadata = parse_ffprobe_output(json, "a.webm").unwrap();
        assert_eq!(metadata.duration_seconds, 20.0);

        let json = r#"{ "streams": [{ "codec_type": "video", "width": 640, "height": 360 }], "format": {} }"#;
        let metadata = parse_ffprobe_output(json, "live.webm").unwrap();
        assert_eq!(metadata.duration_seconds, 0.0);
    }

    #[test]
    fn test_unreadable_outputs() {
        let no_video = r#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "1" } }"#;
        assert!(matches!(
            parse_ffprobe_output(no_video, "a.mp4"),
            Err(MediaError::UnreadableMedia { .. })
        ));

        let no_dims = r#"{ "streams": [{ "codec_type": "video", "width": 0, "height": 0 }] }"#;
        assert!(matches!(
            parse_ffprobe_output(no_dims, "a.mp4"),
            Err(MediaError::UnreadableMedia { .. })
        ));

        assert!(matches!(
            parse_ffprobe_output("not json", "a.mp4"),
            Err(MediaError::UnreadableMedia { .. })
        ));
    }

    #[test]
    fn test_spill_uses_asset_extension_and_is_removed() {
        let asset = MediaAsset::from_bytes("clip.mov", "video/quicktime", vec![1u8, 2, 3]);
        let spilled = spill_to_temp_file(&asset).unwrap();
        let path = spilled.path().to_path_buf();

        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mov"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1u8, 2, 3]);

        drop(spilled);
        assert!(!path.exists());
    }
}
