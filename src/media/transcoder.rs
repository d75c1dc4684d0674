//! Transcoder: ffmpeg による縮小・再エンコード
//!
//! 1. エンジン初期化（loading 0 → 100）
//! 2. 一時ディレクトリに入力を書き出す
//! 3. `-progress pipe:1` の出力を compressing の percent に変換
//! 4. 読み戻した出力を新しい `MediaAsset` として返す（done）
//!
//! 元の高さと長さは呼び出し側がプローブ済みのものを渡す。
//!
//! 一時ディレクトリは `TempDir` のドロップで必ず削除される。

use crate::domain::cancel::CancelFlag;
use crate::domain::formatter::format_megabytes;
use crate::domain::media::{MediaAsset, VideoMetadata};
use crate::domain::progress::{ProgressSink, ProgressStage, ProgressTracker};
use crate::media::engine::MediaEngine;
use crate::media::error::MediaError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const OUTPUT_MIME_TYPE: &str = "video/mp4";

/// 固定のエンコード設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

pub const DEFAULT_PROFILE: EncodeProfile = EncodeProfile {
    video_codec: "libx264",
    preset: "veryfast",
    crf: 28,
    audio_codec: "aac",
    audio_bitrate: "96k",
};

pub struct Transcoder {
    engine: Arc<MediaEngine>,
    profile: EncodeProfile,
    cancel: Option<CancelFlag>,
}

impl Transcoder {
    pub fn new(engine: Arc<MediaEngine>) -> Self {
        Self {
            engine,
            profile: DEFAULT_PROFILE,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    /// `target_height` に縮小して再エンコードする
    ///
    /// 元の高さが目標以下なら拡大はせず、元の高さ（偶数に切り下げ）のまま再エンコードする。
    /// `source` の長さが 0 のときは compressing の percent が完了まで 0 のまま。
    pub async fn transcode(
        &self,
        asset: &MediaAsset,
        source: &VideoMetadata,
        target_height: u32,
        on_progress: &mut ProgressSink<'_>,
    ) -> Result<MediaAsset, MediaError> {
        let mut tracker = ProgressTracker::new(on_progress);

        tracker.emit(ProgressStage::Loading, 0, "Loading media engine");
        let engine = self.engine.load().await?;
        tracker.emit(
            ProgressStage::Loading,
            100,
            format!("Media engine ready (ffmpeg {})", engine.version),
        );

        let workdir = tempfile::Builder::new()
            .prefix("ridelens-transcode-")
            .tempdir()
            .map_err(|e| MediaError::temp_storage("create working directory", e))?;
        let input = workdir.path().join(format!("input.{}", asset.extension()));
        let output = workdir.path().join("output.mp4");

        tokio::fs::write(&input, asset.bytes())
            .await
            .map_err(|e| MediaError::temp_storage("write input file", e))?;

        let height = scale_height(source.height, target_height);
        info!(
            source = %source.resolution_label(),
            target_height = height,
            "Transcoding"
        );

        tracker.emit(
            ProgressStage::Compressing,
            0,
            format!("Compressing {} to {}p", source.resolution_label(), height),
        );

        let args = build_ffmpeg_args(&input, &output, height, &self.profile);
        debug!(args = ?args, "Spawning ffmpeg");

        let mut child = Command::new(&engine.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::transcode(format!("failed to start ffmpeg: {}", e)))?;

        // stderr を読み切らないとパイプが詰まる
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| MediaError::transcode(format!("failed to read ffmpeg progress: {}", e)))?
            {
                if self.is_cancelled() {
                    warn!("Transcode cancelled, stopping ffmpeg");
                    let _ = child.kill().await;
                    return Err(MediaError::Cancelled);
                }
                if let Some(ProgressLine::OutTime(micros)) = parse_progress_line(&line)
                    && let Some(percent) = progress_percent(micros, source.duration_seconds)
                {
                    tracker.emit(ProgressStage::Compressing, percent, "Compressing");
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| MediaError::transcode(format!("failed to wait for ffmpeg: {}", e)))?;
        let stderr_text = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        if !status.success() {
            return Err(MediaError::transcode(format!(
                "ffmpeg exited with {}: {}",
                status,
                last_lines(&stderr_text, 5)
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| MediaError::temp_storage("read output file", e))?;
        if bytes.is_empty() {
            return Err(MediaError::transcode("ffmpeg produced an empty file"));
        }

        let compressed = MediaAsset::from_bytes(output_name(asset.name()), OUTPUT_MIME_TYPE, bytes);
        tracker.emit(
            ProgressStage::Done,
            100,
            format!(
                "Compressed {} -> {}",
                format_megabytes(asset.len()),
                format_megabytes(compressed.len())
            ),
        );
        info!(
            input_bytes = asset.len(),
            output_bytes = compressed.len(),
            "Transcode finished"
        );

        Ok(compressed)
    }
}

/// 出力の高さ: `min(元の高さ, 目標)` を偶数に切り下げる（最小 2）
pub fn scale_height(source_height: u32, target_height: u32) -> u32 {
    (source_height.min(target_height) & !1).max(2)
}

pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    height: u32,
    profile: &EncodeProfile,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostats".into()];
    args.extend(["-loglevel".into(), "error".into()]);
    args.extend(["-progress".into(), "pipe:1".into()]);
    args.extend(["-i".into(), path_arg(input)]);
    // 幅は -2 で縦横比を保ったまま偶数に揃える
    args.extend(["-vf".into(), format!("scale=-2:{}", height)]);
    args.extend(["-c:v".into(), profile.video_codec.into()]);
    args.extend(["-preset".into(), profile.preset.into()]);
    args.extend(["-crf".into(), profile.crf.to_string()]);
    args.extend(["-c:a".into(), profile.audio_codec.into()]);
    args.extend(["-b:a".into(), profile.audio_bitrate.into()]);
    args.extend(["-movflags".into(), "+faststart".into()]);
    args.extend(["-y".into(), path_arg(output)]);
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `-progress` 出力の1行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLine {
    /// 処理済みの出力時刻（マイクロ秒）
    OutTime(u64),
    End,
}

/// `key=value` 形式の1行を読む
///
/// `out_time_ms` は名前に反してマイクロ秒。`N/A` や他のキーは無視する。
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.trim().parse().ok().map(ProgressLine::OutTime),
        "progress" if value.trim() == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// 出力時刻と元の長さから percent を求める（長さ不明なら None）
pub fn progress_percent(out_time_us: u64, duration_seconds: f64) -> Option<u8> {
    if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
        return None;
    }
    let ratio = out_time_us as f64 / 1_000_000.0 / duration_seconds;
    Some((ratio * 100.0).floor().clamp(0.0, 100.0) as u8)
}

fn output_name(source_name: &str) -> String {
    let path = PathBuf::from(source_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video".to_string());
    format!("{}.mp4", stem)
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::Progress;

    #[test]
    fn test_scale_height_never_upscales_and_is_even() {
        assert_eq!(scale_height(1080, 480), 480);
        assert_eq!(scale_height(2160, 480), 480);
        assert_eq!(scale_height(360, 480), 360);
        assert_eq!(scale_height(481, 720), 480);
        assert_eq!(scale_height(479, 480), 478);
        assert_eq!(scale_height(1, 480), 2);
    }

    #[test]
    fn test_build_ffmpeg_args() {
        let args = build_ffmpeg_args(
            Path::new("/tmp/w/input.mov"),
            Path::new("/tmp/w/output.mp4"),
            480,
            &DEFAULT_PROFILE,
        );
        let joined = args.join(" ");

        assert!(joined.contains("-progress pipe:1"));
        assert!(joined.contains("-i /tmp/w/input.mov"));
        assert!(joined.contains("-vf scale=-2:480"));
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 28"));
        assert!(joined.contains("-c:a aac -b:a 96k"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.ends_with("-y /tmp/w/output.mp4"));
    }

    #[test]
    fn test_parse_progress_block() {
        let block = "frame=120\nfps=60.0\nout_time_us=4000000\nout_time_ms=4000000\nout_time=00:00:04.000000\nspeed=2.0x\nprogress=continue\n";
        let parsed: Vec<ProgressLine> = block.lines().filter_map(parse_progress_line).collect();
        assert_eq!(
            parsed,
            vec![ProgressLine::OutTime(4_000_000), ProgressLine::OutTime(4_000_000)]
        );

        assert_eq!(parse_progress_line("progress=end"), Some(ProgressLine::End));
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("garbage"), None);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 40.0), Some(0));
        assert_eq!(progress_percent(10_000_000, 40.0), Some(25));
        assert_eq!(progress_percent(40_040_000, 40.0), Some(100));
        assert_eq!(progress_percent(5_000_000, 0.0), None);
    }

    #[test]
    fn test_progress_events_are_monotonic_within_stage() {
        // ffmpeg は同じ out_time を複数回報告することがある
        let samples = [0u64, 1_000_000, 1_000_000, 900_000, 2_000_000, 20_000_000];
        let mut percents = Vec::new();
        {
            let mut sink = |p: Progress| percents.push(p.percent);
            let mut tracker = ProgressTracker::new(&mut sink);
            for micros in samples {
                if let Some(percent) = progress_percent(micros, 20.0) {
                    tracker.emit(ProgressStage::Compressing, percent, "Compressing");
                }
            }
        }
        assert_eq!(percents, vec![0, 5, 10, 100]);
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("Round 1.MOV"), "Round 1.mp4");
        assert_eq!(output_name("clip.mp4"), "clip.mp4");
        assert_eq!(output_name(""), "video.mp4");
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\n\nb\nc\n", 2), "b | c");
        assert_eq!(last_lines("", 3), "");
    }

    #[cfg(unix)]
    mod ffmpeg_runs {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        const SOURCE_1080P: VideoMetadata = VideoMetadata {
            width: 1920,
            height: 1080,
            duration_seconds: 40.0,
        };

        /// `-version` に答え、それ以外は ffmpeg として `body` を実行するスクリプト
        ///
        /// 最後の引数（出力パス）の親ディレクトリを `workdir.txt` に記録する。
        fn fake_ffmpeg(dir: &TempDir, body: &str) -> Arc<MediaEngine> {
            let script = dir.path().join("fake-ff");
            let marker = dir.path().join("workdir.txt");
            std::fs::write(
                &script,
                format!(
                    "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then echo 'ffmpeg version 9.9-test'; exit 0; fi\n\
                     for arg in \"$@\"; do out=\"$arg\"; done\n\
                     dirname \"$out\" > '{}'\n{}\n",
                    marker.display(),
                    body
                ),
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            let path = script.to_string_lossy().into_owned();
            Arc::new(MediaEngine::new(path.clone(), path))
        }

        fn recorded_workdir(dir: &TempDir) -> PathBuf {
            let text = std::fs::read_to_string(dir.path().join("workdir.txt")).unwrap();
            PathBuf::from(text.trim())
        }

        fn source_asset() -> MediaAsset {
            MediaAsset::from_bytes("r.mov", "video/quicktime", vec![7u8; 4096])
        }

        #[tokio::test]
        async fn test_transcode_reports_stages_and_cleans_up() {
            let dir = TempDir::new().unwrap();
            let engine = fake_ffmpeg(
                &dir,
                "echo 'out_time_us=10000000'\necho 'progress=continue'\n\
                 echo 'out_time_us=10000000'\necho 'out_time_us=40000000'\n\
                 echo 'progress=end'\nprintf 'small' > \"$out\"",
            );
            let transcoder = Transcoder::new(engine);

            let mut events = Vec::new();
            let compressed = {
                let mut sink = |p: Progress| events.push((p.stage, p.percent));
                transcoder
                    .transcode(&source_asset(), &SOURCE_1080P, 480, &mut sink)
                    .await
                    .unwrap()
            };

            assert_eq!(
                events,
                vec![
                    (ProgressStage::Loading, 0),
                    (ProgressStage::Loading, 100),
                    (ProgressStage::Compressing, 0),
                    (ProgressStage::Compressing, 25),
                    (ProgressStage::Compressing, 100),
                    (ProgressStage::Done, 100),
                ]
            );
            assert_eq!(compressed.name(), "r.mp4");
            assert_eq!(compressed.mime_type(), "video/mp4");
            assert_eq!(compressed.bytes().as_ref(), b"small");
            assert!(compressed.len() < source_asset().len());

            let workdir = recorded_workdir(&dir);
            assert!(workdir.file_name().unwrap().to_string_lossy().starts_with("ridelens-transcode-"));
            assert!(!workdir.exists());
        }

        #[tokio::test]
        async fn test_nonzero_exit_is_transcode_error() {
            let dir = TempDir::new().unwrap();
            let engine = fake_ffmpeg(&dir, "echo 'Unknown encoder libx264' >&2\nexit 1");
            let transcoder = Transcoder::new(engine);

            let mut sink = |_p: Progress| {};
            let err = transcoder
                .transcode(&source_asset(), &SOURCE_1080P, 480, &mut sink)
                .await
                .unwrap_err();

            match err {
                MediaError::Transcode { reason } => assert!(reason.contains("Unknown encoder")),
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(!recorded_workdir(&dir).exists());
        }

        #[tokio::test]
        async fn test_cancel_stops_ffmpeg_mid_stream() {
            let dir = TempDir::new().unwrap();
            let engine = fake_ffmpeg(
                &dir,
                "echo 'out_time_us=10000000'\necho 'progress=continue'\nexec sleep 30",
            );
            let cancel = CancelFlag::new();
            let transcoder = Transcoder::new(engine).with_cancel(cancel.clone());

            let mut stages = Vec::new();
            let started = std::time::Instant::now();
            let err = {
                let mut sink = |p: Progress| {
                    if p.stage == ProgressStage::Compressing && p.percent >= 25 {
                        cancel.cancel();
                    }
                    stages.push(p.stage);
                };
                transcoder
                    .transcode(&source_asset(), &SOURCE_1080P, 480, &mut sink)
                    .await
                    .unwrap_err()
            };

            assert!(matches!(err, MediaError::Cancelled));
            assert!(started.elapsed() < std::time::Duration::from_secs(10));
            assert!(!stages.contains(&ProgressStage::Done));
            assert!(!recorded_workdir(&dir).exists());
        }
    }
}
