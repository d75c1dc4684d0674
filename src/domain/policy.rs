//! ドメインサービス: 圧縮判定
//!
//! プローブ結果とファイルサイズから、アップロード前に圧縮するかを決める純粋関数。
//! `Compress` になるのは `height > height_threshold` または `size_mb > size_threshold_mb` のときだけ。

use crate::config::{APP_CONFIG, Settings};
use crate::domain::media::{DECIMAL_MB, VideoMetadata};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeDecision {
    Skip,
    Compress,
}

/// 判定結果と、その根拠になったフラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranscodeVerdict {
    pub decision: TranscodeDecision,
    pub is_high_resolution: bool,
    pub is_oversized: bool,
}

impl TranscodeVerdict {
    pub fn should_compress(&self) -> bool {
        self.decision == TranscodeDecision::Compress
    }

    pub fn reason(&self) -> &'static str {
        match (self.is_high_resolution, self.is_oversized) {
            (true, true) => "resolution and file size exceed thresholds",
            (true, false) => "resolution exceeds threshold",
            (false, true) => "file size exceeds threshold",
            (false, false) => "within thresholds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodePolicy {
    pub height_threshold: u32,
    pub size_threshold_mb: f64,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            height_threshold: APP_CONFIG.compression.height_threshold,
            size_threshold_mb: APP_CONFIG.compression.size_threshold_mb,
        }
    }
}

impl TranscodePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            height_threshold: settings.height_threshold,
            size_threshold_mb: settings.size_threshold_mb,
        }
    }

    pub fn decide(&self, metadata: &VideoMetadata, size_bytes: u64) -> TranscodeVerdict {
        let is_high_resolution = metadata.height > self.height_threshold;
        let is_oversized = size_bytes as f64 / DECIMAL_MB > self.size_threshold_mb;

        let decision = if is_high_resolution || is_oversized {
            TranscodeDecision::Compress
        } else {
            TranscodeDecision::Skip
        };

        TranscodeVerdict {
            decision,
            is_high_resolution,
            is_oversized,
        }
    }
}
