//! アップロード前の圧縮パイプライン
//!
//! probe → 判定 → transcode または skip。
//! Skip のときは元の資産をそのまま（バイト単位で同一のまま）返す。
//! 再エンコードしても小さくならなかった場合も元の資産を使う。

use crate::config::Settings;
use crate::domain::cancel::CancelFlag;
use crate::domain::formatter::format_megabytes;
use crate::domain::media::{MediaAsset, VideoMetadata};
use crate::domain::policy::{TranscodePolicy, TranscodeVerdict};
use crate::domain::progress::{Progress, ProgressSink, ProgressStage};
use crate::media::engine::MediaEngine;
use crate::media::error::MediaError;
use crate::media::probe::VideoProbe;
use crate::media::transcoder::Transcoder;
use std::sync::Arc;
use tracing::{info, warn};

/// 圧縮パイプラインの結果
#[derive(Debug)]
pub struct PreparedMedia {
    pub asset: MediaAsset,
    pub metadata: VideoMetadata,
    pub verdict: TranscodeVerdict,
    pub original_size: u64,
    compressed: bool,
}

impl PreparedMedia {
    /// 実際に再エンコード結果を使っているか
    pub fn was_compressed(&self) -> bool {
        self.compressed
    }
}

pub struct CompressionPipeline {
    probe: VideoProbe,
    transcoder: Transcoder,
    policy: TranscodePolicy,
    target_height: u32,
}

impl CompressionPipeline {
    pub fn new(engine: Arc<MediaEngine>, policy: TranscodePolicy, target_height: u32) -> Self {
        Self {
            probe: VideoProbe::new(Arc::clone(&engine)),
            transcoder: Transcoder::new(engine),
            policy,
            target_height,
        }
    }

    pub fn from_settings(engine: Arc<MediaEngine>, settings: &Settings) -> Self {
        Self::new(
            engine,
            TranscodePolicy::from_settings(settings),
            settings.target_height,
        )
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.transcoder = self.transcoder.with_cancel(cancel);
        self
    }

    /// メタデータと判定だけを返す（エンコードはしない）
    pub async fn inspect(
        &self,
        asset: &MediaAsset,
    ) -> Result<(VideoMetadata, TranscodeVerdict), MediaError> {
        let metadata = self.probe.probe(asset).await?;
        let verdict = self.policy.decide(&metadata, asset.len());
        info!(
            resolution = %metadata.resolution_label(),
            size_bytes = asset.len(),
            decision = ?verdict.decision,
            reason = verdict.reason(),
            "Transcode verdict"
        );
        Ok((metadata, verdict))
    }

    pub async fn prepare(
        &self,
        asset: MediaAsset,
        on_progress: &mut ProgressSink<'_>,
    ) -> Result<PreparedMedia, MediaError> {
        let original_size = asset.len();
        let (metadata, verdict) = self.inspect(&asset).await?;

        if !verdict.should_compress() {
            on_progress(Progress::new(
                ProgressStage::Skipped,
                100,
                format!(
                    "Compression skipped: {}, {} ({})",
                    metadata.resolution_label(),
                    format_megabytes(original_size),
                    verdict.reason()
                ),
            ));
            return Ok(PreparedMedia {
                asset,
                metadata,
                verdict,
                original_size,
                compressed: false,
            });
        }

        let compressed = self
            .transcoder
            .transcode(&asset, &metadata, self.target_height, on_progress)
            .await?;

        if compressed.len() >= original_size {
            warn!(
                original_bytes = original_size,
                output_bytes = compressed.len(),
                "Transcode did not reduce size, keeping the original"
            );
            return Ok(PreparedMedia {
                asset,
                metadata,
                verdict,
                original_size,
                compressed: false,
            });
        }

        Ok(PreparedMedia {
            asset: compressed,
            metadata,
            verdict,
            original_size,
            compressed: true,
        })
    }
}
