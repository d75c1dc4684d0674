//! 再開可能チャンクアップロード
//!
//! 状態遷移: `Idle → Started → Uploading → Finalizing → Processing → Active | Failed`
//!
//! - セッション開始で総バイト数・MIME・表示名を宣言し、アップロードURLを受け取る
//! - チャンクはオフセット順に1つずつ送る。最後のチャンクだけ finalize を付ける
//! - 失敗したチャンクは自動再送しない。`bytes_sent` は確認済みの位置のまま残るので、
//!   呼び出し側は同じセッションで `upload_chunks` をもう一度呼べば続きから送れる
//! - finalize 後は状態取得を一定間隔でポーリングし、ACTIVE / FAILED / 回数上限で終わる
//!
//! セッションは呼び出し側が `&mut` で排他的に所有する。同じセッションへの並行送信はできない。

use crate::api::auth::AuthManager;
use crate::api::client::{ApiClient, read_error_body};
use crate::api::error::InfraError;
use crate::api::types::{FileEnvelope, RemoteFileHandle, RemoteFileState, StartUploadRequest};
use crate::config::Settings;
use crate::domain::cancel::CancelFlag;
use crate::domain::media::MediaAsset;
use crate::domain::progress::{
    Progress, ProgressSink, ProgressStage, ProgressTracker, scale_percent,
};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const START_ENDPOINT: &str = "/upload/v1beta/files";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

const HEADER_PROTOCOL: &str = "X-Goog-Upload-Protocol";
const HEADER_COMMAND: &str = "X-Goog-Upload-Command";
const HEADER_OFFSET: &str = "X-Goog-Upload-Offset";
const HEADER_DECLARED_LENGTH: &str = "X-Goog-Upload-Header-Content-Length";
const HEADER_DECLARED_TYPE: &str = "X-Goog-Upload-Header-Content-Type";

/// 308 Resume Incomplete
const STATUS_RESUME_INCOMPLETE: u16 = 308;

/// 各段階の percent 範囲
const UPLOAD_PERCENT: (u8, u8) = (0, 50);
const PROCESSING_PERCENT: (u8, u8) = (50, 90);

// ============================================================================
// チャンク計画
// ============================================================================

/// チャンクに付けるコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCommand {
    Continue,
    Finalize,
}

impl ChunkCommand {
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Continue => "upload",
            Self::Finalize => "upload, finalize",
        }
    }

    pub fn is_finalize(self) -> bool {
        self == Self::Finalize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    pub offset: u64,
    pub length: u64,
    pub command: ChunkCommand,
}

/// `total_bytes` を `chunk_size` ごとに区切る計画
///
/// `chunk_size` が 0 または総サイズ以上なら1チャンク（単発アップロード）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_bytes: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    pub fn new(total_bytes: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 || chunk_size >= total_bytes {
            total_bytes.max(1)
        } else {
            chunk_size
        };
        Self {
            total_bytes,
            chunk_size,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// チャンク数 = ceil(total / chunk_size)
    pub fn len(&self) -> usize {
        self.total_bytes.div_ceil(self.chunk_size) as usize
    }

    /// 確認済みオフセット以降のチャンクだけを返す
    pub fn resume_from(&self, offset: u64) -> ChunkIter {
        ChunkIter {
            next_offset: offset.min(self.total_bytes),
            total_bytes: self.total_bytes,
            chunk_size: self.chunk_size,
        }
    }
}

pub struct ChunkIter {
    next_offset: u64,
    total_bytes: u64,
    chunk_size: u64,
}

impl Iterator for ChunkIter {
    type Item = ChunkSpec;

    fn next(&mut self) -> Option<ChunkSpec> {
        if self.next_offset >= self.total_bytes {
            return None;
        }
        let offset = self.next_offset;
        let length = self.chunk_size.min(self.total_bytes - offset);
        self.next_offset = offset + length;

        let command = if self.next_offset == self.total_bytes {
            ChunkCommand::Finalize
        } else {
            ChunkCommand::Continue
        };

        Some(ChunkSpec {
            index: (offset / self.chunk_size) as usize,
            offset,
            length,
            command,
        })
    }
}

// ============================================================================
// セッション
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Started,
    Uploading,
    Finalizing,
    Processing,
    Active,
    Failed,
}

impl SessionState {
    fn accepts_chunks(self) -> bool {
        matches!(self, Self::Started | Self::Uploading)
    }
}

impl From<RemoteFileState> for SessionState {
    fn from(state: RemoteFileState) -> Self {
        match state {
            RemoteFileState::Processing => Self::Processing,
            RemoteFileState::Active => Self::Active,
            RemoteFileState::Failed => Self::Failed,
        }
    }
}

/// 1回のアップロード試行の状態
#[derive(Debug, Clone)]
pub struct UploadSession {
    upload_url: String,
    total_bytes: u64,
    bytes_sent: u64,
    remote_file_name: Option<String>,
    remote_file_uri: Option<String>,
    state: SessionState,
}

impl UploadSession {
    fn idle(total_bytes: u64) -> Self {
        Self {
            upload_url: String::new(),
            total_bytes,
            bytes_sent: 0,
            remote_file_name: None,
            remote_file_uri: None,
            state: SessionState::Idle,
        }
    }

    fn begin(&mut self, upload_url: String) {
        self.upload_url = upload_url;
        self.state = SessionState::Started;
    }

    fn record_remote_file(&mut self, handle: &RemoteFileHandle) {
        self.remote_file_name = Some(handle.name.clone());
        self.remote_file_uri = Some(handle.uri.clone());
        self.state = handle.state.into();
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn remote_file_name(&self) -> Option<&str> {
        self.remote_file_name.as_deref()
    }

    pub fn remote_file_uri(&self) -> Option<&str> {
        self.remote_file_uri.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

/// チャンク送信の確認応答
#[derive(Debug, Clone)]
pub enum ChunkAck {
    /// 続きを受け付けた
    Continue { bytes_sent: u64 },
    /// 最後のチャンクを受け付け、リモートファイルが作られた
    Finalized(RemoteFileHandle),
}

// ============================================================================
// アップローダー
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadOptions {
    pub chunk_size: u64,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl UploadOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            poll_interval: settings.poll_interval,
            max_poll_attempts: settings.poll_max_attempts,
        }
    }
}

pub struct ChunkedUploader {
    client: ApiClient,
    auth: AuthManager,
    options: UploadOptions,
}

impl ChunkedUploader {
    pub fn new(client: ApiClient, auth: AuthManager, options: UploadOptions) -> Self {
        Self {
            client,
            auth,
            options,
        }
    }

    /// アップロード全体: セッション開始 → チャンク転送 → ACTIVE まで待機
    ///
    /// 途中で失敗したセッションは返さない。確認済みの位置から再開したい呼び出し側は
    /// `start_session` と `upload_chunks` を直接使い、失敗後も同じセッションで呼び直す。
    pub async fn upload(
        &self,
        asset: &MediaAsset,
        cancel: &CancelFlag,
        on_progress: &mut ProgressSink<'_>,
    ) -> Result<RemoteFileHandle, InfraError> {
        if cancel.is_cancelled() {
            return Err(InfraError::Cancelled);
        }

        let mut session = self.start_session(asset).await?;
        let handle = self
            .upload_chunks(&mut session, asset, cancel, on_progress)
            .await?;
        debug!(
            uri = session.remote_file_uri().unwrap_or_default(),
            bytes_sent = session.bytes_sent(),
            state = ?session.state(),
            "All chunks delivered"
        );

        let handle = match handle.state {
            RemoteFileState::Active => {
                on_progress(Progress::new(
                    ProgressStage::Active,
                    100,
                    format!("Remote file ready: {}", handle.name),
                ));
                handle
            }
            RemoteFileState::Failed => {
                return Err(InfraError::RemoteProcessingFailed { name: handle.name });
            }
            RemoteFileState::Processing => {
                self.poll_until_active(&handle.name, cancel, on_progress)
                    .await?
            }
        };

        Ok(handle)
    }

    /// セッションを開始してアップロードURLを受け取る
    pub async fn start_session(&self, asset: &MediaAsset) -> Result<UploadSession, InfraError> {
        if asset.is_empty() {
            return Err(InfraError::session_start(None, "cannot upload an empty asset"));
        }

        let mut session = UploadSession::idle(asset.len());
        let headers = [
            (HEADER_PROTOCOL, "resumable".to_string()),
            (HEADER_COMMAND, "start".to_string()),
            (HEADER_DECLARED_LENGTH, asset.len().to_string()),
            (HEADER_DECLARED_TYPE, asset.mime_type().to_string()),
        ];

        let response = self
            .client
            .post_json(
                START_ENDPOINT,
                &StartUploadRequest::new(asset.name()),
                &headers,
                Some(&self.auth),
            )
            .await
            .map_err(|e| InfraError::session_start(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            return Err(InfraError::session_start(Some(status.as_u16()), body));
        }

        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                InfraError::session_start(Some(status.as_u16()), "no upload URL was returned")
            })?;

        session.begin(upload_url);
        info!(
            name = asset.name(),
            total_bytes = asset.len(),
            mime_type = asset.mime_type(),
            "Upload session started"
        );
        Ok(session)
    }

    /// 1チャンクを送る
    ///
    /// `offset` は `session.bytes_sent()` と一致しなければならない（ネットワークI/Oの前に検査）。
    /// 失敗時、`bytes_sent` は変わらない。
    pub async fn send_chunk(
        &self,
        session: &mut UploadSession,
        offset: u64,
        bytes: Bytes,
        is_last: bool,
    ) -> Result<ChunkAck, InfraError> {
        if !session.state.accepts_chunks() {
            return Err(InfraError::chunk_upload(
                offset,
                None,
                format!("session does not accept chunks in state {:?}", session.state),
            ));
        }
        if offset != session.bytes_sent {
            return Err(InfraError::ChunkOffsetMismatch {
                expected: session.bytes_sent,
                actual: offset,
            });
        }

        let length = bytes.len() as u64;
        let end = offset + length;
        if length == 0 || end > session.total_bytes {
            return Err(InfraError::chunk_upload(
                offset,
                None,
                format!(
                    "chunk of {} bytes does not fit the declared length {}",
                    length, session.total_bytes
                ),
            ));
        }
        if is_last != (end == session.total_bytes) {
            return Err(InfraError::chunk_upload(
                offset,
                None,
                "only the chunk ending at the declared length may finalize",
            ));
        }

        let command = if is_last {
            ChunkCommand::Finalize
        } else {
            ChunkCommand::Continue
        };
        let previous_state = session.state;
        session.state = if is_last {
            SessionState::Finalizing
        } else {
            SessionState::Uploading
        };

        debug!(offset, length, command = command.header_value(), "Sending chunk");
        let headers = [
            (HEADER_OFFSET, offset.to_string()),
            (HEADER_COMMAND, command.header_value().to_string()),
        ];

        let result = self
            .transfer_chunk(session.upload_url(), offset, bytes, &headers, is_last)
            .await;

        match result {
            Ok(None) => {
                session.bytes_sent = end;
                Ok(ChunkAck::Continue { bytes_sent: end })
            }
            Ok(Some(handle)) => {
                session.bytes_sent = end;
                session.record_remote_file(&handle);
                info!(name = %handle.name, state = %handle.state, "Upload finalized");
                Ok(ChunkAck::Finalized(handle))
            }
            Err(e) => {
                session.state = previous_state;
                Err(e)
            }
        }
    }

    /// チャンクを POST し、finalize ならリモートファイルを返す
    async fn transfer_chunk(
        &self,
        upload_url: &str,
        offset: u64,
        bytes: Bytes,
        headers: &[(&str, String)],
        is_last: bool,
    ) -> Result<Option<RemoteFileHandle>, InfraError> {
        let response = self
            .client
            .post_bytes(upload_url, bytes, headers, Some(&self.auth))
            .await
            .map_err(|e| InfraError::chunk_upload(offset, None, e.to_string()))?;

        let status = response.status();
        if !(status.is_success() || status.as_u16() == STATUS_RESUME_INCOMPLETE) {
            let body = read_error_body(response).await;
            return Err(InfraError::chunk_upload(offset, Some(status.as_u16()), body));
        }

        if !is_last {
            return Ok(None);
        }

        let envelope: FileEnvelope = response.json().await.map_err(|e| {
            InfraError::chunk_upload(
                offset,
                Some(status.as_u16()),
                format!("invalid finalize response: {}", e),
            )
        })?;

        envelope.file.map(Some).ok_or_else(|| {
            InfraError::chunk_upload(
                offset,
                Some(status.as_u16()),
                "finalize response carried no file",
            )
        })
    }

    /// `session.bytes_sent()` から残りのチャンクを送る
    pub async fn upload_chunks(
        &self,
        session: &mut UploadSession,
        asset: &MediaAsset,
        cancel: &CancelFlag,
        on_progress: &mut ProgressSink<'_>,
    ) -> Result<RemoteFileHandle, InfraError> {
        if asset.len() != session.total_bytes {
            return Err(InfraError::chunk_upload(
                session.bytes_sent,
                None,
                format!(
                    "asset is {} bytes but the session declared {}",
                    asset.len(),
                    session.total_bytes
                ),
            ));
        }

        let plan = ChunkPlan::new(session.total_bytes, self.options.chunk_size);
        let total = plan.total_bytes();
        let chunk_count = plan.len();
        let mut tracker = ProgressTracker::new(on_progress);
        tracker.emit(
            ProgressStage::Uploading,
            scale_percent(session.bytes_sent, total, UPLOAD_PERCENT.0, UPLOAD_PERCENT.1),
            format!("Uploading {} in {} chunk(s)", asset.name(), chunk_count),
        );

        for chunk in plan.resume_from(session.bytes_sent) {
            if cancel.is_cancelled() {
                warn!(offset = chunk.offset, "Upload cancelled");
                return Err(InfraError::Cancelled);
            }

            let bytes = asset.slice(chunk.offset, chunk.length);
            let ack = self
                .send_chunk(session, chunk.offset, bytes, chunk.command.is_finalize())
                .await?;

            match ack {
                ChunkAck::Continue { bytes_sent } => {
                    tracker.emit(
                        ProgressStage::Uploading,
                        scale_percent(bytes_sent, total, UPLOAD_PERCENT.0, UPLOAD_PERCENT.1),
                        format!("Uploaded chunk {}/{}", chunk.index + 1, chunk_count),
                    );
                }
                ChunkAck::Finalized(handle) => {
                    tracker.emit(
                        ProgressStage::Uploading,
                        UPLOAD_PERCENT.1,
                        format!("Uploaded chunk {}/{}", chunk.index + 1, chunk_count),
                    );
                    return Ok(handle);
                }
            }
        }

        Err(InfraError::chunk_upload(
            session.bytes_sent,
            None,
            "upload ended without a finalize acknowledgment",
        ))
    }

    /// リモートファイルが ACTIVE になるまで待つ
    ///
    /// 取得自体の失敗（ネットワーク・非2xx）も1回分の試行として数え、次の周期で再試行する。
    pub async fn poll_until_active(
        &self,
        file_name: &str,
        cancel: &CancelFlag,
        on_progress: &mut ProgressSink<'_>,
    ) -> Result<RemoteFileHandle, InfraError> {
        let max_attempts = self.options.max_poll_attempts.max(1);
        let mut tracker = ProgressTracker::new(on_progress);
        let mut last_state = RemoteFileState::Processing;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(InfraError::Cancelled);
            }

            match self.fetch_file(file_name).await {
                Ok(handle) => {
                    debug!(attempt, state = %handle.state, "Polled remote file");
                    if handle.state != last_state {
                        info!(name = file_name, from = %last_state, to = %handle.state, "Remote state changed");
                    }
                    last_state = handle.state;
                    match handle.state {
                        RemoteFileState::Active => {
                            tracker.emit(
                                ProgressStage::Active,
                                100,
                                format!("Remote file ready: {}", handle.name),
                            );
                            return Ok(handle);
                        }
                        RemoteFileState::Failed => {
                            return Err(InfraError::RemoteProcessingFailed {
                                name: handle.name,
                            });
                        }
                        RemoteFileState::Processing => {}
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Status check failed, retrying");
                }
            }

            tracker.emit(
                ProgressStage::Processing,
                scale_percent(
                    attempt as u64,
                    max_attempts as u64,
                    PROCESSING_PERCENT.0,
                    PROCESSING_PERCENT.1,
                ),
                format!("Waiting for remote processing ({}/{})", attempt, max_attempts),
            );

            if attempt < max_attempts {
                if cancel.is_cancelled() {
                    return Err(InfraError::Cancelled);
                }
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }

        Err(InfraError::ProcessingTimeout {
            last_state,
            attempts: max_attempts,
        })
    }

    async fn fetch_file(&self, file_name: &str) -> Result<RemoteFileHandle, InfraError> {
        let endpoint = format!("/v1beta/{}", file_name);
        let response = self.client.get(&endpoint, Some(&self.auth)).await?;
        let response = ApiClient::check_response(response, &endpoint).await?;
        ApiClient::parse_json(response, &endpoint).await
    }
}
