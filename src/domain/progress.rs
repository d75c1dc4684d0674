//! ドメイン層: 進捗イベント定義
//!
//! 圧縮・アップロード処理の各段階を `{stage, percent, message}` のイベントとして表現します。
//! プレゼンテーション層はこれらを受け取り、人間向け表示や機械向けJSONに変換します。

use serde::Serialize;
use std::time::SystemTime;

/// 処理段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// メディアエンジンの初期化中
    Loading,
    /// 再エンコード中
    Compressing,
    /// 圧縮完了
    Done,
    /// 圧縮不要のためスキップ
    Skipped,
    /// チャンク転送中
    Uploading,
    /// リモート側の処理完了待ち
    Processing,
    /// リモートファイルが解析可能になった
    Active,
}

impl ProgressStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Active)
    }
}

/// 進捗情報
///
/// 永続化しない一時的な値。`percent` は 0〜100。
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub stage: ProgressStage,
    pub percent: u8,
    pub message: String,
    /// イベント発生時刻
    #[serde(skip)]
    pub timestamp: SystemTime,
}

impl Progress {
    pub fn new(stage: ProgressStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// 進捗の受け取り手
pub type ProgressSink<'a> = dyn FnMut(Progress) + 'a;

/// 同じ段階の中で percent が増えたときだけ通知する
///
/// 段階が変わったときの最初のイベントは常に通知する。
/// 同じ段階で percent が下がる・変わらない通知は捨てるので、段階内では単調非減少になる。
pub struct ProgressTracker<'a, 'b> {
    sink: &'a mut ProgressSink<'b>,
    last: Option<(ProgressStage, u8)>,
}

impl<'a, 'b> ProgressTracker<'a, 'b> {
    pub fn new(sink: &'a mut ProgressSink<'b>) -> Self {
        Self { sink, last: None }
    }

    /// 通知した場合は true
    pub fn emit(&mut self, stage: ProgressStage, percent: u8, message: impl Into<String>) -> bool {
        let percent = percent.min(100);
        if let Some((last_stage, last_percent)) = self.last
            && last_stage == stage
            && percent <= last_percent
        {
            return false;
        }

        self.last = Some((stage, percent));
        (self.sink)(Progress::new(stage, percent, message));
        true
    }
}

/// `done / total` を `[start, end]` の percent に写像する
pub fn scale_percent(done: u64, total: u64, start: u8, end: u8) -> u8 {
    if total == 0 {
        return end;
    }
    let ratio = (done.min(total) as f64) / (total as f64);
    let span = end.saturating_sub(start) as f64;
    (start as f64 + ratio * span).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamps_percent() {
        let progress = Progress::new(ProgressStage::Compressing, 150, "x");
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn test_tracker_emits_only_on_increase_within_stage() {
        let mut events = Vec::new();
        {
            let mut sink = |p: Progress| events.push((p.stage, p.percent));
            let mut tracker = ProgressTracker::new(&mut sink);

            assert!(tracker.emit(ProgressStage::Compressing, 0, "start"));
            assert!(tracker.emit(ProgressStage::Compressing, 10, ""));
            assert!(!tracker.emit(ProgressStage::Compressing, 10, ""));
            assert!(!tracker.emit(ProgressStage::Compressing, 5, ""));
            assert!(tracker.emit(ProgressStage::Compressing, 11, ""));
            assert!(tracker.emit(ProgressStage::Done, 100, "done"));
        }

        assert_eq!(
            events,
            vec![
                (ProgressStage::Compressing, 0),
                (ProgressStage::Compressing, 10),
                (ProgressStage::Compressing, 11),
                (ProgressStage::Done, 100),
            ]
        );
    }

    #[test]
    fn test_tracker_emits_first_event_of_new_stage_even_if_lower() {
        let mut count = 0;
        {
            let mut sink = |_p: Progress| count += 1;
            let mut tracker = ProgressTracker::new(&mut sink);
            tracker.emit(ProgressStage::Loading, 100, "");
            tracker.emit(ProgressStage::Compressing, 0, "");
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_scale_percent() {
        assert_eq!(scale_percent(0, 100, 0, 50), 0);
        assert_eq!(scale_percent(50, 100, 0, 50), 25);
        assert_eq!(scale_percent(100, 100, 0, 50), 50);
        assert_eq!(scale_percent(200, 100, 0, 50), 50);
        assert_eq!(scale_percent(30, 60, 50, 90), 70);
        assert_eq!(scale_percent(0, 0, 0, 50), 50);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(ProgressStage::Done.is_terminal());
        assert!(ProgressStage::Skipped.is_terminal());
        assert!(ProgressStage::Active.is_terminal());
        assert!(!ProgressStage::Processing.is_terminal());
    }
}
