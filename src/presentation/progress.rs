/// プレゼンテーション層: 進捗表示
///
/// ドメイン層の`Progress`をUI表示に適した形式に変換します。
///
/// # 設計方針
/// - `From<&Progress>`で借用による変換（所有権を奪わない）
/// - リモート処理待ちの行は10秒ごとにだけ出す（それ以外は`None`で抑制）
/// - 人間向けはstderr、機械向けはstdoutに1行1JSON
use crate::domain::progress::{Progress, ProgressStage};
use std::time::{Duration, SystemTime};

/// 処理待ち行の表示間隔
const PROCESSING_DISPLAY_INTERVAL: Duration = Duration::from_secs(10);

/// 進捗表示のカテゴリ
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressCategory {
    /// エンジン準備・再エンコード
    Compression,
    /// チャンク転送
    Upload,
    /// リモート処理待ち
    Processing,
    /// 段階の完了
    Completed,
}

/// プレゼンテーション層用の進捗情報
#[derive(Debug, Clone)]
pub struct DisplayProgress {
    /// 表示用メッセージ
    pub message: String,
    /// 進捗カテゴリ
    pub category: ProgressCategory,
}

impl From<&Progress> for DisplayProgress {
    fn from(progress: &Progress) -> Self {
        let category = match progress.stage {
            stage if stage.is_terminal() => ProgressCategory::Completed,
            ProgressStage::Uploading => ProgressCategory::Upload,
            ProgressStage::Processing => ProgressCategory::Processing,
            _ => ProgressCategory::Compression,
        };

        let message = match category {
            ProgressCategory::Completed => format!("✓ {}", progress.message),
            _ => format!("[{:>3}%] {}", progress.percent, progress.message),
        };

        Self { message, category }
    }
}

/// 進捗イベントを出力する
///
/// 処理待ちの行を間引くために直前の表示時刻を覚えている。
pub struct ProgressPrinter {
    machine_output: bool,
    last_processing_shown: Option<SystemTime>,
}

impl ProgressPrinter {
    pub fn new(machine_output: bool) -> Self {
        Self {
            machine_output,
            last_processing_shown: None,
        }
    }

    /// 1イベントを出力する（抑制した場合は何もしない）
    pub fn print(&mut self, progress: &Progress) {
        if self.machine_output {
            // 機械向けは間引かない
            let json = serde_json::json!({
                "type": "progress",
                "stage": progress.stage,
                "percent": progress.percent,
                "message": progress.message,
            });
            println!("{}", json);
            return;
        }

        if let Some(display) = self.to_display(progress) {
            eprintln!("{}", display.message);
        }
    }

    /// 表示すべきなら`Some`
    fn to_display(&mut self, progress: &Progress) -> Option<DisplayProgress> {
        if progress.stage == ProgressStage::Processing {
            if let Some(last) = self.last_processing_shown
                && progress
                    .timestamp
                    .duration_since(last)
                    .is_ok_and(|elapsed| elapsed < PROCESSING_DISPLAY_INTERVAL)
            {
                return None;
            }
            self.last_processing_shown = Some(progress.timestamp);
        }

        Some(DisplayProgress::from(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(stage: ProgressStage, percent: u8, seconds: u64) -> Progress {
        let mut progress = Progress::new(stage, percent, "working");
        progress.timestamp = SystemTime::UNIX_EPOCH + Duration::from_secs(seconds);
        progress
    }

    #[test]
    fn test_categories() {
        let display = DisplayProgress::from(&Progress::new(ProgressStage::Compressing, 42, "Encoding"));
        assert_eq!(display.category, ProgressCategory::Compression);
        assert_eq!(display.message, "[ 42%] Encoding");

        let display = DisplayProgress::from(&Progress::new(ProgressStage::Skipped, 100, "Skipped"));
        assert_eq!(display.category, ProgressCategory::Completed);
        assert!(display.message.starts_with('✓'));
    }

    #[test]
    fn test_processing_lines_are_throttled_to_ten_seconds() {
        let mut printer = ProgressPrinter::new(false);

        let shown: Vec<u64> = (0..=25)
            .filter(|&second| {
                printer
                    .to_display(&at(ProgressStage::Processing, 50, second))
                    .is_some()
            })
            .collect();

        assert_eq!(shown, vec![0, 10, 20]);
    }

    #[test]
    fn test_other_stages_are_never_throttled() {
        let mut printer = ProgressPrinter::new(false);
        for second in 0..5 {
            assert!(
                printer
                    .to_display(&at(ProgressStage::Uploading, second as u8, second))
                    .is_some()
            );
        }
        assert!(printer.to_display(&at(ProgressStage::Processing, 50, 5)).is_some());
        assert!(printer.to_display(&at(ProgressStage::Active, 100, 6)).is_some());
    }
}
