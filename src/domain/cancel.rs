//! 協調的キャンセル
//!
//! 長い処理（再エンコード、チャンク転送、ポーリング）は各ステップの前にフラグを確認し、
//! 立っていれば次のI/Oを発行せずに中断する。送信済みのリクエストの結果は捨てる。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
