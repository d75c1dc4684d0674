//! ドメイン層
//!
//! 外部I/Oを持たないビジネスルール（ファイル検証、圧縮判定、進捗、解析結果のスキーマ）。

pub mod analysis;
pub mod cancel;
pub mod error;
pub mod formatter;
pub mod media;
pub mod policy;
pub mod progress;
pub mod validator;
