//! メディア層
//!
//! ffprobe / ffmpeg を使ったプローブと再エンコード。

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod transcoder;

pub use engine::MediaEngine;
pub use pipeline::CompressionPipeline;
