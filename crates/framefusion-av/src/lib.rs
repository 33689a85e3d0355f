//! Transcoding engine plumbing: job descriptions for the four composition
//! recipes, concat manifest rendering, per-request temp artifact tracking,
//! ffmpeg discovery, and the bounded async executor that drives ffmpeg.

pub mod executor;
pub mod job;
pub mod manifest;
pub mod tempset;
pub mod tools;

pub use executor::TranscodeExecutor;
pub use job::{JobSpec, MixMode};
pub use manifest::ConcatManifest;
pub use tempset::TempSet;
