//! FrameFusion: an HTTP service that composes images, audio and video into
//! MP4 outputs by driving ffmpeg.
//!
//! The engine plumbing lives in the `framefusion-av` crate (job specs, concat
//! manifests, the bounded executor, temp artifact tracking); this crate adds
//! input materialization and the HTTP surface.

pub mod resolve;
pub mod server;
