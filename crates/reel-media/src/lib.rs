//! FFmpeg-based media rendering for ReelForge.
//!
//! This crate provides:
//! - FFmpeg command building and execution with cancellation and timeouts
//! - FFprobe duration probing
//! - Deterministic composition parameters (duration reconciliation,
//!   pan/zoom trajectories, overlay timing, avatar picture-in-picture)
//! - Text overlay card rendering
//! - The scene compositor producing one muxed MP4

pub mod command;
pub mod compositor;
pub mod config;
pub mod error;
pub mod filters;
pub mod overlay;
pub mod plan;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{CompositionRequest, Compositor, FfmpegCompositor, RenderedVideo};
pub use config::CompositorConfig;
pub use error::{MediaError, MediaResult};
pub use overlay::{wrap_text, FfmpegOverlayRenderer, OverlayRenderer};
pub use plan::{plan_scene, reconcile_duration, SceneMeasurements, SceneRender, VisualSource};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
