//! Compositor output settings.

use std::path::PathBuf;

/// Output canvas and encoder settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    /// Final zoom factor of the pan/zoom fallback
    pub zoom_max: f64,
    pub font_size: u32,
    /// Vertical centre of the text overlay, as a fraction of canvas height
    pub overlay_y_ratio: f64,
    /// Font file for drawtext; fontconfig default when unset
    pub font_file: Option<PathBuf>,
    /// Background when a scene has neither image nor motion video
    pub background_color: String,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            audio_sample_rate: 44100,
            zoom_max: 1.15,
            font_size: 54,
            overlay_y_ratio: 0.72,
            font_file: None,
            background_color: "0x101010".to_string(),
        }
    }
}

impl CompositorConfig {
    /// Load overrides from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            preset: std::env::var("COMPOSITOR_PRESET").unwrap_or(defaults.preset),
            crf: std::env::var("COMPOSITOR_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crf),
            font_file: std::env::var("COMPOSITOR_FONT_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            ..defaults
        }
    }

    pub fn canvas(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
