//! Text overlay cards.
//!
//! Spoken text is wrapped and burned into a semi-transparent PNG card which
//! the compositor lays over the scene. The text reaches FFmpeg through a
//! file, so no shell or filter escaping of user text is needed.

use std::path::Path;

use async_trait::async_trait;
use reel_models::AssetRef;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::CompositorConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::escape_filter_value;
use crate::plan::even;

/// Maximum characters per overlay line.
pub const MAX_LINE_CHARS: usize = 24;
/// Maximum overlay lines; extra text is cut with an ellipsis.
pub const MAX_LINES: usize = 4;

const CARD_PADDING: u32 = 36;
const LINE_SPACING: u32 = 14;

/// Renders a scene's text overlay image.
#[async_trait]
pub trait OverlayRenderer: Send + Sync {
    async fn render(
        &self,
        index: usize,
        text: &str,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<AssetRef>;
}

/// Word-wrap text for the overlay card.
///
/// Words longer than a line are hard-split. When the text needs more than
/// `max_lines`, the last line ends with an ellipsis.
pub fn wrap_text(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let max_chars = max_chars.max(2);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    let mut words: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(max_chars) {
            words.push(chunk.iter().collect());
        }
    }

    for word in words {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines && max_lines > 0 {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let keep = max_chars - 1;
            if last.chars().count() > keep {
                *last = last.chars().take(keep).collect::<String>().trim_end().to_string();
            }
            last.push('…');
        }
    }
    lines
}

/// Overlay renderer using FFmpeg `drawtext` on a lavfi colour card.
pub struct FfmpegOverlayRenderer {
    config: CompositorConfig,
}

impl FfmpegOverlayRenderer {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    /// Card size for a given number of lines.
    pub fn card_size(&self, lines: usize) -> (u32, u32) {
        let width = even(self.config.width * 9 / 10);
        let lines = lines.max(1) as u32;
        let height = lines * self.config.font_size + (lines - 1) * LINE_SPACING + 2 * CARD_PADDING;
        (width, even(height + 1))
    }

    fn drawtext_filter(&self, text_file: &Path) -> String {
        let font = match &self.config.font_file {
            Some(path) => format!("fontfile='{}'", escape_filter_value(&path.to_string_lossy())),
            None => "font='Sans'".to_string(),
        };
        format!(
            "drawtext=textfile='{}':{font}:fontsize={}:fontcolor=white:line_spacing={LINE_SPACING}:x=(w-text_w)/2:y=(h-text_h)/2:borderw=2:bordercolor=black@0.6",
            escape_filter_value(&text_file.to_string_lossy()),
            self.config.font_size,
        )
    }
}

#[async_trait]
impl OverlayRenderer for FfmpegOverlayRenderer {
    async fn render(
        &self,
        index: usize,
        text: &str,
        work_dir: &Path,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<AssetRef> {
        let lines = wrap_text(text, MAX_LINE_CHARS, MAX_LINES);
        if lines.is_empty() {
            return Err(MediaError::invalid_input(format!("scene {index} has no overlay text")));
        }

        tokio::fs::create_dir_all(work_dir).await?;
        let text_file = work_dir.join(format!("scene_{index:03}_overlay.txt"));
        let output = work_dir.join(format!("scene_{index:03}_overlay.png"));
        tokio::fs::write(&text_file, lines.join("\n")).await?;

        let (w, h) = self.card_size(lines.len());
        let cmd = FfmpegCommand::new(&output)
            .lavfi(format!("color=c=black@0.45:s={w}x{h}:d=1,format=rgba"))
            .video_filter(self.drawtext_filter(&text_file))
            .single_frame();

        FfmpegRunner::new()
            .with_cancel(cancel)
            .with_timeout(60)
            .run(&cmd)
            .await?;

        if tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0) == 0 {
            return Err(MediaError::invalid_input(format!("scene {index} overlay card is empty")));
        }

        debug!(scene = index, lines = lines.len(), "Rendered overlay card");
        Ok(AssetRef::File(output))
    }
}
