//! Composition parameter derivation.
//!
//! Pure functions: given measured asset lengths, decide each scene's final
//! duration, visual source, pan/zoom trajectory, overlay window and
//! picture-in-picture placement.

use crate::config::CompositorConfig;
use crate::error::{MediaError, MediaResult};

/// Margin between the avatar picture-in-picture and the canvas edge.
const PIP_MARGIN: u32 = 48;

/// Measured inputs for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMeasurements {
    pub index: usize,
    pub estimate_seconds: f64,
    pub audio_seconds: f64,
    pub motion_seconds: Option<f64>,
    pub has_still_image: bool,
    pub has_avatar: bool,
}

/// What provides the moving picture of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualSource {
    /// Generated motion video
    Motion,
    /// Product still with a slow zoom-in
    Still,
    /// Flat background colour, zoomed together with the text card
    Solid,
}

/// Linear zoom from `start` to `end` over `frames` frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomTrajectory {
    pub frames: u32,
    pub start: f64,
    pub end: f64,
}

impl ZoomTrajectory {
    /// Zoom increment per frame.
    pub fn step(&self) -> f64 {
        (self.end - self.start) / f64::from(self.frames.max(1))
    }

    pub fn zoom_at(&self, frame: u32) -> f64 {
        (self.start + self.step() * f64::from(frame)).min(self.end)
    }
}

/// When and where the text card is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTiming {
    pub start: f64,
    pub end: f64,
    /// Vertical centre as a fraction of canvas height
    pub y_ratio: f64,
}

/// Avatar picture-in-picture placement, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipPlacement {
    pub width: u32,
    pub margin: u32,
}

/// Fully derived render parameters for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRender {
    pub index: usize,
    pub duration_seconds: f64,
    pub frames: u32,
    pub visual: VisualSource,
    pub zoom: Option<ZoomTrajectory>,
    /// Seconds the last motion frame is held to reach the scene duration
    pub motion_hold_seconds: f64,
    pub overlay: OverlayTiming,
    pub pip: Option<PipPlacement>,
}

/// Final scene length: the longest of audio, motion video and estimate.
pub fn reconcile_duration(audio_seconds: f64, motion_seconds: Option<f64>, estimate_seconds: f64) -> f64 {
    let mut duration = audio_seconds.max(estimate_seconds);
    if let Some(motion) = motion_seconds {
        duration = duration.max(motion);
    }
    duration
}

/// Derive render parameters for one scene.
pub fn plan_scene(config: &CompositorConfig, m: &SceneMeasurements) -> MediaResult<SceneRender> {
    if !(m.audio_seconds.is_finite() && m.audio_seconds > 0.0) {
        return Err(MediaError::invalid_input(format!(
            "scene {} audio is zero-length",
            m.index
        )));
    }
    if let Some(motion) = m.motion_seconds {
        if !(motion.is_finite() && motion > 0.0) {
            return Err(MediaError::invalid_input(format!(
                "scene {} motion video is zero-length",
                m.index
            )));
        }
    }

    let estimate = if m.estimate_seconds.is_finite() { m.estimate_seconds } else { 0.0 };
    let duration = reconcile_duration(m.audio_seconds, m.motion_seconds, estimate);
    let frames = (duration * f64::from(config.fps)).ceil().max(1.0) as u32;

    let visual = match (m.motion_seconds, m.has_still_image) {
        (Some(_), _) => VisualSource::Motion,
        (None, true) => VisualSource::Still,
        (None, false) => VisualSource::Solid,
    };

    // Solid scenes zoom over the text card so the frame still moves
    let zoom = (visual != VisualSource::Motion).then(|| ZoomTrajectory {
        frames,
        start: 1.0,
        end: config.zoom_max,
    });

    let motion_hold_seconds = m
        .motion_seconds
        .map(|motion| (duration - motion).max(0.0))
        .unwrap_or(0.0);

    let pip = m.has_avatar.then(|| PipPlacement {
        width: even(config.width / 3),
        margin: PIP_MARGIN,
    });

    Ok(SceneRender {
        index: m.index,
        duration_seconds: duration,
        frames,
        visual,
        zoom,
        motion_hold_seconds,
        overlay: OverlayTiming {
            start: 0.0,
            end: m.audio_seconds.min(duration),
            y_ratio: config.overlay_y_ratio,
        },
        pip,
    })
}

/// Round down to an even pixel count (yuv420p needs even dimensions).
pub(crate) fn even(value: u32) -> u32 {
    value & !1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurements() -> SceneMeasurements {
        SceneMeasurements {
            index: 2,
            estimate_seconds: 5.0,
            audio_seconds: 4.2,
            motion_seconds: None,
            has_still_image: true,
            has_avatar: false,
        }
    }

    #[test]
    fn test_reconcile_duration_takes_longest() {
        assert_eq!(reconcile_duration(4.2, None, 5.0), 5.0);
        assert_eq!(reconcile_duration(6.1, Some(5.0), 5.0), 6.1);
        assert_eq!(reconcile_duration(3.0, Some(10.0), 4.0), 10.0);
    }

    #[test]
    fn test_still_scene_gets_zoom_over_whole_duration() {
        let config = CompositorConfig::default();
        let render = plan_scene(&config, &measurements()).unwrap();

        assert_eq!(render.visual, VisualSource::Still);
        assert_eq!(render.frames, 150);
        let zoom = render.zoom.unwrap();
        assert_eq!(zoom.frames, 150);
        assert!((zoom.zoom_at(0) - 1.0).abs() < 1e-9);
        assert!((zoom.zoom_at(150) - 1.15).abs() < 1e-9);
        assert!((zoom.zoom_at(1000) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_overlay_follows_spoken_duration() {
        let render = plan_scene(&CompositorConfig::default(), &measurements()).unwrap();
        assert_eq!(render.overlay.start, 0.0);
        assert!((render.overlay.end - 4.2).abs() < 1e-9);
        assert!((render.overlay.y_ratio - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_motion_scene_holds_last_frame() {
        let mut m = measurements();
        m.motion_seconds = Some(3.0);
        m.audio_seconds = 6.5;
        let render = plan_scene(&CompositorConfig::default(), &m).unwrap();

        assert_eq!(render.visual, VisualSource::Motion);
        assert!(render.zoom.is_none());
        assert!((render.duration_seconds - 6.5).abs() < 1e-9);
        assert!((render.motion_hold_seconds - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_solid_fallback_without_image() {
        let mut m = measurements();
        m.has_still_image = false;
        let render = plan_scene(&CompositorConfig::default(), &m).unwrap();
        assert_eq!(render.visual, VisualSource::Solid);

        let zoom = render.zoom.unwrap();
        assert_eq!(zoom.frames, render.frames);
        assert!(zoom.step() > 0.0);
    }

    #[test]
    fn test_avatar_pip_is_a_third_of_width() {
        let mut m = measurements();
        m.has_avatar = true;
        let render = plan_scene(&CompositorConfig::default(), &m).unwrap();
        assert_eq!(render.pip.unwrap().width, 360);
    }

    #[test]
    fn test_zero_length_assets_rejected() {
        let mut m = measurements();
        m.audio_seconds = 0.0;
        assert!(matches!(
            plan_scene(&CompositorConfig::default(), &m),
            Err(MediaError::InvalidInput(_))
        ));

        let mut m = measurements();
        m.motion_seconds = Some(0.0);
        assert!(plan_scene(&CompositorConfig::default(), &m).is_err());
    }

    #[test]
    fn test_even() {
        assert_eq!(even(361), 360);
        assert_eq!(even(360), 360);
    }
}
