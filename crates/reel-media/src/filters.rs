//! FFmpeg filter graph construction for scene segments.

use crate::config::CompositorConfig;
use crate::plan::{SceneRender, VisualSource};

/// Input positions within a scene's FFmpeg command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneInputs {
    pub visual: usize,
    pub audio: usize,
    pub overlay: usize,
    pub avatar: Option<usize>,
}

/// Label of the final video stream.
pub const VIDEO_OUT: &str = "[vout]";
/// Label of the final audio stream.
pub const AUDIO_OUT: &str = "[aout]";

/// lavfi source for scenes with neither image nor motion video.
pub fn solid_source(config: &CompositorConfig, duration: f64) -> String {
    format!(
        "color=c={}:s={}:r={}:d={:.3}",
        config.background_color,
        config.canvas(),
        config.fps,
        duration
    )
}

/// Visual chain producing `[base]` at canvas size and frame rate.
fn visual_chain(config: &CompositorConfig, render: &SceneRender, input: usize) -> String {
    let (w, h, fps) = (config.width, config.height, config.fps);
    let duration = render.duration_seconds;

    match render.visual {
        VisualSource::Motion => {
            let hold = if render.motion_hold_seconds > 0.0 {
                format!(",tpad=stop_mode=clone:stop_duration={:.3}", render.motion_hold_seconds)
            } else {
                String::new()
            };
            format!(
                "[{input}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}{hold},trim=duration={duration:.3},setpts=PTS-STARTPTS[base]"
            )
        }
        VisualSource::Still => {
            // Oversample before zoompan to avoid jitter
            let (sw, sh) = (w * 2, h * 2);
            let (step, max, frames) = match render.zoom {
                Some(z) => (z.step(), z.end, z.frames),
                None => (0.0, 1.0, render.frames),
            };
            format!(
                "[{input}:v]scale={sw}:{sh}:force_original_aspect_ratio=increase,crop={sw}:{sh},setsar=1,zoompan=z='min(1+{step:.6}*on,{max:.4})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps},trim=duration={duration:.3},setpts=PTS-STARTPTS[base]"
            )
        }
        VisualSource::Solid => format!("[{input}:v]setsar=1,fps={fps}[base]"),
    }
}

/// Zoompan over a per-frame video stream.
fn zoom_chain(config: &CompositorConfig, render: &SceneRender) -> String {
    let (w, h, fps) = (config.width, config.height, config.fps);
    let (step, max) = render.zoom.map_or((0.0, 1.0), |z| (z.step(), z.end));
    format!(
        "zoompan=z='min(1+{step:.6}*on,{max:.4})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}"
    )
}

fn text_overlay(render: &SceneRender, overlay_input: usize) -> String {
    let overlay = render.overlay;
    format!(
        "[{overlay_input}:v]overlay=x=(W-w)/2:y=H*{:.3}-h/2:enable='between(t,{:.3},{:.3})'",
        overlay.y_ratio, overlay.start, overlay.end
    )
}

/// Complete `-filter_complex` graph for one scene.
///
/// Produces [`VIDEO_OUT`] and [`AUDIO_OUT`]. Solid scenes burn the text card
/// in before zooming; other scenes zoom (or play) first and add the card
/// last.
pub fn scene_filter_graph(config: &CompositorConfig, render: &SceneRender, inputs: SceneInputs) -> String {
    let mut chains = vec![visual_chain(config, render, inputs.visual)];
    let mut current = "[base]";
    let card_first = render.visual == VisualSource::Solid;

    if card_first {
        chains.push(format!("{current}{}[carded]", text_overlay(render, inputs.overlay)));
        chains.push(format!("[carded]{},setsar=1[zoomed]", zoom_chain(config, render)));
        current = "[zoomed]";
    }

    if let (Some(pip), Some(avatar)) = (render.pip, inputs.avatar) {
        chains.push(format!("[{avatar}:v]scale={}:-2,setsar=1[pip]", pip.width));
        chains.push(format!(
            "{current}[pip]overlay=x={m}:y=H-h-{m}:eof_action=pass[withpip]",
            m = pip.margin
        ));
        current = "[withpip]";
    }

    if card_first {
        chains.push(format!("{current}format=yuv420p{VIDEO_OUT}"));
    } else {
        chains.push(format!(
            "{current}{},format=yuv420p{VIDEO_OUT}",
            text_overlay(render, inputs.overlay)
        ));
    }

    chains.push(format!(
        "[{}:a]aresample={},apad,atrim=0:{:.3},asetpts=PTS-STARTPTS{AUDIO_OUT}",
        inputs.audio, config.audio_sample_rate, render.duration_seconds
    ));

    chains.join(";")
}

/// Escape a value for use inside a filter option.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | ';' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan_scene, SceneMeasurements};

    fn render(motion: Option<f64>, still: bool, avatar: bool) -> SceneRender {
        plan_scene(
            &CompositorConfig::default(),
            &SceneMeasurements {
                index: 0,
                estimate_seconds: 4.0,
                audio_seconds: 5.0,
                motion_seconds: motion,
                has_still_image: still,
                has_avatar: avatar,
            },
        )
        .unwrap()
    }

    const INPUTS: SceneInputs = SceneInputs {
        visual: 0,
        audio: 1,
        overlay: 2,
        avatar: None,
    };

    #[test]
    fn test_still_graph_uses_zoompan() {
        let graph = scene_filter_graph(&CompositorConfig::default(), &render(None, true, false), INPUTS);
        assert!(graph.contains("zoompan=z='min(1+0.001000*on,1.1500)'"));
        assert!(graph.contains("d=150:s=1080x1920:fps=30"));
        assert!(graph.contains("enable='between(t,0.000,5.000)'"));
        assert!(graph.ends_with("atrim=0:5.000,asetpts=PTS-STARTPTS[aout]"));
        assert!(!graph.contains("[pip]"));
    }

    #[test]
    fn test_motion_graph_holds_and_trims() {
        let graph = scene_filter_graph(&CompositorConfig::default(), &render(Some(3.0), true, false), INPUTS);
        assert!(graph.contains("tpad=stop_mode=clone:stop_duration=2.000"));
        assert!(graph.contains("trim=duration=5.000"));
        assert!(!graph.contains("zoompan"));
    }

    #[test]
    fn test_avatar_pip_inserted_before_text() {
        let inputs = SceneInputs {
            avatar: Some(3),
            ..INPUTS
        };
        let graph = scene_filter_graph(&CompositorConfig::default(), &render(None, true, true), inputs);
        let pip = graph.find("[3:v]scale=360:-2").unwrap();
        let text = graph.find("[withpip][2:v]overlay").unwrap();
        assert!(pip < text);
        assert!(graph.contains("overlay=x=48:y=H-h-48"));
    }

    #[test]
    fn test_imageless_scene_still_moves() {
        let inputs = SceneInputs {
            avatar: Some(3),
            ..INPUTS
        };
        let graph = scene_filter_graph(&CompositorConfig::default(), &render(None, false, true), inputs);

        assert!(graph.starts_with("[0:v]setsar=1,fps=30[base]"));
        let card = graph.find("[base][2:v]overlay").unwrap();
        let zoom = graph.find("[carded]zoompan=z='min(1+0.001000*on,1.1500)'").unwrap();
        let pip = graph.find("[zoomed][pip]overlay").unwrap();
        assert!(card < zoom && zoom < pip);
        assert!(graph.contains("d=1:s=1080x1920:fps=30"));
        assert!(graph.contains("[withpip]format=yuv420p[vout]"));
        assert_eq!(graph.matches("[2:v]overlay").count(), 1);
    }

    #[test]
    fn test_solid_source() {
        let src = solid_source(&CompositorConfig::default(), 4.5);
        assert_eq!(src, "color=c=0x101010:s=1080x1920:r=30:d=4.500");
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("/tmp/a:b's.txt"), "/tmp/a\\:b\\'s.txt");
    }
}
