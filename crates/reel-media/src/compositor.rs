//! Scene compositor.
//!
//! Each scene is rendered to its own segment with identical encoder
//! settings, then the segments are joined with the concat demuxer in index
//! order. Straight cuts only.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use reel_models::{AssetRef, SceneAsset};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::CompositorConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::{scene_filter_graph, solid_source, SceneInputs, AUDIO_OUT, VIDEO_OUT};
use crate::plan::{plan_scene, SceneMeasurements, SceneRender, VisualSource};
use crate::probe::probe_media;

/// Everything needed to render one job's video.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub job_id: String,
    pub work_dir: PathBuf,
    /// Render-ready scenes sorted by index
    pub scenes: Vec<SceneAsset>,
}

/// The muxed output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub scene_durations: Vec<f64>,
}

/// Merges scene assets into one video file.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn compose(
        &self,
        request: CompositionRequest,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<RenderedVideo>;
}

/// Compositor driving the FFmpeg CLI.
pub struct FfmpegCompositor {
    config: CompositorConfig,
    /// Per-command ceiling in seconds
    command_timeout_secs: u64,
}

impl FfmpegCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            command_timeout_secs: 300,
        }
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    fn runner(&self, cancel: &watch::Receiver<bool>) -> FfmpegRunner {
        FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(self.command_timeout_secs)
    }

    /// Turn an asset reference into an FFmpeg input string.
    async fn materialize(asset: &AssetRef, work_dir: &Path, stem: &str) -> MediaResult<String> {
        match asset {
            AssetRef::Bytes { data, extension } => {
                if data.is_empty() {
                    return Err(MediaError::invalid_input(format!("{stem} is zero-length")));
                }
                let path = work_dir.join(format!("{stem}.{extension}"));
                tokio::fs::write(&path, data.as_slice()).await?;
                Ok(path.to_string_lossy().to_string())
            }
            AssetRef::File(path) => {
                let len = tokio::fs::metadata(path)
                    .await
                    .map_err(|_| MediaError::FileNotFound(path.clone()))?
                    .len();
                if len == 0 {
                    return Err(MediaError::invalid_input(format!("{stem} is zero-length")));
                }
                Ok(path.to_string_lossy().to_string())
            }
            AssetRef::Url(url) if url.trim().is_empty() => {
                Err(MediaError::invalid_input(format!("{stem} has an empty URL")))
            }
            AssetRef::Url(url) => Ok(url.clone()),
        }
    }

    async fn render_scene(
        &self,
        scene: &SceneAsset,
        work_dir: &Path,
        cancel: &watch::Receiver<bool>,
    ) -> MediaResult<(PathBuf, SceneRender)> {
        let index = scene.index;
        let stem = format!("scene_{index:03}");

        let audio_asset = scene
            .audio()
            .ok_or_else(|| MediaError::invalid_input(format!("scene {index} has no audio")))?;
        let overlay_asset = scene
            .overlay_image()
            .ok_or_else(|| MediaError::invalid_input(format!("scene {index} has no overlay")))?;

        let audio = Self::materialize(audio_asset, work_dir, &format!("{stem}_audio")).await?;
        let overlay = Self::materialize(overlay_asset, work_dir, &format!("{stem}_overlay")).await?;

        let motion = match scene.motion_video() {
            Some(asset) => Some(Self::materialize(asset, work_dir, &format!("{stem}_motion")).await?),
            None => None,
        };
        let avatar = match scene.avatar_video() {
            Some(asset) => Some(Self::materialize(asset, work_dir, &format!("{stem}_avatar")).await?),
            None => None,
        };
        let still = match &scene.still_image {
            Some(asset) => Some(Self::materialize(asset, work_dir, &format!("{stem}_still")).await?),
            None => None,
        };

        let audio_info = probe_media(&audio).await?;
        if !audio_info.has_audio {
            return Err(MediaError::Unsupported(format!("scene {index} audio has no audio stream")));
        }
        let motion_seconds = match &motion {
            Some(source) => {
                let info = probe_media(source).await?;
                if !info.has_video {
                    return Err(MediaError::Unsupported(format!(
                        "scene {index} motion asset has no video stream"
                    )));
                }
                Some(info.duration)
            }
            None => None,
        };

        let render = plan_scene(
            &self.config,
            &SceneMeasurements {
                index,
                estimate_seconds: scene.duration_estimate_seconds,
                audio_seconds: audio_info.duration,
                motion_seconds,
                has_still_image: still.is_some(),
                has_avatar: avatar.is_some(),
            },
        )?;

        let output = work_dir.join(format!("{stem}.mp4"));
        let mut cmd = FfmpegCommand::new(&output);
        cmd = match (render.visual, &motion, &still) {
            (VisualSource::Motion, Some(source), _) => cmd.input(source.clone()),
            (VisualSource::Still, _, Some(source)) => cmd.input(source.clone()),
            _ => cmd.lavfi(solid_source(&self.config, render.duration_seconds)),
        };
        cmd = cmd.input(audio).input(overlay);
        let avatar_input = match avatar {
            Some(source) => {
                cmd = cmd.input(source);
                Some(3)
            }
            None => None,
        };

        let graph = scene_filter_graph(
            &self.config,
            &render,
            SceneInputs {
                visual: 0,
                audio: 1,
                overlay: 2,
                avatar: avatar_input,
            },
        );

        let cmd = cmd
            .filter_complex(graph)
            .map(VIDEO_OUT)
            .map(AUDIO_OUT)
            .video_codec(self.config.video_codec.clone())
            .preset(self.config.preset.clone())
            .crf(self.config.crf)
            .pixel_format("yuv420p")
            .output_args(["-r".to_string(), self.config.fps.to_string()])
            .audio_codec(self.config.audio_codec.clone())
            .audio_bitrate(self.config.audio_bitrate.clone())
            .output_args(["-ar".to_string(), self.config.audio_sample_rate.to_string(), "-ac".to_string(), "2".to_string()])
            .duration(render.duration_seconds);

        let started = Instant::now();
        let total_ms = (render.duration_seconds * 1000.0) as i64;
        self.runner(cancel)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    scene = index,
                    out_time_ms = progress.out_time_ms,
                    speed = progress.speed,
                    percent = progress.percentage(total_ms),
                    "Scene render progress"
                );
            })
            .await?;
        debug!(
            scene = index,
            duration = render.duration_seconds,
            visual = ?render.visual,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered scene segment"
        );

        Ok((output, render))
    }

    async fn concat(
        &self,
        segments: &[PathBuf],
        work_dir: &Path,
        output: &Path,
        cancel: &watch::Receiver<bool>,
    ) -> MediaResult<()> {
        let list_path = work_dir.join("concat_list.txt");
        let list: String = segments
            .iter()
            .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
            .collect();
        tokio::fs::write(&list_path, list).await?;

        let cmd = FfmpegCommand::new(output)
            .input_with(["-f", "concat", "-safe", "0"], list_path.to_string_lossy().to_string())
            .output_args(["-c", "copy"])
            .faststart();

        self.runner(cancel).run(&cmd).await
    }
}

/// Scenes must arrive sorted by strictly increasing index.
fn check_order(scenes: &[SceneAsset]) -> MediaResult<()> {
    if scenes.is_empty() {
        return Err(MediaError::invalid_input("no scenes to compose"));
    }
    if scenes.windows(2).any(|w| w[0].index >= w[1].index) {
        return Err(MediaError::invalid_input("scenes are not sorted by index"));
    }
    Ok(())
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        request: CompositionRequest,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<RenderedVideo> {
        check_order(&request.scenes)?;
        tokio::fs::create_dir_all(&request.work_dir).await?;

        info!(
            job_id = %request.job_id,
            scenes = request.scenes.len(),
            "Compositing video"
        );

        let mut segments = Vec::with_capacity(request.scenes.len());
        let mut scene_durations = Vec::with_capacity(request.scenes.len());
        for scene in &request.scenes {
            let (segment, render) = self.render_scene(scene, &request.work_dir, &cancel).await?;
            segments.push(segment);
            scene_durations.push(render.duration_seconds);
        }

        let output = request.work_dir.join("final.mp4");
        self.concat(&segments, &request.work_dir, &output, &cancel).await?;

        let info = probe_media(&output.to_string_lossy()).await?;
        if info.duration <= 0.0 || info.size == 0 {
            return Err(MediaError::invalid_input("rendered video is empty"));
        }

        info!(
            job_id = %request.job_id,
            duration = info.duration,
            size_bytes = info.size,
            "Composite ready"
        );

        Ok(RenderedVideo {
            path: output,
            duration_seconds: info.duration,
            size_bytes: info.size,
            scene_durations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::AssetKind;

    fn scene(index: usize) -> SceneAsset {
        SceneAsset::new(index, 4.0)
    }

    #[test]
    fn test_check_order() {
        assert!(check_order(&[]).is_err());
        assert!(check_order(&[scene(0), scene(1), scene(2)]).is_ok());
        assert!(check_order(&[scene(1), scene(0)]).is_err());
        assert!(check_order(&[scene(0), scene(0)]).is_err());
    }

    #[tokio::test]
    async fn test_materialize_rejects_zero_length() {
        let dir = tempfile::tempdir().unwrap();
        let err = FfmpegCompositor::materialize(&AssetRef::bytes(Vec::new(), "mp3"), dir.path(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));

        let empty = dir.path().join("empty.png");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(FfmpegCompositor::materialize(&AssetRef::File(empty), dir.path(), "b")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_materialize_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = FfmpegCompositor::materialize(&AssetRef::bytes(vec![1, 2, 3], "mp3"), dir.path(), "scene_000_audio")
            .await
            .unwrap();
        assert!(source.ends_with("scene_000_audio.mp3"));
        assert_eq!(tokio::fs::read(&source).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_audio_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut asset = scene(0);
        asset
            .attach(AssetKind::OverlayImage, AssetRef::url("https://cdn/o.png"))
            .unwrap();
        let (_tx, rx) = watch::channel(false);
        let err = FfmpegCompositor::new(CompositorConfig::default())
            .compose(
                CompositionRequest {
                    job_id: "job".into(),
                    work_dir: dir.path().to_path_buf(),
                    scenes: vec![asset],
                },
                rx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
