//! Per-scene generated media bundles.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};

/// Location of one generated asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRef {
    /// In-memory buffer with its file extension (e.g. "mp3").
    Bytes { data: Arc<Vec<u8>>, extension: String },
    /// Local file.
    File(PathBuf),
    /// Remote URL.
    Url(String),
}

impl AssetRef {
    pub fn bytes(data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self::Bytes {
            data: Arc::new(data),
            extension: extension.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Zero-length buffers and empty URLs are unusable.
    pub fn is_empty(&self) -> bool {
        match self {
            AssetRef::Bytes { data, .. } => data.is_empty(),
            AssetRef::File(path) => path.as_os_str().is_empty(),
            AssetRef::Url(url) => url.trim().is_empty(),
        }
    }
}

/// Kinds of generated media attached to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Audio,
    AvatarVideo,
    MotionVideo,
    OverlayImage,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Audio,
        AssetKind::AvatarVideo,
        AssetKind::MotionVideo,
        AssetKind::OverlayImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::AvatarVideo => "avatar",
            AssetKind::MotionVideo => "motion",
            AssetKind::OverlayImage => "overlay",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media bundle for one scene.
///
/// Each slot is written at most once; a ready asset is never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneAsset {
    pub index: usize,
    pub duration_estimate_seconds: f64,
    /// Product still used as motion input and pan/zoom fallback
    pub still_image: Option<AssetRef>,
    audio: Option<AssetRef>,
    avatar_video: Option<AssetRef>,
    motion_video: Option<AssetRef>,
    overlay_image: Option<AssetRef>,
}

impl SceneAsset {
    pub fn new(index: usize, duration_estimate_seconds: f64) -> Self {
        Self {
            index,
            duration_estimate_seconds,
            ..Default::default()
        }
    }

    pub fn with_still_image(mut self, still: Option<AssetRef>) -> Self {
        self.still_image = still;
        self
    }

    pub fn get(&self, kind: AssetKind) -> Option<&AssetRef> {
        match kind {
            AssetKind::Audio => self.audio.as_ref(),
            AssetKind::AvatarVideo => self.avatar_video.as_ref(),
            AssetKind::MotionVideo => self.motion_video.as_ref(),
            AssetKind::OverlayImage => self.overlay_image.as_ref(),
        }
    }

    /// Attach an asset to an empty slot.
    pub fn attach(&mut self, kind: AssetKind, asset: AssetRef) -> ModelResult<()> {
        let slot = match kind {
            AssetKind::Audio => &mut self.audio,
            AssetKind::AvatarVideo => &mut self.avatar_video,
            AssetKind::MotionVideo => &mut self.motion_video,
            AssetKind::OverlayImage => &mut self.overlay_image,
        };
        if slot.is_some() {
            return Err(ModelError::AssetAlreadyAttached {
                index: self.index,
                kind: kind.as_str(),
            });
        }
        *slot = Some(asset);
        Ok(())
    }

    pub fn audio(&self) -> Option<&AssetRef> {
        self.audio.as_ref()
    }

    pub fn avatar_video(&self) -> Option<&AssetRef> {
        self.avatar_video.as_ref()
    }

    pub fn motion_video(&self) -> Option<&AssetRef> {
        self.motion_video.as_ref()
    }

    pub fn overlay_image(&self) -> Option<&AssetRef> {
        self.overlay_image.as_ref()
    }
}

/// Which assets the compositor needs before a scene is render-ready.
///
/// Audio and overlay are always required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRequirements {
    pub avatar_required: bool,
    pub motion_required: bool,
}

impl Default for AssetRequirements {
    fn default() -> Self {
        Self {
            avatar_required: false,
            motion_required: true,
        }
    }
}

impl AssetRequirements {
    pub fn is_required(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Audio | AssetKind::OverlayImage => true,
            AssetKind::AvatarVideo => self.avatar_required,
            AssetKind::MotionVideo => self.motion_required,
        }
    }

    /// Required kinds that are absent or empty.
    pub fn missing(&self, asset: &SceneAsset) -> Vec<AssetKind> {
        AssetKind::ALL
            .into_iter()
            .filter(|kind| self.is_required(*kind))
            .filter(|kind| asset.get(*kind).map_or(true, AssetRef::is_empty))
            .collect()
    }

    pub fn is_render_ready(&self, asset: &SceneAsset) -> bool {
        self.missing(asset).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_is_write_once() {
        let mut asset = SceneAsset::new(1, 5.0);
        asset.attach(AssetKind::Audio, AssetRef::bytes(vec![1, 2], "mp3")).unwrap();
        let err = asset
            .attach(AssetKind::Audio, AssetRef::bytes(vec![3], "mp3"))
            .unwrap_err();
        assert_eq!(err, ModelError::AssetAlreadyAttached { index: 1, kind: "audio" });
        assert_eq!(asset.audio(), Some(&AssetRef::bytes(vec![1, 2], "mp3")));
    }

    #[test]
    fn test_render_ready_with_defaults() {
        let req = AssetRequirements::default();
        let mut asset = SceneAsset::new(0, 5.0);
        assert_eq!(
            req.missing(&asset),
            vec![AssetKind::Audio, AssetKind::MotionVideo, AssetKind::OverlayImage]
        );

        asset.attach(AssetKind::Audio, AssetRef::bytes(vec![0; 4], "mp3")).unwrap();
        asset.attach(AssetKind::OverlayImage, AssetRef::File("o.png".into())).unwrap();
        asset.attach(AssetKind::MotionVideo, AssetRef::url("https://cdn/m.mp4")).unwrap();
        assert!(req.is_render_ready(&asset));
    }

    #[test]
    fn test_empty_asset_is_not_ready() {
        let req = AssetRequirements {
            avatar_required: false,
            motion_required: false,
        };
        let mut asset = SceneAsset::new(0, 5.0);
        asset.attach(AssetKind::Audio, AssetRef::bytes(Vec::new(), "mp3")).unwrap();
        asset.attach(AssetKind::OverlayImage, AssetRef::File("o.png".into())).unwrap();
        assert_eq!(req.missing(&asset), vec![AssetKind::Audio]);
    }
}
