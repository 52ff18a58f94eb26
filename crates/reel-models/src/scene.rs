//! Scene plan and its validation schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use validator::Validate;

use crate::error::{ModelError, ModelResult};

/// Maximum number of scenes in a plan.
pub const MAX_SCENES: usize = 8;

/// Advisory total duration band for the short-form format, in seconds.
pub const TARGET_DURATION_BAND: RangeInclusive<f64> = 20.0..=50.0;

/// One segment of the planned video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 0-based render position
    pub index: usize,

    /// Free-text visual directive
    pub visual_cue: String,

    /// Voice-over and overlay text
    pub spoken_text: String,

    /// Advisory duration; reconciled against generated media later
    pub duration_estimate_seconds: f64,
}

/// Scene shape as returned by the script generator.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct RawScene {
    #[validate(length(min = 1, message = "visual_cue must not be empty"))]
    visual_cue: String,

    #[serde(alias = "spoken_text")]
    #[validate(length(min = 1, message = "text must not be empty"))]
    text: String,

    #[serde(alias = "duration_estimate_seconds", alias = "duration")]
    #[validate(range(exclusive_min = 0.0, message = "duration_est must be positive"))]
    duration_est: f64,
}

#[derive(Debug, Deserialize, Validate)]
struct RawPlan {
    #[validate(length(min = 1, max = 8, message = "plan must contain 1 to 8 scenes"), nested)]
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanReply {
    Wrapped(RawPlan),
    Bare(Vec<RawScene>),
}

/// Ordered, validated sequence of scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenePlan {
    scenes: Vec<Scene>,
}

impl ScenePlan {
    /// Parse and validate a generator reply.
    ///
    /// Accepts either `{"scenes": [...]}` or a bare array. Any shape or
    /// bound violation is a validation error.
    pub fn from_json(reply: &str) -> ModelResult<Self> {
        let parsed: PlanReply = serde_json::from_str(reply)
            .map_err(|e| ModelError::validation(format!("malformed scene plan: {e}")))?;

        let mut plan = match parsed {
            PlanReply::Wrapped(plan) => plan,
            PlanReply::Bare(scenes) => RawPlan { scenes },
        };

        for scene in &mut plan.scenes {
            scene.visual_cue = scene.visual_cue.trim().to_string();
            scene.text = scene.text.trim().to_string();
        }

        plan.validate()
            .map_err(|e| ModelError::validation(format!("invalid scene plan: {e}")))?;

        if let Some(bad) = plan.scenes.iter().position(|s| !s.duration_est.is_finite()) {
            return Err(ModelError::validation(format!(
                "invalid scene plan: scene {bad} duration is not finite"
            )));
        }

        let scenes = plan
            .scenes
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Scene {
                index,
                visual_cue: raw.visual_cue,
                spoken_text: raw.text,
                duration_estimate_seconds: raw.duration_est,
            })
            .collect();

        Ok(Self { scenes })
    }

    /// Build a plan from already-indexed scenes.
    pub fn new(scenes: Vec<Scene>) -> ModelResult<Self> {
        if scenes.is_empty() || scenes.len() > MAX_SCENES {
            return Err(ModelError::validation(format!(
                "plan must contain 1 to {MAX_SCENES} scenes, got {}",
                scenes.len()
            )));
        }
        let mut scenes = scenes;
        scenes.sort_by_key(|s| s.index);
        Ok(Self { scenes })
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn estimated_total_seconds(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_estimate_seconds).sum()
    }

    /// Whether the estimate falls in the target band. Advisory only.
    pub fn within_target_band(&self) -> bool {
        TARGET_DURATION_BAND.contains(&self.estimated_total_seconds())
    }
}
