//! Shared data models for the ReelForge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs (the ledger row) and the job status state machine
//! - Deterministic progress derivation
//! - Normalized product snapshots
//! - Scene plans and their validation schema
//! - Per-scene generated asset bundles

pub mod asset;
pub mod error;
pub mod job;
pub mod product;
pub mod scene;
pub mod status;

// Re-export common types
pub use asset::{AssetKind, AssetRef, AssetRequirements, SceneAsset};
pub use error::{ModelError, ModelResult};
pub use job::{JobId, JobRecord};
pub use product::ProductSnapshot;
pub use scene::{Scene, ScenePlan, MAX_SCENES, TARGET_DURATION_BAND};
pub use status::{media_progress, JobStatus};
