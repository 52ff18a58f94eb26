//! Object key layout.

use reel_models::JobId;

use crate::error::{StorageError, StorageResult};

/// Key of a job's final video. Stable per job so re-uploads overwrite.
pub fn video_key(job_id: &JobId) -> String {
    format!("videos/{}.mp4", job_id.as_str())
}

/// Reject keys that could escape the bucket prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_key_is_deterministic() {
        let id = JobId::from_string("abc-123");
        assert_eq!(video_key(&id), "videos/abc-123.mp4");
        assert_eq!(video_key(&id), video_key(&id.clone()));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("videos/a.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/videos/a.mp4").is_err());
        assert!(validate_key("videos/../secret").is_err());
        assert!(validate_key("videos//a.mp4").is_err());
    }
}
