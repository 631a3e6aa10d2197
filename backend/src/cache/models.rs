use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::ClassificationResult;
use std::path::PathBuf;
use uuid::Uuid;

/// The most recent classification of one session, plus where its images
/// were found so a later report can reuse them.
#[derive(Debug, Clone, Serialize)]
pub struct CachedClassification {
    pub id: Uuid,
    pub session: String,
    pub result: ClassificationResult,
    pub image_path: Option<PathBuf>,
    pub mask_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
}

impl CachedClassification {
    pub fn new(
        session: String,
        result: ClassificationResult,
        image_path: Option<PathBuf>,
        mask_path: Option<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session,
            result,
            image_path,
            mask_path,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }

    /// Cached image location, if it still exists on disk.
    pub fn existing_image_path(&self) -> Option<PathBuf> {
        self.image_path.clone().filter(|p| p.is_file())
    }

    pub fn existing_mask_path(&self) -> Option<PathBuf> {
        self.mask_path.clone().filter(|p| p.is_file())
    }
}
