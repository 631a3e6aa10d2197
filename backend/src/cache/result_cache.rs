use shared::ClassificationResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use super::models::CachedClassification;
use crate::config::DEFAULT_MAX_SESSIONS;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("No recent classification results. Run a classification first.")]
    CacheMiss,
    #[error("Result cache is unavailable")]
    Poisoned,
}

/// Last classification per session. Writers to the same session race and
/// the last one wins. Holds at most `capacity` sessions; storing a new one
/// when full evicts the least recently used.
pub struct ResultCache {
    entries: RwLock<HashMap<String, CachedClassification>>,
    capacity: usize,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn store(
        &self,
        session: &str,
        result: ClassificationResult,
        image_path: Option<PathBuf>,
        mask_path: Option<PathBuf>,
    ) -> Result<CachedClassification, CacheError> {
        let entry = CachedClassification::new(session.to_string(), result, image_path, mask_path);
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        if !entries.contains_key(session) && entries.len() >= self.capacity {
            evict_least_recent(&mut entries);
        }
        entries.insert(session.to_string(), entry.clone());
        log::debug!(
            "Cached classification {} for session {}",
            entry.id,
            session
        );
        Ok(entry)
    }

    pub fn latest(&self, session: &str) -> Result<CachedClassification, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let entry = entries.get_mut(session).ok_or(CacheError::CacheMiss)?;
        entry.touch();
        Ok(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_least_recent(entries: &mut HashMap<String, CachedClassification>) {
    let oldest = entries
        .values()
        .min_by_key(|entry| (entry.last_accessed, entry.created_at))
        .map(|entry| entry.session.clone());
    if let Some(session) = oldest {
        entries.remove(&session);
        log::debug!("Evicted cached classification for session {}", session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::thread::sleep;
    use std::time::Duration;

    use crate::classify::simulator::simulate;

    #[test]
    fn miss_before_store() {
        let cache = ResultCache::new();
        assert!(matches!(cache.latest("default"), Err(CacheError::CacheMiss)));
        assert!(cache.is_empty());
    }

    #[test]
    fn last_writer_wins_within_a_session() {
        let mut rng = StdRng::seed_from_u64(4);
        let cache = ResultCache::new();
        cache
            .store("default", simulate("COVID-1.png", "m", &mut rng), None, None)
            .unwrap();
        cache
            .store("default", simulate("Normal-2.png", "m", &mut rng), None, None)
            .unwrap();

        let latest = cache.latest("default").unwrap();
        assert_eq!(latest.result.file_name, "Normal-2.png");
        assert_eq!(latest.access_count, 1);
        assert_eq!(cache.latest("default").unwrap().access_count, 2);
    }

    #[test]
    fn sessions_are_isolated() {
        let mut rng = StdRng::seed_from_u64(8);
        let cache = ResultCache::new();
        cache
            .store("alice", simulate("COVID-1.png", "m", &mut rng), None, None)
            .unwrap();

        assert!(cache.latest("bob").is_err());
        assert_eq!(cache.latest("alice").unwrap().result.file_name, "COVID-1.png");
    }

    #[test]
    fn full_cache_evicts_least_recently_used_session() {
        let mut rng = StdRng::seed_from_u64(15);
        let cache = ResultCache::with_capacity(2);
        cache
            .store("alice", simulate("COVID-1.png", "m", &mut rng), None, None)
            .unwrap();
        sleep(Duration::from_millis(5));
        cache
            .store("bob", simulate("Normal-2.png", "m", &mut rng), None, None)
            .unwrap();
        sleep(Duration::from_millis(5));
        cache.latest("alice").unwrap();
        sleep(Duration::from_millis(5));

        cache
            .store("carol", simulate("Viral Pneumonia-3.png", "m", &mut rng), None, None)
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert!(matches!(cache.latest("bob"), Err(CacheError::CacheMiss)));
        assert!(cache.latest("alice").is_ok());
        assert!(cache.latest("carol").is_ok());
    }

    #[test]
    fn rewriting_a_session_does_not_evict() {
        let mut rng = StdRng::seed_from_u64(16);
        let cache = ResultCache::with_capacity(2);
        for name in ["COVID-1.png", "Normal-2.png"] {
            cache.store("alice", simulate(name, "m", &mut rng), None, None).unwrap();
        }
        cache
            .store("bob", simulate("COVID-3.png", "m", &mut rng), None, None)
            .unwrap();
        cache
            .store("alice", simulate("COVID-4.png", "m", &mut rng), None, None)
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.latest("bob").is_ok());
    }

    #[test]
    fn many_sessions_stay_within_capacity() {
        let mut rng = StdRng::seed_from_u64(23);
        let cache = ResultCache::with_capacity(8);
        for i in 0..500 {
            cache
                .store(&format!("s{}", i), simulate("COVID-1.png", "m", &mut rng), None, None)
                .unwrap();
        }
        assert_eq!(cache.len(), 8);
        assert!(cache.latest("s499").is_ok());
    }
}
