use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::constants::{FLUSH_LOCK_KEY, QUEUE_CACHE_KEY};
use super::event::{iso_timestamp, QueuedEvent};
use crate::storage::{SharedCache, StorageResult};

/// Ordered telemetry buffer mirrored to a cache entry.
///
/// Every mutation rewrites the whole serialized sequence under [`QUEUE_CACHE_KEY`], so a
/// new process picks up where the last one stopped.
pub struct EventQueue {
    events: Mutex<Vec<QueuedEvent>>,
    cache: SharedCache,
    ttl: Duration,
}

impl EventQueue {
    /// Restores the sequence from the cache; a missing or corrupt entry yields an empty
    /// queue
    pub fn new(cache: SharedCache, ttl: Duration) -> Self {
        let events = match cache.get(QUEUE_CACHE_KEY) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupt analytics queue in cache, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        debug!(restored = events.len(), "Analytics queue loaded");

        Self {
            events: Mutex::new(events),
            cache,
            ttl,
        }
    }

    /// Appends `event`, stamping it with the current time if it has none. Returns the
    /// new queue length.
    pub fn enqueue(&self, mut event: QueuedEvent) -> usize {
        if event.timestamp.is_none() {
            event.timestamp = Some(iso_timestamp(Utc::now()));
        }

        let mut events = self.events.lock();
        events.push(event);
        self.persist(&events);
        events.len()
    }

    /// Snapshot in insertion order
    pub fn events(&self) -> Vec<QueuedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Empties memory and removes the cache entry
    pub fn clear(&self) {
        let mut events = self.events.lock();
        events.clear();
        if let Err(e) = self.cache.remove(QUEUE_CACHE_KEY) {
            warn!(error = %e, "Failed to remove analytics queue from cache");
        }
    }

    /// Drops the first `count` events, the ones a flush delivered. Events queued after
    /// the flush snapshot are kept.
    pub(crate) fn remove_delivered(&self, count: usize) {
        let mut events = self.events.lock();
        let count = count.min(events.len());
        events.drain(..count);

        if events.is_empty() {
            if let Err(e) = self.cache.remove(QUEUE_CACHE_KEY) {
                warn!(error = %e, "Failed to remove analytics queue from cache");
            }
        } else {
            self.persist(&events);
        }
    }

    /// Takes the flush lock if no live lock exists
    pub(crate) fn try_acquire_flush_lock(&self, ttl: Duration) -> bool {
        match self.cache.put_if_absent(FLUSH_LOCK_KEY, "true", ttl) {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(error = %e, "Failed to take analytics flush lock");
                false
            }
        }
    }

    pub(crate) fn release_flush_lock(&self) {
        if let Err(e) = self.cache.remove(FLUSH_LOCK_KEY) {
            warn!(error = %e, "Failed to release analytics flush lock");
        }
    }

    fn persist(&self, events: &[QueuedEvent]) {
        if let Err(e) = self.write_cache(events) {
            warn!(error = %e, "Failed to save analytics queue to cache");
        }
    }

    fn write_cache(&self, events: &[QueuedEvent]) -> StorageResult<()> {
        let json = serde_json::to_string(events)?;
        self.cache.put(QUEUE_CACHE_KEY, &json, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CacheStore, MemoryCache};
    use chrono::TimeZone;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(21600);

    fn event(name: &str) -> QueuedEvent {
        QueuedEvent::new(name, "user-1")
    }

    #[test]
    fn should_keep_insertion_order_with_duplicates() {
        // Arrange
        let queue = EventQueue::new(Arc::new(MemoryCache::new()), TTL);

        // Act
        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        queue.enqueue(event("a"));

        // Assert
        let names: Vec<String> = queue.events().into_iter().map(|e| e.event).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
    }

    #[test]
    fn should_stamp_missing_timestamp_and_keep_given_one() {
        let queue = EventQueue::new(Arc::new(MemoryCache::new()), TTL);
        let given = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        queue.enqueue(event("a"));
        queue.enqueue(event("b").with_timestamp(given));

        let events = queue.events();
        assert!(events[0].timestamp.is_some());
        assert_eq!(events[1].timestamp.as_deref(), Some("2024-05-01T12:00:00.000Z"));
    }

    #[test]
    fn should_write_through_to_cache() {
        let cache = Arc::new(MemoryCache::new());
        let queue = EventQueue::new(cache.clone(), TTL);

        queue.enqueue(event("a").with_property("n", 1));

        let cached: Vec<QueuedEvent> =
            serde_json::from_str(&cache.get(QUEUE_CACHE_KEY).unwrap()).unwrap();
        assert_eq!(cached, queue.events());
    }

    #[test]
    fn should_restore_from_cache() {
        let cache = Arc::new(MemoryCache::new());
        {
            let queue = EventQueue::new(cache.clone(), TTL);
            queue.enqueue(event("a"));
            queue.enqueue(event("b"));
        }

        let restored = EventQueue::new(cache, TTL);

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.events()[1].event, "b");
    }

    #[test]
    fn should_start_empty_when_cache_is_corrupt() {
        let cache = Arc::new(MemoryCache::new());
        cache.put(QUEUE_CACHE_KEY, "[{\"event\":", TTL).unwrap();

        let queue = EventQueue::new(cache, TTL);

        assert!(queue.is_empty());
    }

    #[test]
    fn clear_should_empty_memory_and_cache() {
        let cache = Arc::new(MemoryCache::new());
        let queue = EventQueue::new(cache.clone(), TTL);
        queue.enqueue(event("a"));

        queue.clear();

        assert!(queue.events().is_empty());
        assert_eq!(cache.get(QUEUE_CACHE_KEY), None);
    }

    #[test]
    fn remove_delivered_should_keep_events_queued_after_snapshot() {
        let cache = Arc::new(MemoryCache::new());
        let queue = EventQueue::new(cache.clone(), TTL);
        queue.enqueue(event("a"));
        queue.enqueue(event("b"));
        queue.enqueue(event("late"));

        queue.remove_delivered(2);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.events()[0].event, "late");
        let cached: Vec<QueuedEvent> =
            serde_json::from_str(&cache.get(QUEUE_CACHE_KEY).unwrap()).unwrap();
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn flush_lock_should_be_exclusive_until_released() {
        let queue = EventQueue::new(Arc::new(MemoryCache::new()), TTL);

        assert!(queue.try_acquire_flush_lock(Duration::from_secs(60)));
        assert!(!queue.try_acquire_flush_lock(Duration::from_secs(60)));

        queue.release_flush_lock();
        assert!(queue.try_acquire_flush_lock(Duration::from_secs(60)));
    }
}
