//! TTL-bounded response cache.
//!
//! Maps `(canonical qname, qtype)` to the answer section last returned by an
//! upstream for that question. Every entry gets the same fixed lifetime,
//! applied at insert; record TTLs are not consulted. The map is bounded: when
//! full, an already-expired entry is evicted in preference to a live one.

use hickory_server::proto::rr::{Record, RecordType};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

type CacheKey = (Arc<str>, RecordType);

struct CacheEntry {
    answer: Arc<[Record]>,
    expires_at: Instant,
}

/// Concurrent response cache with uniform TTL and bounded entry count.
pub struct ResponseCache {
    entries: RwLock<FxHashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    /// A zero capacity is clamped to one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns the cached answer, or `None` when absent or expired.
    ///
    /// Expired entries are left in place; they are reclaimed by the eviction
    /// pass on a later insert.
    pub fn lookup(&self, name: &Arc<str>, qtype: RecordType) -> Option<Arc<[Record]>> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&(name.clone(), qtype))?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.answer.clone())
    }

    /// Stores an answer snapshot. Empty answers are not cached.
    pub fn insert(&self, name: Arc<str>, qtype: RecordType, answer: Vec<Record>) {
        if answer.is_empty() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        let key = (name, qtype);
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            evict_one(&mut entries, now);
        }
        entries.insert(
            key,
            CacheEntry {
                answer: answer.into(),
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_one(entries: &mut FxHashMap<CacheKey, CacheEntry>, now: Instant) {
    let victim = entries
        .iter()
        .find(|(_, entry)| now >= entry.expires_at)
        .map(|(key, _)| key.clone())
        .or_else(|| entries.keys().next().cloned());
    if let Some(key) = victim {
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{Name, RData};
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use std::thread::sleep;

    fn a_record(name: &str, ip: [u8; 4]) -> Record {
        Record::from_rdata(
            Name::from_str(name).unwrap(),
            300,
            RData::A(A(Ipv4Addr::from(ip))),
        )
    }

    fn key(name: &str) -> Arc<str> {
        Arc::from(name)
    }

    #[test]
    fn test_round_trip_within_ttl() {
        let cache = ResponseCache::new(16, Duration::from_secs(300));
        let answer = vec![a_record("example.com.", [93, 184, 216, 34])];
        cache.insert(key("example.com"), RecordType::A, answer.clone());

        let hit = cache.lookup(&key("example.com"), RecordType::A).unwrap();
        assert_eq!(hit.as_ref(), answer.as_slice());
        // Different qtype is a distinct key.
        assert!(cache.lookup(&key("example.com"), RecordType::AAAA).is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new(16, Duration::from_millis(20));
        cache.insert(key("example.com"), RecordType::A, vec![a_record("example.com.", [1, 2, 3, 4])]);

        assert!(cache.lookup(&key("example.com"), RecordType::A).is_some());
        sleep(Duration::from_millis(40));
        assert!(cache.lookup(&key("example.com"), RecordType::A).is_none());
    }

    #[test]
    fn test_empty_answer_not_cached() {
        let cache = ResponseCache::new(16, Duration::from_secs(300));
        cache.insert(key("example.com"), RecordType::A, vec![]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_prefers_expired() {
        let cache = ResponseCache::new(2, Duration::from_millis(20));
        cache.insert(key("old.test"), RecordType::A, vec![a_record("old.test.", [1, 1, 1, 1])]);
        sleep(Duration::from_millis(40));
        // old.test is now expired; live.test is fresh.
        cache.insert(key("live.test"), RecordType::A, vec![a_record("live.test.", [2, 2, 2, 2])]);

        // At capacity: the expired entry must go, not the live one.
        cache.insert(key("new.test"), RecordType::A, vec![a_record("new.test.", [3, 3, 3, 3])]);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&key("live.test"), RecordType::A).is_some());
        assert!(cache.lookup(&key("new.test"), RecordType::A).is_some());
    }

    #[test]
    fn test_capacity_bound_holds() {
        let cache = ResponseCache::new(2, Duration::from_secs(300));
        for (i, name) in ["a.test", "b.test", "c.test"].into_iter().enumerate() {
            cache.insert(key(name), RecordType::A, vec![a_record("x.test.", [i as u8, 0, 0, 1])]);
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_same_key_does_not_evict_others() {
        let cache = ResponseCache::new(2, Duration::from_secs(300));
        cache.insert(key("a.test"), RecordType::A, vec![a_record("a.test.", [1, 0, 0, 1])]);
        cache.insert(key("b.test"), RecordType::A, vec![a_record("b.test.", [2, 0, 0, 1])]);
        // Overwrite at capacity: both keys survive.
        cache.insert(key("a.test"), RecordType::A, vec![a_record("a.test.", [9, 9, 9, 9])]);

        assert_eq!(cache.len(), 2);
        let hit = cache.lookup(&key("a.test"), RecordType::A).unwrap();
        assert_eq!(hit[0].data().unwrap().to_string(), "9.9.9.9");
        assert!(cache.lookup(&key("b.test"), RecordType::A).is_some());
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let cache = ResponseCache::new(16, Duration::from_secs(300));
        let mut answer = vec![a_record("example.com.", [1, 2, 3, 4])];
        cache.insert(key("example.com"), RecordType::A, answer.clone());

        // Mutating the caller's vec after insert must not affect the cache.
        answer.clear();
        let hit = cache.lookup(&key("example.com"), RecordType::A).unwrap();
        assert_eq!(hit.len(), 1);
    }
}
