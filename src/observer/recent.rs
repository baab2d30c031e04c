use super::types::{QueryEvent, QueryObserver};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Bounded in-memory log of the most recent queries.
///
/// Backs the dashboard's live query view; the oldest entry is displaced once
/// the buffer is full.
pub struct RecentQueries {
    buffer: RwLock<VecDeque<QueryEvent>>,
    capacity: usize,
}

impl RecentQueries {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Snapshot, newest first.
    pub fn snapshot(&self) -> Vec<QueryEvent> {
        let buffer = self.buffer.read().unwrap();
        buffer.iter().rev().cloned().collect()
    }
}

impl QueryObserver for RecentQueries {
    fn on_query(&self, event: &QueryEvent) {
        let mut buffer = self.buffer.write().unwrap();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn event(id: u64, domain: &str) -> QueryEvent {
        QueryEvent {
            id,
            domain: Arc::from(domain),
            client: IpAddr::from([127, 0, 0, 1]),
            blocked: false,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn test_ring_caps_and_orders_newest_first() {
        let recent = RecentQueries::new(2);
        recent.on_query(&event(1, "a.test"));
        recent.on_query(&event(2, "b.test"));
        recent.on_query(&event(3, "c.test"));

        let snapshot = recent.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(&*snapshot[0].domain, "c.test");
        assert_eq!(&*snapshot[1].domain, "b.test");
    }
}
