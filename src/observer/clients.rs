use super::types::{QueryEvent, QueryObserver};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::SystemTime;

/// Per-client tallies, shaped for the dashboard's clients view.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRecord {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub last_seen: SystemTime,
}

/// Tracks query activity per client IP.
#[derive(Default)]
pub struct ClientActivity {
    clients: RwLock<FxHashMap<IpAddr, ClientRecord>>,
}

impl ClientActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<(IpAddr, ClientRecord)> {
        let clients = self.clients.read().unwrap();
        clients.iter().map(|(ip, rec)| (*ip, rec.clone())).collect()
    }
}

impl QueryObserver for ClientActivity {
    fn on_query(&self, event: &QueryEvent) {
        let mut clients = self.clients.write().unwrap();
        let record = clients.entry(event.client).or_insert(ClientRecord {
            total_queries: 0,
            blocked_queries: 0,
            last_seen: event.timestamp,
        });
        record.total_queries += 1;
        if event.blocked {
            record.blocked_queries += 1;
        }
        record.last_seen = event.timestamp;
    }
}
