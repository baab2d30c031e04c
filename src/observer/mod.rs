//! Query observability channel.
//!
//! The resolver hot path hands every decided question to a [`QueryNotifier`],
//! which fans it out to registered observers. Each observer is backed by a
//! bounded channel drained on its own task, so delivery never blocks the hot
//! path beyond a `try_send`: per observer, events arrive FIFO, and when an
//! observer falls behind the newest events are dropped for it.

pub mod clients;
pub mod recent;
pub mod types;

pub use clients::{ClientActivity, ClientRecord};
pub use recent::RecentQueries;
pub use types::{BlockEvent, BlockObserver, QueryEvent, QueryObserver};

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::mpsc;

/// Buffered events per observer before overflow drops the newest.
const SINK_BUFFER: usize = 1024;

/// Handle returned by registration; pass back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

/// Fan-out hub for query and block events.
pub struct QueryNotifier {
    query_sinks: RwLock<Vec<(ObserverId, mpsc::Sender<QueryEvent>)>>,
    block_sinks: RwLock<Vec<(ObserverId, mpsc::Sender<BlockEvent>)>>,
    next_sink: AtomicU64,
    next_event: AtomicU64,
}

impl Default for QueryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryNotifier {
    pub fn new() -> Self {
        Self {
            query_sinks: RwLock::new(Vec::new()),
            block_sinks: RwLock::new(Vec::new()),
            next_sink: AtomicU64::new(0),
            next_event: AtomicU64::new(0),
        }
    }

    fn next_sink_id(&self) -> ObserverId {
        ObserverId(self.next_sink.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers an observer for every decided query. Must be called from
    /// within a tokio runtime; the observer is dropped on unregistration.
    pub fn register_query_observer(&self, observer: Arc<dyn QueryObserver>) -> ObserverId {
        let (tx, mut rx) = mpsc::channel::<QueryEvent>(SINK_BUFFER);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                observer.on_query(&event);
            }
        });
        let id = self.next_sink_id();
        self.query_sinks.write().unwrap().push((id, tx));
        id
    }

    /// Registers an observer for block decisions only.
    pub fn register_block_observer(&self, observer: Arc<dyn BlockObserver>) -> ObserverId {
        let (tx, mut rx) = mpsc::channel::<BlockEvent>(SINK_BUFFER);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                observer.on_domain_blocked(&event);
            }
        });
        let id = self.next_sink_id();
        self.block_sinks.write().unwrap().push((id, tx));
        id
    }

    /// Returns `false` when the id was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        fn remove<T>(sinks: &RwLock<Vec<(ObserverId, mpsc::Sender<T>)>>, id: ObserverId) -> bool {
            let mut sinks = sinks.write().unwrap();
            match sinks.iter().position(|(sink_id, _)| *sink_id == id) {
                Some(idx) => {
                    sinks.remove(idx);
                    true
                }
                None => false,
            }
        }
        remove(&self.query_sinks, id) || remove(&self.block_sinks, id)
    }

    /// Emits one query event to every registered observer, in registration
    /// order. Never blocks: observers that have fallen `SINK_BUFFER` events
    /// behind miss this one.
    pub fn notify_query(&self, domain: Arc<str>, client: IpAddr, blocked: bool) {
        let event = QueryEvent {
            id: self.next_event.fetch_add(1, Ordering::Relaxed),
            domain,
            client,
            blocked,
            timestamp: SystemTime::now(),
        };
        let sinks = self.query_sinks.read().unwrap();
        for (_, sink) in sinks.iter() {
            let _ = sink.try_send(event.clone());
        }
    }

    /// Emits a block event carrying the engine's reason.
    pub fn notify_blocked(&self, domain: Arc<str>, client: IpAddr, reason: String) {
        let event = BlockEvent {
            domain,
            client,
            reason,
            timestamp: SystemTime::now(),
        };
        let sinks = self.block_sinks.read().unwrap();
        for (_, sink) in sinks.iter() {
            let _ = sink.try_send(event.clone());
        }
    }
}
