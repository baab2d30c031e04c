use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// One decided A/AAAA question, as seen by observers.
///
/// `id` is unique within the process lifetime. `domain` is the canonical
/// (lowercased, root-dot-stripped) name the decision was made on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEvent {
    pub id: u64,
    #[serde(serialize_with = "serialize_arc_str")]
    pub domain: Arc<str>,
    pub client: IpAddr,
    pub blocked: bool,
    pub timestamp: SystemTime,
}

/// A block decision, carrying the reason from the blocking engine.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEvent {
    #[serde(serialize_with = "serialize_arc_str")]
    pub domain: Arc<str>,
    pub client: IpAddr,
    pub reason: String,
    pub timestamp: SystemTime,
}

fn serialize_arc_str<S>(domain: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(domain)
}

/// Receives every decided query, in registration order.
pub trait QueryObserver: Send + Sync {
    fn on_query(&self, event: &QueryEvent);
}

/// Receives block decisions only.
pub trait BlockObserver: Send + Sync {
    fn on_domain_blocked(&self, event: &BlockEvent);
}
