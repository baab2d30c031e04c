//! Per-question query processing.
//!
//! This is the decision core of the resolver: classify a question against the
//! blocking engine, emit the query event, then either synthesize a sink
//! answer or serve it from cache/upstream. It is deliberately independent of
//! `hickory-server`'s request types so the full decision surface is testable
//! without a socket.

use crate::cache::ResponseCache;
use crate::engine::{canonicalize, BlockingEngine};
use crate::observer::QueryNotifier;
use crate::stats::Metrics;
use crate::upstream::UpstreamExchange;
use hickory_server::proto::op::Message;
use hickory_server::proto::rr::rdata::{A, AAAA};
use hickory_server::proto::rr::{Name, RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::{debug, warn};

/// TTL on synthesized sink answers.
const BLOCKED_TTL: u32 = 60;

pub struct QueryProcessor {
    engine: Arc<BlockingEngine>,
    cache: Arc<ResponseCache>,
    upstream: Arc<dyn UpstreamExchange>,
    metrics: Arc<Metrics>,
    notifier: Arc<QueryNotifier>,
    sink_v4: Ipv4Addr,
}

impl QueryProcessor {
    pub fn new(
        engine: Arc<BlockingEngine>,
        cache: Arc<ResponseCache>,
        upstream: Arc<dyn UpstreamExchange>,
        metrics: Arc<Metrics>,
        notifier: Arc<QueryNotifier>,
        sink_v4: Ipv4Addr,
    ) -> Self {
        Self {
            engine,
            cache,
            upstream,
            metrics,
            notifier,
            sink_v4,
        }
    }

    /// Answers one A/AAAA question.
    ///
    /// `request` is the message forwarded verbatim on a cache miss. The
    /// returned records form the question's share of the answer section; an
    /// empty vec means the client sees no answer for it (upstream exhausted,
    /// or an unanswerable qtype).
    pub async fn answer_question(
        &self,
        qname: &Name,
        qtype: RecordType,
        client: IpAddr,
        request: &Message,
    ) -> Vec<Record> {
        let canonical: Arc<str> = Arc::from(canonicalize(&qname.to_string()));

        let decision = self.engine.is_blocked(&canonical);
        self.notifier
            .notify_query(canonical.clone(), client, decision.is_some());

        if let Some(reason) = decision {
            let reason = reason.to_string();
            debug!("Blocked {} for {} ({})", canonical, client, reason);
            self.notifier.notify_blocked(canonical, client, reason);
            self.metrics.inc_blocked();
            return self.sink_answer(qname, qtype);
        }

        if let Some(answer) = self.cache.lookup(&canonical, qtype) {
            self.metrics.inc_cache_hit();
            return answer.to_vec();
        }

        self.metrics.inc_cache_miss();
        match self.upstream.exchange(request).await {
            Ok(reply) => {
                let answer = reply.answers().to_vec();
                self.cache.insert(canonical, qtype, answer.clone());
                answer
            }
            Err(e) => {
                // The client still gets a NOERROR reply, just with nothing in it.
                warn!("Upstream exchange failed for {}: {:#}", canonical, e);
                Vec::new()
            }
        }
    }

    /// Builds the sink answer for a blocked question, preserving the
    /// question's original spelling in the record name.
    fn sink_answer(&self, qname: &Name, qtype: RecordType) -> Vec<Record> {
        let rdata = match qtype {
            RecordType::A => RData::A(A(self.sink_v4)),
            RecordType::AAAA => RData::AAAA(AAAA(Ipv6Addr::UNSPECIFIED)),
            _ => return Vec::new(),
        };
        vec![Record::from_rdata(qname.clone(), BLOCKED_TTL, rdata)]
    }
}
