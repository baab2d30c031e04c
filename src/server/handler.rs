//! DNS request handling.
//!
//! Adapts the [`QueryProcessor`] to `hickory-server`'s `RequestHandler`: one
//! inbound message in, exactly one response out. The proto layer has already
//! rejected malformed datagrams with `FORMERR` by the time a request reaches
//! this handler.

use super::processor::QueryProcessor;
use crate::stats::Metrics;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::proto::op::{Header, Message, MessageType, OpCode, ResponseCode};
use hickory_server::proto::rr::{Record, RecordType};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct DnsHandler {
    processor: Arc<QueryProcessor>,
    metrics: Arc<Metrics>,
}

impl DnsHandler {
    pub fn new(processor: Arc<QueryProcessor>, metrics: Arc<Metrics>) -> Self {
        Self { processor, metrics }
    }

    /// Rebuilds the inbound request as a forwardable message: same id, same
    /// questions, RD flag carried over, EDNS passed through untouched.
    fn forward_message(request: &Request) -> Message {
        let mut msg = Message::new();
        msg.set_id(request.header().id())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(request.header().recursion_desired());
        {
            let query = request.query();
            msg.add_query(query.original().clone());
        }
        if let Some(edns) = request.edns() {
            msg.set_edns(edns.clone());
        }
        msg
    }
}

#[async_trait::async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        self.metrics.inc_total();

        // Mirror of the request: QR=1, AA=0, RA=1, NOERROR unless send fails.
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(false);
        header.set_recursion_available(true);

        let mut answers: Vec<Record> = Vec::new();
        if request.header().op_code() == OpCode::Query {
            let forward = Self::forward_message(request);
            let client = request.src().ip();
            {
                let query = request.query();
                let qtype = query.query_type();
                // Only address questions are classified; everything else is
                // mirrored back unanswered.
                if matches!(qtype, RecordType::A | RecordType::AAAA) {
                    let records = self
                        .processor
                        .answer_question(query.original().name(), qtype, client, &forward)
                        .await;
                    answers.extend(records);
                }
            }
        }

        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], &[], &[]);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to send response to {}: {}", request.src(), e);
                let mut failed = Header::response_from_request(request.header());
                failed.set_response_code(ResponseCode::ServFail);
                ResponseInfo::from(failed)
            }
        }
    }
}
