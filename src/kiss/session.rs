//! Handling of what one KISS client sends, whatever it is attached by.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, enabled, Level};

use crate::dlq::ClientId;
use crate::router::{Subscriptions, Transport};
use crate::util::{hex_dump, LogOnce};

use super::frame::{encapsulate, KissItem};
use super::process::{KissProcessor, CMD_DATA_FRAME};

/// One attached client.
#[derive(Debug)]
pub struct KissSession {
    pub id: ClientId,
    pub transport: Transport,
    /// Channel of a single-channel listener
    pub pin: Option<usize>,
    malformed: LogOnce,
}

impl KissSession {
    pub fn new(id: ClientId, transport: Transport, pin: Option<usize>) -> Self {
        KissSession { id, transport, pin, malformed: LogOnce::new() }
    }
}

/// Shared by every KISS transport.
#[derive(Debug)]
pub struct KissContext {
    processor: KissProcessor,
    subs: Arc<Subscriptions>,
    /// Copy data frames between TCP clients
    kiss_copy: bool,
}

impl KissContext {
    /// Creates a new context
    pub fn new(processor: KissProcessor, subs: Arc<Subscriptions>, kiss_copy: bool) -> Self {
        KissContext { processor, subs, kiss_copy }
    }

    pub fn subs(&self) -> &Arc<Subscriptions> {
        &self.subs
    }

    /// Acts on one item decoded from a client. Replies go back to that
    /// client only.
    pub fn handle(&self, session: &KissSession, item: KissItem) {
        let KissSession { id, transport, pin, .. } = *session;
        match item {
            KissItem::NoiseReply(reply) => {
                debug!(id, "noise from KISS client, answering like a TNC would");
                self.subs.send_to(id, Bytes::from_static(reply));
            }
            KissItem::Frame(msg) => {
                if enabled!(Level::DEBUG) {
                    debug!(id, "KISS message from client\n{}", hex_dump(&msg));
                }
                let kind = msg.first().copied().unwrap_or(0);
                if self.kiss_copy && kind & 0x0f == CMD_DATA_FRAME && matches!(transport, Transport::KissTcp { .. }) {
                    let chan = pin.unwrap_or((kind >> 4) as usize);
                    self.subs.kiss_copy(id, chan, &msg);
                }
                if let Some(reply) = self.processor.process_msg(&msg, pin, &session.malformed) {
                    self.subs.send_to(id, Bytes::from(encapsulate(&reply)));
                }
            }
        }
    }
}
