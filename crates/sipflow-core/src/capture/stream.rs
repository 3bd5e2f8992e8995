use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::trace;

use crate::packet::{Packet, Transport};
use crate::store::{CallStore, IngestOutcome};

/// Direction-sensitive flow key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
}

struct FlowBuffer {
    transport: Transport,
    timestamp: Option<f64>,
    data: Vec<u8>,
}

/// Per-flow reassembly of SIP over stream transports.
///
/// Segments are appended in arrival order; there is no sequence-number
/// reordering. A buffer is kept while the store reports it incomplete and
/// dropped as soon as it is stored, rejected or recognized as not SIP.
#[derive(Default)]
pub struct StreamAssembler {
    flows: HashMap<FlowKey, FlowBuffer>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flows holding an incomplete message.
    pub fn pending(&self) -> usize {
        self.flows.len()
    }

    /// Append a stream segment and hand every complete message to the store.
    ///
    /// Returns the final outcome of each message attempt, never `Partial`
    /// or `Multiple`.
    pub fn push(&mut self, store: &mut CallStore, packet: Packet) -> Vec<IngestOutcome> {
        let key = FlowKey {
            src: packet.src,
            dst: packet.dst,
        };
        let buffer = self.flows.entry(key).or_insert_with(|| FlowBuffer {
            transport: packet.transport,
            timestamp: packet.timestamp,
            data: Vec::new(),
        });
        if buffer.data.is_empty() {
            buffer.timestamp = packet.timestamp;
        }
        buffer.data.extend_from_slice(&packet.payload);

        let mut outcomes = Vec::new();
        loop {
            let candidate = Packet {
                src: key.src,
                dst: key.dst,
                transport: buffer.transport,
                timestamp: buffer.timestamp,
                payload: std::mem::take(&mut buffer.data),
            };
            match store.ingest(&candidate) {
                IngestOutcome::Partial => {
                    trace!(src = %key.src, len = candidate.payload.len(), "buffering partial SIP message");
                    buffer.data = candidate.payload;
                    return outcomes;
                }
                IngestOutcome::Multiple { length } => {
                    let mut first = candidate;
                    buffer.data = first.payload.split_off(length);
                    buffer.timestamp = packet.timestamp;
                    outcomes.push(store.ingest(&first));
                }
                outcome => {
                    outcomes.push(outcome);
                    break;
                }
            }
        }
        self.flows.remove(&key);
        outcomes
    }
}
