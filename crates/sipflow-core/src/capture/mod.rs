//! Offline capture loading: frames from a source are decoded to UDP/TCP
//! payloads and fed to a call store.
//!
//! UDP payloads are complete messages. TCP payloads go through a per-flow
//! [`StreamAssembler`]. UDP payloads that are not SIP are offered to the
//! store as RTP when media accounting is enabled.

pub mod frame;
pub mod stream;

use std::path::Path;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{info, warn};

use crate::CaptureSummary;
use crate::config::{ConfigError, StoreConfig};
use crate::packet::{Packet, Transport};
use crate::source::{FrameEvent, FrameSource, PcapFileSource, SourceError};
use crate::store::{CallStore, IngestOutcome};

pub use frame::{FrameError, Segment, decode_frame};
pub use stream::{FlowKey, StreamAssembler};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Build a store from `config` and load a PCAP/PCAPNG file into it.
pub fn load_pcap_file(
    path: &Path,
    config: StoreConfig,
) -> Result<(CallStore, CaptureSummary), LoadError> {
    let mut store = CallStore::new(config)?;
    let source = PcapFileSource::open(path)?;
    let summary = load_source(source, &mut store)?;
    info!(
        path = %path.display(),
        packets = summary.packets_total,
        calls = store.len(),
        "capture loaded"
    );
    Ok((store, summary))
}

/// Drain `source` into `store`.
///
/// Frames that cannot be decoded are counted and skipped.
pub fn load_source<S: FrameSource>(
    mut source: S,
    store: &mut CallStore,
) -> Result<CaptureSummary, SourceError> {
    let mut counters = Counters::default();
    let mut streams = StreamAssembler::new();

    while let Some(FrameEvent { ts, linktype, data }) = source.next_frame()? {
        counters.packets_total += 1;
        counters.update_ts_bounds(ts);

        let segment = match decode_frame(linktype, &data) {
            Ok(Some(segment)) => segment,
            Ok(None) => continue,
            Err(err) => {
                warn!(frame = counters.packets_total, %err, "skipping undecodable frame");
                counters.decode_errors += 1;
                continue;
            }
        };
        if segment.payload.is_empty() {
            continue;
        }

        let mut packet = Packet::new(
            segment.src,
            segment.dst,
            segment.transport,
            segment.payload.to_vec(),
        );
        packet.timestamp = ts;

        match packet.transport {
            Transport::Udp => match store.ingest(&packet) {
                IngestOutcome::NotSip => {
                    if store.record_rtp(&packet).is_some() {
                        counters.rtp_packets += 1;
                    }
                }
                outcome => counters.count(outcome),
            },
            _ => {
                for outcome in streams.push(store, packet) {
                    counters.count(outcome);
                }
            }
        }
    }

    Ok(counters.into_summary())
}

#[derive(Debug, Default)]
struct Counters {
    packets_total: u64,
    decode_errors: u64,
    sip_messages: u64,
    rejected: u64,
    rtp_packets: u64,
    first_ts: Option<f64>,
    last_ts: Option<f64>,
}

impl Counters {
    fn count(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Stored(_) => self.sip_messages += 1,
            IngestOutcome::Rejected(_) => self.rejected += 1,
            _ => {}
        }
    }

    fn update_ts_bounds(&mut self, ts: Option<f64>) {
        let Some(ts) = ts else {
            return;
        };
        if self.first_ts.is_none_or(|first| ts < first) {
            self.first_ts = Some(ts);
        }
        if self.last_ts.is_none_or(|last| ts > last) {
            self.last_ts = Some(ts);
        }
    }

    fn into_summary(self) -> CaptureSummary {
        CaptureSummary {
            packets_total: self.packets_total,
            decode_errors: self.decode_errors,
            sip_messages: self.sip_messages,
            rejected_messages: self.rejected,
            rtp_packets: self.rtp_packets,
            time_start: ts_to_rfc3339(self.first_ts),
            time_end: ts_to_rfc3339(self.last_ts),
        }
    }
}

pub(crate) fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let nanos = (ts? * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
