//! sipflow core library: SIP dialog tracking for capture analysis.
//!
//! Raw transport payloads are classified by the SIP parser, grouped into
//! calls by Call-ID in a [`CallStore`], and exposed to renderers through
//! filtered, sorted views. The offline capture loader feeds the store from
//! PCAP/PCAPNG files; all file I/O stays in `source` and `capture`.
//!
//! Invariants:
//! - A Call-ID maps to at most one stored call.
//! - Messages of a call are kept in arrival order.
//! - A call's filter verdict is computed at most once between resets.
//!
//! # Examples
//! ```
//! use sipflow_core::{CallStore, FilterKind, Packet, StoreConfig, Transport};
//!
//! let mut store = CallStore::new(StoreConfig::default())?;
//! let payload = b"INVITE sip:bob@example.com SIP/2.0\r\n\
//! Call-ID: 1234@host\r\n\
//! From: <sip:alice@example.com>;tag=1\r\n\
//! To: <sip:bob@example.com>\r\n\
//! CSeq: 1 INVITE\r\n\
//! Content-Length: 0\r\n\r\n";
//! let packet = Packet::new(
//!     "10.0.0.1:5060".parse()?,
//!     "10.0.0.2:5060".parse()?,
//!     Transport::Udp,
//!     payload.to_vec(),
//! );
//! assert!(store.ingest(&packet).stored().is_some());
//!
//! store.set_filter(FilterKind::Method, Some("INVITE"))?;
//! assert_eq!(store.visible_calls().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Loading a capture file:
//! ```no_run
//! use std::path::Path;
//!
//! use sipflow_core::{StoreConfig, load_pcap_file};
//!
//! let (store, summary) = load_pcap_file(Path::new("capture.pcapng"), StoreConfig::default())?;
//! println!("{} calls from {} packets", store.len(), summary.packets_total);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod attribute;
mod call;
pub mod capture;
mod config;
mod filter;
mod group;
mod matcher;
mod message;
mod packet;
mod report;
mod shared;
pub mod sip;
pub mod source;
mod store;

pub use attribute::{Attribute, compare_calls};
pub use call::{Call, CallState, RtpCounters};
pub use capture::{LoadError, load_pcap_file, load_source};
pub use config::{CaptureOptions, ConfigError, MatchOptions, SortOptions, StoreConfig};
pub use filter::{DefaultLineRenderer, FilterKind, FilterSet, FilterState, LineRenderer};
pub use group::CallGroup;
pub use matcher::{CompileError, MatchExpression, Matcher};
pub use message::Message;
pub use packet::{Packet, Transport, format_endpoint};
pub use report::{ReportOptions, build_call_report};
pub use shared::SharedCallStore;
pub use sip::{Method, StartLine, Validation, validate};
pub use source::{FrameEvent, FrameSource, MemorySource, PcapFileSource, SourceError};
pub use store::{CallStore, IngestOutcome, RejectReason, StoreStats, Stored};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Call report with calls in display order.
///
/// # Examples
/// ```
/// use sipflow_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, sipflow_core::REPORT_VERSION);
/// assert!(report.calls.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp; the last capture time when known.
    pub generated_at: String,
    pub input: InputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    pub stats: StatsSummary,
    pub calls: Vec<CallSummary>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use sipflow_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "sipflow".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "sipflow");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Input capture metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided by the caller.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Packet-level counters of a loaded capture.
///
/// # Examples
/// ```
/// use sipflow_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     packets_total: 10,
///     sip_messages: 4,
///     ..Default::default()
/// };
/// assert_eq!(summary.rejected_messages, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Frames read from the capture.
    pub packets_total: u64,
    /// Frames that could not be decoded.
    pub decode_errors: u64,
    /// SIP messages stored in calls.
    pub sip_messages: u64,
    /// SIP messages refused by the store policies.
    pub rejected_messages: u64,
    /// RTP/RTCP packets matched to a call's media.
    pub rtp_packets: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Store totals at report time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total: usize,
    /// Calls passing the view filters.
    pub displayed: usize,
    pub active: usize,
}

/// One call of the report.
///
/// # Examples
/// ```
/// use sipflow_core::CallSummary;
///
/// let call = CallSummary {
///     index: 1,
///     call_id: "a84b4c76e66710".to_string(),
///     method: "INVITE".to_string(),
///     src: "10.0.0.1:5060".to_string(),
///     dst: "10.0.0.2:5060".to_string(),
///     transport: "UDP".to_string(),
///     message_count: 1,
///     ..Default::default()
/// };
/// let json = serde_json::to_value(&call).unwrap();
/// assert!(json.get("state").is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallSummary {
    pub index: u64,
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_call_id: Option<String>,
    /// Dialog state, INVITE dialogs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Method or response of the first message.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub src: String,
    pub dst: String,
    pub transport: String,
    pub message_count: usize,
    #[serde(default)]
    pub retransmissions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// `MM:SS` from first to last message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<String>,
    /// `MM:SS` from ACK to BYE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<u16>,
    /// Indexes of calls referencing this one through X-Call-ID.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlated: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtp: Option<RtpSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Position within the call.
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub src: String,
    pub dst: String,
    /// Method or `"<code> <reason>"`.
    pub method: String,
    pub request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cseq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retransmission_of: Option<usize>,
}

/// SDP media line announced in a call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaSummary {
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub port: u16,
    pub protocol: String,
    /// Preferred payload format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpSummary {
    pub packets: u64,
    pub bytes: u64,
}

/// Build a report with base fields filled and no calls.
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> CallReport {
    CallReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "sipflow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        stats: StatsSummary::default(),
        calls: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_optional_fields_when_none() {
        let mut report = make_stub_report("capture.pcapng", 1);
        report.capture_summary = Some(CaptureSummary {
            packets_total: 1,
            ..Default::default()
        });
        report.calls.push(CallSummary {
            index: 1,
            call_id: "abc".to_string(),
            method: "OPTIONS".to_string(),
            messages: vec![MessageSummary {
                method: "OPTIONS".to_string(),
                request: true,
                ..Default::default()
            }],
            ..Default::default()
        });

        let value = serde_json::to_value(&report).expect("report json");
        let capture = value.get("capture_summary").expect("capture_summary");
        assert!(capture.get("time_start").is_none());
        assert!(capture.get("time_end").is_none());

        let call = &value["calls"][0];
        assert!(call.get("x_call_id").is_none());
        assert!(call.get("correlated").is_none());
        assert!(call.get("media").is_none());
        assert_eq!(call["retransmissions"], 0);
        let message = &call["messages"][0];
        assert!(message.get("cseq").is_none());
        assert!(message.get("timestamp").is_none());
    }

    #[test]
    fn stub_report_round_trips_through_json() {
        let report = make_stub_report("in.pcap", 42);
        let text = serde_json::to_string(&report).unwrap();
        let back: CallReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.input.bytes, 42);
        assert_eq!(back.tool.name, "sipflow");
    }
}
