//! Capture sources emitting raw link-layer frames.
//!
//! A source only knows about files and frames; decoding IP/UDP/TCP and SIP
//! happens in `capture`.

pub mod pcap;

use std::collections::VecDeque;

use pcap_parser::Linktype;
use thiserror::Error;

pub use pcap::PcapFileSource;

/// One captured frame.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    /// Capture time in seconds since the Unix epoch.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

pub trait FrameSource {
    /// Next frame, or `None` at the end of the capture.
    fn next_frame(&mut self) -> Result<Option<FrameEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}

/// In-memory frames, replayed in order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<FrameEvent>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = FrameEvent>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<FrameEvent>, SourceError> {
        Ok(self.frames.pop_front())
    }
}
