use std::net::SocketAddr;

use once_cell::sync::OnceCell;

use crate::attribute::{Attribute, format_date, format_time};
use crate::packet::{Transport, format_endpoint};
use crate::sip::{Method, SdpMedia, SipHeaders, StartLine, parse_headers, parse_media};

/// One SIP message stored in a call.
///
/// The start line is classified on ingestion; headers and SDP media are
/// extracted on first access and cached for the lifetime of the message.
#[derive(Debug)]
pub struct Message {
    call_index: u64,
    position: usize,
    src: SocketAddr,
    dst: SocketAddr,
    transport: Transport,
    timestamp: Option<f64>,
    payload: String,
    start_line: StartLine,
    headers: OnceCell<SipHeaders>,
    media: OnceCell<Vec<SdpMedia>>,
    retransmission_of: Option<usize>,
}

impl Message {
    pub(crate) fn new(
        src: SocketAddr,
        dst: SocketAddr,
        transport: Transport,
        timestamp: Option<f64>,
        payload: String,
        start_line: StartLine,
    ) -> Self {
        Self {
            call_index: 0,
            position: 0,
            src,
            dst,
            transport,
            timestamp,
            payload,
            start_line,
            headers: OnceCell::new(),
            media: OnceCell::new(),
            retransmission_of: None,
        }
    }

    pub(crate) fn attach(&mut self, call_index: u64, position: usize) {
        self.call_index = call_index;
        self.position = position;
    }

    pub(crate) fn mark_retransmission_of(&mut self, position: usize) {
        self.retransmission_of = Some(position);
    }

    /// Index of the owning call.
    pub fn call_index(&self) -> u64 {
        self.call_index
    }

    /// Zero-based position within the owning call.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn src(&self) -> SocketAddr {
        self.src
    }

    pub fn dst(&self) -> SocketAddr {
        self.dst
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn is_request(&self) -> bool {
        self.start_line.is_request()
    }

    pub fn method(&self) -> Option<&Method> {
        self.start_line.method()
    }

    pub fn code(&self) -> Option<u16> {
        self.start_line.code()
    }

    /// Method name or `"<code> <reason>"`.
    pub fn method_text(&self) -> String {
        self.start_line.summary()
    }

    pub fn headers(&self) -> &SipHeaders {
        self.headers.get_or_init(|| parse_headers(&self.payload))
    }

    pub fn media(&self) -> &[SdpMedia] {
        self.media.get_or_init(|| parse_media(&self.payload))
    }

    /// Whether header extraction already ran.
    pub fn is_parsed(&self) -> bool {
        self.headers.get().is_some()
    }

    /// Run header and media extraction. Repeated calls are no-ops.
    pub fn parse(&self) {
        self.headers();
        self.media();
    }

    pub fn from(&self) -> Option<&str> {
        self.headers().from.as_deref()
    }

    pub fn to(&self) -> Option<&str> {
        self.headers().to.as_deref()
    }

    pub fn cseq(&self) -> Option<u32> {
        self.headers().cseq
    }

    /// Position of the earlier identical message this one repeats.
    pub fn retransmission_of(&self) -> Option<usize> {
        self.retransmission_of
    }

    pub fn is_retransmission(&self) -> bool {
        self.retransmission_of.is_some()
    }

    /// Message-level attribute value. Call-level attributes yield `None`.
    pub fn attribute(&self, attr: Attribute) -> Option<String> {
        match attr {
            Attribute::Src => Some(format_endpoint(&self.src)),
            Attribute::Dst => Some(format_endpoint(&self.dst)),
            Attribute::Method => Some(self.method_text()),
            Attribute::SipFrom => self.headers().from.clone(),
            Attribute::SipTo => self.headers().to.clone(),
            Attribute::SipFromUser => self.headers().from_user.clone(),
            Attribute::SipToUser => self.headers().to_user.clone(),
            Attribute::Date => self.timestamp.and_then(format_date),
            Attribute::Time => self.timestamp.and_then(format_time),
            _ => None,
        }
    }
}
