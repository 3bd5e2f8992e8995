use once_cell::sync::Lazy;
use regex::Regex;

use super::layout;
use super::method::{Method, StartLine};
use super::reader::SipReader;
use super::sdp::{SdpMedia, looks_like_sdp, parse_sdp_media};

static REQUEST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<method>[A-Za-z]+) (?P<uri>[^\s:]+:\S*) SIP/2\.0$").expect("request line regex")
});
static RESPONSE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SIP/2\.0 (?P<code>\d{3})(?: (?P<reason>.*))?$").expect("response line regex")
});
static ADDRESS_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^:]+:(?P<uri>(?:(?P<user>[^@;>\s]+)@)?[^;>\s]+)").expect("address regex")
});
static TAG_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i);\s*tag=(?P<tag>[^;>\s]+)").expect("tag regex"));
static REASON_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i);\s*text="(?P<text>[^"]*)""#).expect("reason regex"));
static CSEQ_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<seq>\d+)\s+(?P<method>\S+)").expect("cseq regex")
});
static WARNING_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<code>\d{3})").expect("warning regex"));

/// Completeness of a (possibly stream-reassembled) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    NotSip,
    /// More bytes are needed; keep the buffer.
    Partial,
    Complete,
    /// A complete message of `length` bytes is followed by more data.
    Multiple { length: usize },
}

/// Header fields of interest. Absent headers stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipHeaders {
    /// `user@host` from the From URI.
    pub from: Option<String>,
    pub from_user: Option<String>,
    pub from_tag: Option<String>,
    pub to: Option<String>,
    pub to_user: Option<String>,
    pub to_tag: Option<String>,
    pub cseq: Option<u32>,
    pub cseq_method: Option<String>,
    pub content_length: Option<usize>,
    pub content_type: Option<String>,
    pub contact: Option<String>,
    /// Quoted `text=` parameter of the Reason header.
    pub reason: Option<String>,
    /// Warning code.
    pub warning: Option<u16>,
}

/// Classify a buffer as SIP and check its body against Content-Length.
///
/// Meant for stream transports where message boundaries are not packet
/// boundaries; datagram payloads are complete by construction. The size
/// limit applies to the first message only: a buffer holding a complete
/// message followed by more bytes is `Multiple` whatever its total size.
pub fn validate(payload: &[u8]) -> Validation {
    if payload.is_empty() {
        return Validation::NotSip;
    }
    // A later message may be cut inside a multi-byte character; only bytes
    // that can never become UTF-8 count against the buffer.
    let (text, invalid_byte) = match std::str::from_utf8(payload) {
        Ok(text) => (text, false),
        Err(err) => (
            std::str::from_utf8(&payload[..err.valid_up_to()]).unwrap_or_default(),
            err.error_len().is_some(),
        ),
    };
    if !is_sip_start(text) {
        return Validation::NotSip;
    }

    let reader = SipReader::new(text);
    let (Some(body_offset), Some(content_length)) = (reader.body_offset(), reader.content_length())
    else {
        // Header section still open, or no Content-Length yet.
        return if invalid_byte || payload.len() > layout::MAX_SIP_PAYLOAD {
            Validation::NotSip
        } else {
            Validation::Partial
        };
    };

    let length = body_offset + content_length;
    if length > layout::MAX_SIP_PAYLOAD {
        return Validation::NotSip;
    }
    match length.cmp(&payload.len()) {
        std::cmp::Ordering::Greater => Validation::Partial,
        std::cmp::Ordering::Equal => Validation::Complete,
        std::cmp::Ordering::Less => Validation::Multiple { length },
    }
}

fn is_sip_start(text: &str) -> bool {
    SipReader::new(text)
        .start_line()
        .is_some_and(|line| parse_start_line(line).is_some())
}

pub fn extract_call_id(payload: &str) -> Option<String> {
    non_empty(SipReader::new(payload).header(layout::CALL_ID)?.as_ref())
}

pub fn extract_x_call_id(payload: &str) -> Option<String> {
    non_empty(SipReader::new(payload).header(layout::X_CALL_ID)?.as_ref())
}

/// Classify the first line as a request or a response.
pub fn parse_request_response(payload: &str) -> Option<StartLine> {
    parse_start_line(SipReader::new(payload).start_line()?)
}

fn parse_start_line(line: &str) -> Option<StartLine> {
    if let Some(caps) = RESPONSE_LINE.captures(line) {
        let code = caps.name("code")?.as_str().parse().ok()?;
        let reason = caps
            .name("reason")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        return Some(StartLine::Response { code, reason });
    }
    let caps = REQUEST_LINE.captures(line)?;
    Some(StartLine::Request {
        method: Method::parse(caps.name("method")?.as_str()),
        uri: caps.name("uri")?.as_str().to_string(),
    })
}

pub fn parse_headers(payload: &str) -> SipHeaders {
    let reader = SipReader::new(payload);
    let mut headers = SipHeaders::default();

    for header in reader.headers() {
        let name = header.name.to_ascii_lowercase();
        let value = header.value.as_ref();
        let is = |names: &[&str]| names.contains(&name.as_str());

        if is(layout::FROM) && headers.from.is_none() {
            let (uri, user) = parse_address(value);
            headers.from = uri;
            headers.from_user = user;
            headers.from_tag = parse_tag(value);
        } else if is(layout::TO) && headers.to.is_none() {
            let (uri, user) = parse_address(value);
            headers.to = uri;
            headers.to_user = user;
            headers.to_tag = parse_tag(value);
        } else if is(layout::CSEQ) && headers.cseq.is_none() {
            if let Some(caps) = CSEQ_VALUE.captures(value) {
                headers.cseq = caps.name("seq").and_then(|m| m.as_str().parse().ok());
                headers.cseq_method = caps.name("method").map(|m| m.as_str().to_string());
            }
        } else if is(layout::CONTENT_LENGTH) && headers.content_length.is_none() {
            headers.content_length = value.parse().ok();
        } else if is(layout::CONTENT_TYPE) && headers.content_type.is_none() {
            headers.content_type = non_empty(value);
        } else if is(layout::CONTACT) && headers.contact.is_none() {
            headers.contact = non_empty(value);
        } else if is(layout::REASON) && headers.reason.is_none() {
            headers.reason = REASON_TEXT
                .captures(value)
                .and_then(|caps| caps.name("text"))
                .and_then(|m| non_empty(m.as_str()));
        } else if is(layout::WARNING) && headers.warning.is_none() {
            headers.warning = WARNING_CODE
                .captures(value)
                .and_then(|caps| caps.name("code"))
                .and_then(|m| m.as_str().parse().ok());
        }
    }

    headers
}

/// SDP media descriptors of the message body, if the body is SDP.
pub fn parse_media(payload: &str) -> Vec<SdpMedia> {
    let reader = SipReader::new(payload);
    let Some(body) = reader.body() else {
        return Vec::new();
    };
    let content_type = reader.header(layout::CONTENT_TYPE);
    if !looks_like_sdp(content_type.as_deref(), body) {
        return Vec::new();
    }
    parse_sdp_media(body)
}

fn parse_address(value: &str) -> (Option<String>, Option<String>) {
    match ADDRESS_URI.captures(value) {
        Some(caps) => (
            caps.name("uri").map(|m| m.as_str().to_string()),
            caps.name("user").map(|m| m.as_str().to_string()),
        ),
        None => (None, None),
    }
}

fn parse_tag(value: &str) -> Option<String> {
    // Header parameters follow the closing bracket of a name-addr.
    let params = match value.rfind('>') {
        Some(idx) => &value[idx..],
        None => value,
    };
    TAG_PARAM
        .captures(params)
        .and_then(|caps| caps.name("tag"))
        .map(|m| m.as_str().to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}
