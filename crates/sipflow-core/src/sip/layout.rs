/// Largest payload accepted as a single SIP message.
pub const MAX_SIP_PAYLOAD: usize = 10 * 1024;

pub const CRLF_SEPARATOR: &str = "\r\n\r\n";
pub const LF_SEPARATOR: &str = "\n\n";

pub const SDP_CONTENT_TYPE: &str = "application/sdp";

// Header names in lowercase, full form first, compact form(s) after.
pub const CALL_ID: &[&str] = &["call-id", "i"];
pub const X_CALL_ID: &[&str] = &["x-call-id", "x-cid"];
pub const FROM: &[&str] = &["from", "f"];
pub const TO: &[&str] = &["to", "t"];
pub const CSEQ: &[&str] = &["cseq"];
pub const CONTENT_LENGTH: &[&str] = &["content-length", "l"];
pub const CONTENT_TYPE: &[&str] = &["content-type", "c"];
pub const CONTACT: &[&str] = &["contact", "m"];
pub const REASON: &[&str] = &["reason"];
pub const WARNING: &[&str] = &["warning"];
