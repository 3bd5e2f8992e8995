//! SIP message decoding.
//!
//! The module follows a layered structure:
//! - `layout`: size limits, separators and header names (source of truth)
//! - `reader`: safe text access (start line, unfolded headers, body)
//! - `method`: request methods and the response reason table
//! - `parser`: validation, start-line classification and header extraction
//! - `sdp`: media descriptors from SDP bodies
//!
//! Parsing is pragmatic pattern matching over a limited header set rather
//! than a full RFC 3261 grammar. Missing headers and malformed SDP lines
//! produce empty values, never errors. Parsers are pure and contain no I/O.

pub mod layout;
pub mod method;
pub mod parser;
pub mod reader;
pub mod sdp;

pub use method::{Method, StartLine, reason_phrase};
pub use parser::{
    SipHeaders, Validation, extract_call_id, extract_x_call_id, parse_headers, parse_media,
    parse_request_response, validate,
};
pub use sdp::{SdpFormat, SdpMedia};
