use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::call::Call;
use crate::config::ConfigError;

/// Call and message attributes used for sorting, filtering and display.
///
/// Call-level attributes are computed from the call itself; the others are
/// read from the call's first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "index")]
    CallIndex,
    #[serde(rename = "callid")]
    CallId,
    #[serde(rename = "xcallid")]
    XCallId,
    #[serde(rename = "msgcnt")]
    MsgCount,
    #[serde(rename = "state")]
    CallState,
    #[serde(rename = "transport")]
    Transport,
    #[serde(rename = "convdur")]
    ConvDuration,
    #[serde(rename = "totaldur")]
    TotalDuration,
    #[serde(rename = "reason")]
    ReasonText,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "src")]
    Src,
    #[serde(rename = "dst")]
    Dst,
    #[serde(rename = "method")]
    Method,
    #[serde(rename = "sipfrom")]
    SipFrom,
    #[serde(rename = "sipto")]
    SipTo,
    #[serde(rename = "sipfromuser")]
    SipFromUser,
    #[serde(rename = "siptouser")]
    SipToUser,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "time")]
    Time,
}

impl Attribute {
    pub const ALL: [Attribute; 19] = [
        Attribute::CallIndex,
        Attribute::CallId,
        Attribute::XCallId,
        Attribute::MsgCount,
        Attribute::CallState,
        Attribute::Transport,
        Attribute::ConvDuration,
        Attribute::TotalDuration,
        Attribute::ReasonText,
        Attribute::Warning,
        Attribute::Src,
        Attribute::Dst,
        Attribute::Method,
        Attribute::SipFrom,
        Attribute::SipTo,
        Attribute::SipFromUser,
        Attribute::SipToUser,
        Attribute::Date,
        Attribute::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::CallIndex => "index",
            Attribute::CallId => "callid",
            Attribute::XCallId => "xcallid",
            Attribute::MsgCount => "msgcnt",
            Attribute::CallState => "state",
            Attribute::Transport => "transport",
            Attribute::ConvDuration => "convdur",
            Attribute::TotalDuration => "totaldur",
            Attribute::ReasonText => "reason",
            Attribute::Warning => "warning",
            Attribute::Src => "src",
            Attribute::Dst => "dst",
            Attribute::Method => "method",
            Attribute::SipFrom => "sipfrom",
            Attribute::SipTo => "sipto",
            Attribute::SipFromUser => "sipfromuser",
            Attribute::SipToUser => "siptouser",
            Attribute::Date => "date",
            Attribute::Time => "time",
        }
    }

    /// Column title for list renderers.
    pub fn title(self) -> &'static str {
        match self {
            Attribute::CallIndex => "Idx",
            Attribute::CallId => "Call-ID",
            Attribute::XCallId => "X-Call-ID",
            Attribute::MsgCount => "Msgs",
            Attribute::CallState => "State",
            Attribute::Transport => "Transport",
            Attribute::ConvDuration => "ConvDur",
            Attribute::TotalDuration => "TotalDur",
            Attribute::ReasonText => "Reason Text",
            Attribute::Warning => "Warning",
            Attribute::Src => "Source",
            Attribute::Dst => "Destination",
            Attribute::Method => "Method",
            Attribute::SipFrom => "SIP From",
            Attribute::SipTo => "SIP To",
            Attribute::SipFromUser => "SIP From User",
            Attribute::SipToUser => "SIP To User",
            Attribute::Date => "Date",
            Attribute::Time => "Time",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Attribute::CallIndex | Attribute::MsgCount)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .into_iter()
            .find(|attr| attr.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownAttribute(s.to_string()))
    }
}

/// Order two calls by one attribute.
///
/// Index and message count compare numerically. Text attributes compare
/// lexicographically and a missing value sorts before any present one.
pub fn compare_calls(a: &Call, b: &Call, attr: Attribute) -> Ordering {
    if attr.is_numeric() {
        let key = |call: &Call| match attr {
            Attribute::CallIndex => call.index(),
            _ => call.message_count() as u64,
        };
        return key(a).cmp(&key(b));
    }
    match (a.attribute(attr), b.attribute(attr)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

fn to_datetime(ts: f64) -> Option<OffsetDateTime> {
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

/// `YYYY/MM/DD` in UTC.
pub(crate) fn format_date(ts: f64) -> Option<String> {
    let dt = to_datetime(ts)?;
    Some(format!(
        "{:04}/{:02}/{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day()
    ))
}

/// `HH:MM:SS.uuuuuu` in UTC.
pub(crate) fn format_time(ts: f64) -> Option<String> {
    let dt = to_datetime(ts)?;
    Some(format!(
        "{:02}:{:02}:{:02}.{:06}",
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.microsecond()
    ))
}

/// `MM:SS` between two capture times; minutes are not wrapped into hours.
pub(crate) fn format_duration(start: f64, end: f64) -> String {
    let secs = (end - start).max(0.0) as u64;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
