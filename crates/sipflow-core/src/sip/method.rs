use std::fmt;

/// SIP request method. Methods outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Register,
    Invite,
    Subscribe,
    Notify,
    Options,
    Publish,
    Message,
    Cancel,
    Bye,
    Ack,
    Prack,
    Info,
    Refer,
    Update,
    Other(String),
}

impl Method {
    pub fn parse(token: &str) -> Self {
        match token {
            "REGISTER" => Method::Register,
            "INVITE" => Method::Invite,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "OPTIONS" => Method::Options,
            "PUBLISH" => Method::Publish,
            "MESSAGE" => Method::Message,
            "CANCEL" => Method::Cancel,
            "BYE" => Method::Bye,
            "ACK" => Method::Ack,
            "PRACK" => Method::Prack,
            "INFO" => Method::Info,
            "REFER" => Method::Refer,
            "UPDATE" => Method::Update,
            other => Method::Other(other.to_string()),
        }
    }

    /// Requests that may open a new dialog: REGISTER through MESSAGE.
    pub fn starts_dialog(&self) -> bool {
        matches!(
            self,
            Method::Register
                | Method::Invite
                | Method::Subscribe
                | Method::Notify
                | Method::Options
                | Method::Publish
                | Method::Message
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Register => "REGISTER",
            Method::Invite => "INVITE",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Options => "OPTIONS",
            Method::Publish => "PUBLISH",
            Method::Message => "MESSAGE",
            Method::Cancel => "CANCEL",
            Method::Bye => "BYE",
            Method::Ack => "ACK",
            Method::Prack => "PRACK",
            Method::Info => "INFO",
            Method::Refer => "REFER",
            Method::Update => "UPDATE",
            Method::Other(text) => text,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified first line of a SIP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request { method: Method, uri: String },
    Response { code: u16, reason: String },
}

impl StartLine {
    pub fn is_request(&self) -> bool {
        matches!(self, StartLine::Request { .. })
    }

    pub fn method(&self) -> Option<&Method> {
        match self {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            StartLine::Request { .. } => None,
            StartLine::Response { code, .. } => Some(*code),
        }
    }

    /// Method name for requests, `"<code> <reason>"` for responses.
    ///
    /// Responses without reason text fall back to the standard phrase.
    pub fn summary(&self) -> String {
        match self {
            StartLine::Request { method, .. } => method.to_string(),
            StartLine::Response { code, reason } if !reason.is_empty() => {
                format!("{code} {reason}")
            }
            StartLine::Response { code, .. } => match reason_phrase(*code) {
                Some(phrase) => format!("{code} {phrase}"),
                None => code.to_string(),
            },
        }
    }
}

/// Standard reason phrase for a response code.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    let phrase = match code {
        100 => "Trying",
        180 => "Ringing",
        181 => "Call is Being Forwarded",
        182 => "Queued",
        183 => "Session Progress",
        199 => "Early Dialog Terminated",
        200 => "OK",
        202 => "Accepted",
        204 => "No Notification",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Moved Temporarily",
        305 => "Use Proxy",
        380 => "Alternative Service",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Conditional Request Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Unsupported URI Scheme",
        417 => "Unknown Resource-Priority",
        420 => "Bad Extension",
        421 => "Extension Required",
        422 => "Session Interval Too Small",
        423 => "Interval Too Brief",
        424 => "Bad Location Information",
        428 => "Use Identity Header",
        429 => "Provide Referrer Identity",
        430 => "Flow Failed",
        433 => "Anonymity Disallowed",
        436 => "Bad Identity-Info",
        437 => "Unsupported Certificate",
        438 => "Invalid Identity Header",
        439 => "First Hop Lacks Outbound Support",
        470 => "Consent Needed",
        480 => "Temporarily Unavailable",
        481 => "Call/Transaction Does Not Exist",
        482 => "Loop Detected",
        483 => "Too Many Hops",
        484 => "Address Incomplete",
        485 => "Ambiguous",
        486 => "Busy Here",
        487 => "Request Terminated",
        488 => "Not Acceptable Here",
        489 => "Bad Event",
        491 => "Request Pending",
        493 => "Undecipherable",
        494 => "Security Agreement Required",
        500 => "Server Internal Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Server Time-out",
        505 => "Version Not Supported",
        513 => "Message Too Large",
        580 => "Precondition Failure",
        600 => "Busy Everywhere",
        603 => "Decline",
        604 => "Does Not Exist Anywhere",
        606 => "Not Acceptable",
        _ => return None,
    };
    Some(phrase)
}

#[cfg(test)]
mod tests {
    use super::{Method, StartLine, reason_phrase};

    #[test]
    fn unknown_method_is_preserved() {
        let method = Method::parse("FOOBAR");
        assert_eq!(method, Method::Other("FOOBAR".to_string()));
        assert_eq!(method.as_str(), "FOOBAR");
    }

    #[test]
    fn in_dialog_methods_do_not_start_dialogs() {
        assert!(Method::Invite.starts_dialog());
        assert!(Method::Message.starts_dialog());
        assert!(!Method::Bye.starts_dialog());
        assert!(!Method::Other("FOO".into()).starts_dialog());
    }

    #[test]
    fn response_summary_prefers_payload_reason() {
        let custom = StartLine::Response {
            code: 200,
            reason: "Okey Dokey".to_string(),
        };
        assert_eq!(custom.summary(), "200 Okey Dokey");

        let bare = StartLine::Response {
            code: 486,
            reason: String::new(),
        };
        assert_eq!(bare.summary(), "486 Busy Here");

        let unknown = StartLine::Response {
            code: 299,
            reason: String::new(),
        };
        assert_eq!(unknown.summary(), "299");
    }

    #[test]
    fn reason_table_has_gaps() {
        assert_eq!(reason_phrase(183), Some("Session Progress"));
        assert_eq!(reason_phrase(299), None);
    }
}
