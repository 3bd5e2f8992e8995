use std::borrow::Cow;

use super::layout;

/// One header line, with continuation lines already unfolded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a str,
    pub value: Cow<'a, str>,
}

/// Read-only view over the text of a SIP message.
///
/// Accepts CRLF and bare LF line endings.
pub struct SipReader<'a> {
    text: &'a str,
}

impl<'a> SipReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// First line of the message without its line terminator.
    pub fn start_line(&self) -> Option<&'a str> {
        let line = self.text.split('\n').next()?;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() { None } else { Some(line) }
    }

    /// Byte offset where the body starts, if the header/body separator is present.
    pub fn body_offset(&self) -> Option<usize> {
        let crlf = self
            .text
            .find(layout::CRLF_SEPARATOR)
            .map(|idx| idx + layout::CRLF_SEPARATOR.len());
        let lf = self
            .text
            .find(layout::LF_SEPARATOR)
            .map(|idx| idx + layout::LF_SEPARATOR.len());
        match (crlf, lf) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Header section (start line included); the whole text when no separator exists.
    pub fn head(&self) -> &'a str {
        match self.body_offset() {
            Some(offset) => self.text[..offset].trim_end_matches(['\r', '\n']),
            None => self.text,
        }
    }

    pub fn body(&self) -> Option<&'a str> {
        self.body_offset().map(|offset| &self.text[offset..])
    }

    /// All header lines after the start line, unfolded.
    pub fn headers(&self) -> Vec<Header<'a>> {
        let mut headers: Vec<Header<'a>> = Vec::new();
        for line in self.head().split('\n').skip(1) {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.starts_with([' ', '\t']) {
                if let Some(last) = headers.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        let value = last.value.to_mut();
                        value.push(' ');
                        value.push_str(folded);
                    }
                }
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            headers.push(Header {
                name: name.trim(),
                value: Cow::Borrowed(value.trim()),
            });
        }
        headers
    }

    /// Value of the first header matching any of `names` (lowercase), ignoring case.
    pub fn header(&self, names: &[&str]) -> Option<Cow<'a, str>> {
        self.headers()
            .into_iter()
            .find(|header| names.iter().any(|n| header.name.eq_ignore_ascii_case(n)))
            .map(|header| header.value)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header(layout::CONTENT_LENGTH)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::SipReader;
    use crate::sip::layout;

    #[test]
    fn start_line_strips_carriage_return() {
        let reader = SipReader::new("OPTIONS sip:a@b SIP/2.0\r\nCSeq: 1 OPTIONS\r\n\r\n");
        assert_eq!(reader.start_line(), Some("OPTIONS sip:a@b SIP/2.0"));
    }

    #[test]
    fn folded_header_is_joined() {
        let text = "INVITE sip:b@x SIP/2.0\r\nSubject: first\r\n  second\r\nCall-ID: abc\r\n\r\n";
        let reader = SipReader::new(text);
        let subject = reader.header(&["subject"]).unwrap();
        assert_eq!(subject, "first second");
        assert_eq!(reader.header(layout::CALL_ID).unwrap(), "abc");
    }

    #[test]
    fn compact_names_and_case_are_accepted() {
        let text = "BYE sip:b@x SIP/2.0\nI: compact-id\nl: 0\n\n";
        let reader = SipReader::new(text);
        assert_eq!(reader.header(layout::CALL_ID).unwrap(), "compact-id");
        assert_eq!(reader.content_length(), Some(0));
        assert_eq!(reader.body(), Some(""));
    }

    #[test]
    fn body_headers_are_not_read_as_headers() {
        let text = "INVITE sip:b@x SIP/2.0\r\nContent-Length: 12\r\n\r\nCall-ID: no\r\n";
        let reader = SipReader::new(text);
        assert!(reader.header(layout::CALL_ID).is_none());
        assert_eq!(reader.body(), Some("Call-ID: no\r\n"));
    }

    #[test]
    fn missing_separator_means_no_body() {
        let reader = SipReader::new("INVITE sip:b@x SIP/2.0\r\nCall-ID: abc\r\n");
        assert!(reader.body_offset().is_none());
        assert_eq!(reader.header(layout::CALL_ID).unwrap(), "abc");
    }
}
