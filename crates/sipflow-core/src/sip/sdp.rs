use std::net::IpAddr;

use super::layout;

/// Payload format announced for a media line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpFormat {
    pub code: u8,
    /// `a=rtpmap` encoding (e.g. `PCMU/8000`), when announced.
    pub encoding: Option<String>,
}

/// One `m=` section of an SDP body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpMedia {
    /// Media type (`audio`, `video`, ...).
    pub media_type: String,
    /// Connection address from the media or session `c=` line.
    pub address: Option<IpAddr>,
    pub port: u16,
    /// Transport protocol (`RTP/AVP`, `RTP/SAVP`, ...).
    pub protocol: String,
    /// Formats in `m=` line order; the first one is preferred.
    pub formats: Vec<SdpFormat>,
    /// RTCP port, `port + 1` unless `a=rtcp` says otherwise.
    pub rtcp_port: u16,
}

impl SdpMedia {
    pub fn preferred_format(&self) -> Option<&SdpFormat> {
        self.formats.first()
    }

    /// Display name of the preferred format.
    ///
    /// Falls back to the static RTP payload table for formats without rtpmap.
    pub fn preferred_format_name(&self) -> Option<String> {
        let format = self.preferred_format()?;
        match &format.encoding {
            Some(encoding) => Some(encoding.clone()),
            None => static_payload_name(format.code).map(str::to_string),
        }
    }

    /// Whether `(ip, port)` is this media's RTP or RTCP endpoint.
    pub fn has_endpoint(&self, ip: IpAddr, port: u16) -> bool {
        self.address == Some(ip) && (self.port == port || self.rtcp_port == port)
    }
}

/// Whether a body should be scanned for SDP.
pub fn looks_like_sdp(content_type: Option<&str>, body: &str) -> bool {
    if let Some(content_type) = content_type {
        if content_type
            .to_ascii_lowercase()
            .starts_with(layout::SDP_CONTENT_TYPE)
        {
            return true;
        }
    }
    body.trim_start().starts_with("v=0")
}

/// Extract media descriptors from an SDP body.
///
/// Lines that cannot be parsed are skipped.
pub fn parse_sdp_media(body: &str) -> Vec<SdpMedia> {
    let mut medias: Vec<SdpMedia> = Vec::new();
    let mut session_address = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("m=") {
            if let Some(media) = parse_media_line(rest, session_address) {
                medias.push(media);
            }
        } else if let Some(rest) = line.strip_prefix("c=") {
            let Some(address) = parse_connection(rest) else {
                continue;
            };
            match medias.last_mut() {
                Some(media) => media.address = Some(address),
                None => session_address = Some(address),
            }
        } else if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            let Some(media) = medias.last_mut() else {
                continue;
            };
            let Some((code, encoding)) = rest.split_once(' ') else {
                continue;
            };
            let (Ok(code), Some(encoding)) =
                (code.trim().parse::<u8>(), encoding.split_whitespace().next())
            else {
                continue;
            };
            if let Some(format) = media.formats.iter_mut().find(|f| f.code == code) {
                format.encoding = Some(encoding.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("a=rtcp:") {
            let Some(media) = medias.last_mut() else {
                continue;
            };
            if let Some(Ok(port)) = rest.split_whitespace().next().map(str::parse::<u16>) {
                media.rtcp_port = port;
            }
        }
    }

    medias
}

fn parse_media_line(rest: &str, session_address: Option<IpAddr>) -> Option<SdpMedia> {
    let mut fields = rest.split_whitespace();
    let media_type = fields.next()?;
    // Port may carry a port count (`49170/2`).
    let port = fields.next()?.split('/').next()?.parse::<u16>().ok()?;
    let protocol = fields.next()?;
    let formats = fields
        .filter_map(|code| code.parse::<u8>().ok())
        .map(|code| SdpFormat {
            code,
            encoding: None,
        })
        .collect();

    Some(SdpMedia {
        media_type: media_type.to_string(),
        address: session_address,
        port,
        protocol: protocol.to_string(),
        formats,
        rtcp_port: port.wrapping_add(1),
    })
}

fn parse_connection(rest: &str) -> Option<IpAddr> {
    let mut fields = rest.split_whitespace();
    if fields.next()? != "IN" {
        return None;
    }
    let _addr_type = fields.next()?;
    // Multicast addresses may carry `/ttl`.
    fields.next()?.split('/').next()?.parse().ok()
}

fn static_payload_name(code: u8) -> Option<&'static str> {
    match code {
        0 => Some("PCMU/8000"),
        3 => Some("GSM/8000"),
        4 => Some("G723/8000"),
        8 => Some("PCMA/8000"),
        9 => Some("G722/8000"),
        18 => Some("G729/8000"),
        _ => None,
    }
}
