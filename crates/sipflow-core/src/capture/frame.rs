use std::net::{IpAddr, SocketAddr};

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;
use thiserror::Error;

use crate::packet::Transport;

/// DLT_IPV4 and DLT_IPV6: raw IP without a link header.
const LINKTYPE_IPV4: Linktype = Linktype(228);
const LINKTYPE_IPV6: Linktype = Linktype(229);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("cannot slice frame: {0}")]
    Slice(String),
    #[error("frame has no network layer")]
    MissingNetworkLayer,
}

/// Transport payload of one frame with its endpoints.
#[derive(Debug)]
pub struct Segment<'a> {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub transport: Transport,
    pub payload: &'a [u8],
}

/// Extract the UDP or TCP payload of a link-layer frame.
///
/// Returns `Ok(None)` for unsupported link types, non-IP frames, IP
/// fragments and transports other than UDP/TCP.
pub fn decode_frame(linktype: Linktype, data: &[u8]) -> Result<Option<Segment<'_>>, FrameError> {
    let slice_err = |e: &dyn std::fmt::Display| FrameError::Slice(e.to_string());
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data).map_err(|e| slice_err(&e))?,
        Linktype::RAW | LINKTYPE_IPV4 | LINKTYPE_IPV6 => {
            SlicedPacket::from_ip(data).map_err(|e| slice_err(&e))?
        }
        Linktype::LINUX_SLL => SlicedPacket::from_linux_sll(data).map_err(|e| slice_err(&e))?,
        _ => return Ok(None),
    };

    let Some(net) = sliced.net else {
        // ARP and friends on an Ethernet link.
        return if sliced.link.is_some() {
            Ok(None)
        } else {
            Err(FrameError::MissingNetworkLayer)
        };
    };
    let (src_ip, dst_ip) = match &net {
        NetSlice::Ipv4(ipv4) => (
            IpAddr::V4(ipv4.header().source_addr()),
            IpAddr::V4(ipv4.header().destination_addr()),
        ),
        NetSlice::Ipv6(ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
        ),
        _ => return Ok(None),
    };

    let segment = match sliced.transport {
        Some(TransportSlice::Udp(udp)) => Segment {
            src: SocketAddr::new(src_ip, udp.source_port()),
            dst: SocketAddr::new(dst_ip, udp.destination_port()),
            transport: Transport::Udp,
            payload: udp.payload(),
        },
        Some(TransportSlice::Tcp(tcp)) => Segment {
            src: SocketAddr::new(src_ip, tcp.source_port()),
            dst: SocketAddr::new(dst_ip, tcp.destination_port()),
            transport: Transport::Tcp,
            payload: tcp.payload(),
        },
        _ => return Ok(None),
    };
    Ok(Some(segment))
}

#[cfg(test)]
mod tests {
    use super::{FrameError, LINKTYPE_IPV4, decode_frame};
    use crate::packet::Transport;
    use etherparse::PacketBuilder;
    use pcap_parser::Linktype;

    #[test]
    fn ethernet_udp_payload() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .udp(5060, 5062);
        let payload = b"OPTIONS sip:x SIP/2.0\r\n\r\n";
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();

        let segment = decode_frame(Linktype::ETHERNET, &frame).unwrap().unwrap();
        assert_eq!(segment.transport, Transport::Udp);
        assert_eq!(segment.src.to_string(), "192.168.0.1:5060");
        assert_eq!(segment.dst.port(), 5062);
        assert_eq!(segment.payload, payload);
    }

    #[test]
    fn raw_ipv6_tcp_payload() {
        let builder = PacketBuilder::ipv6([0xfe; 16], [0x20; 16], 64).tcp(40000, 5060, 1, 1024);
        let payload = b"REGISTER sip:x SIP/2.0\r\n";
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();

        let segment = decode_frame(Linktype::RAW, &frame).unwrap().unwrap();
        assert_eq!(segment.transport, Transport::Tcp);
        assert_eq!(segment.dst.port(), 5060);
        assert_eq!(segment.payload, payload);
        assert!(decode_frame(LINKTYPE_IPV4, &frame).is_ok());
    }

    #[test]
    fn unsupported_linktype_is_skipped() {
        assert!(decode_frame(Linktype(147), &[0u8; 4]).unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_an_error() {
        assert!(matches!(
            decode_frame(Linktype::ETHERNET, &[]),
            Err(FrameError::Slice(_))
        ));
    }
}
