use std::fs;
use std::path::{Path, PathBuf};

use etherparse::PacketBuilder;
use sipflow_core::{
    Attribute, CallState, FrameSource, LoadError, PcapFileSource, SourceError, StoreConfig, Transport,
    load_pcap_file,
};
use tempfile::TempDir;

const ALICE: [u8; 4] = [192, 168, 1, 10];
const BOB: [u8; 4] = [192, 168, 1, 20];

fn sip_request(method: &str, cseq: u32, body: &str) -> String {
    let content_type = if body.is_empty() {
        String::new()
    } else {
        "Content-Type: application/sdp\r\n".to_string()
    };
    format!(
        "{method} sip:bob@192.168.1.20 SIP/2.0\r\n\
Via: SIP/2.0/UDP 192.168.1.10:5060;branch=z9hG4bK{cseq}{method}\r\n\
Call-ID: pcap-call@192.168.1.10\r\n\
From: <sip:alice@192.168.1.10>;tag=a1\r\n\
To: <sip:bob@192.168.1.20>\r\n\
CSeq: {cseq} {method}\r\n\
{content_type}Content-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

fn sip_response(code: u16, reason: &str, cseq: u32, method: &str) -> String {
    format!(
        "SIP/2.0 {code} {reason}\r\n\
Call-ID: pcap-call@192.168.1.10\r\n\
From: <sip:alice@192.168.1.10>;tag=a1\r\n\
To: <sip:bob@192.168.1.20>;tag=b1\r\n\
CSeq: {cseq} {method}\r\n\
Content-Length: 0\r\n\r\n"
    )
}

fn ethernet_udp(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv4(src, dst, 64)
        .udp(sport, dport);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn ethernet_tcp(seq: u32, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv4(ALICE, BOB, 64)
        .tcp(40000, 5060, seq, 65535);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

fn raw_udp(payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ipv4(ALICE, BOB, 64).udp(5060, 5060);
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).unwrap();
    packet
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn write_pcapng(path: &Path, linktype: u16, frames: &[(u64, Vec<u8>)]) {
    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    shb.extend_from_slice(&1u16.to_be_bytes());
    shb.extend_from_slice(&0u16.to_be_bytes());
    shb.extend_from_slice(&(-1i64).to_be_bytes());

    let mut idb = Vec::new();
    idb.extend_from_slice(&linktype.to_be_bytes());
    idb.extend_from_slice(&0u16.to_be_bytes());
    idb.extend_from_slice(&65535u32.to_be_bytes());

    let mut out = pcapng_block(0x0A0D0D0A, &shb);
    out.extend_from_slice(&pcapng_block(1, &idb));
    for (ts_us, data) in frames {
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_be_bytes());
        epb.extend_from_slice(&((ts_us >> 32) as u32).to_be_bytes());
        epb.extend_from_slice(&(*ts_us as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(data);
        epb.resize(epb.len() + (4 - data.len() % 4) % 4, 0);
        out.extend_from_slice(&pcapng_block(6, &epb));
    }
    fs::write(path, out).unwrap();
}

fn write_legacy_pcap(path: &Path, linktype: u32, frames: &[(u32, Vec<u8>)]) {
    let mut out = Vec::new();
    out.extend_from_slice(&0xA1B2C3D4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&linktype.to_le_bytes());
    for (ts_sec, data) in frames {
        out.extend_from_slice(&ts_sec.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    fs::write(path, out).unwrap();
}

fn call_capture(dir: &TempDir) -> PathBuf {
    let sdp = "v=0\r\no=- 1 1 IN IP4 192.168.1.10\r\ns=-\r\nc=IN IP4 192.168.1.10\r\nt=0 0\r\nm=audio 49170 RTP/AVP 0\r\na=rtpmap:0 PCMU/8000\r\n";
    let sip = |src, dst, text: String| ethernet_udp(src, dst, 5060, 5060, text.as_bytes());
    let frames = vec![
        (1_000_000, sip(ALICE, BOB, sip_request("INVITE", 1, sdp))),
        (1_100_000, sip(BOB, ALICE, sip_response(180, "Ringing", 1, "INVITE"))),
        (1_900_000, sip(BOB, ALICE, sip_response(200, "OK", 1, "INVITE"))),
        (2_000_000, sip(ALICE, BOB, sip_request("ACK", 1, ""))),
        (2_200_000, ethernet_udp(BOB, ALICE, 30000, 49170, &[0x80, 0, 0, 1, 0, 0, 0, 0])),
        (2_220_000, ethernet_udp(BOB, ALICE, 30000, 49170, &[0x80, 0, 0, 2, 0, 0, 0, 0])),
        (32_000_000, sip(ALICE, BOB, sip_request("BYE", 2, ""))),
        (33_000_000, sip(BOB, ALICE, sip_response(200, "OK", 2, "BYE"))),
    ];
    let path = dir.path().join("call.pcapng");
    write_pcapng(&path, 1, &frames);
    path
}

#[test]
fn pcapng_dialog_is_tracked_to_completion() {
    let dir = TempDir::new().unwrap();
    let path = call_capture(&dir);
    let mut config = StoreConfig::default();
    config.capture.rtp = true;

    let (store, summary) = load_pcap_file(&path, config).unwrap();
    assert_eq!(summary.packets_total, 8);
    assert_eq!(summary.sip_messages, 6);
    assert_eq!(summary.rtp_packets, 2);
    assert_eq!(summary.decode_errors, 0);
    assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:00:01Z"));
    assert_eq!(summary.time_end.as_deref(), Some("1970-01-01T00:00:33Z"));

    assert_eq!(store.len(), 1);
    let call = store.find_by_call_id("pcap-call@192.168.1.10").unwrap();
    assert_eq!(call.message_count(), 6);
    assert_eq!(call.state(), Some(CallState::Completed));
    assert_eq!(call.rtp().packets, 2);
    assert_eq!(call.media().count(), 1);
    assert_eq!(call.attribute(Attribute::ConvDuration).as_deref(), Some("00:30"));
    assert_eq!(call.attribute(Attribute::TotalDuration).as_deref(), Some("00:32"));
    assert_eq!(call.messages()[0].transport(), Transport::Udp);
}

#[test]
fn tcp_message_split_over_frames_is_reassembled() {
    let dir = TempDir::new().unwrap();
    let text = sip_request("OPTIONS", 1, "");
    let (head, tail) = text.as_bytes().split_at(40);
    let frames = vec![
        (1_000_000, ethernet_tcp(1, head)),
        (1_000_500, ethernet_tcp(1 + head.len() as u32, tail)),
    ];
    let path = dir.path().join("tcp.pcapng");
    write_pcapng(&path, 1, &frames);

    let (store, summary) = load_pcap_file(&path, StoreConfig::default()).unwrap();
    assert_eq!(summary.sip_messages, 1);
    let call = store.find_by_call_id("pcap-call@192.168.1.10").unwrap();
    assert_eq!(call.messages()[0].transport(), Transport::Tcp);
    assert_eq!(call.messages()[0].timestamp(), Some(1.0));
}

#[test]
fn legacy_pcap_with_raw_ip_link() {
    let dir = TempDir::new().unwrap();
    let frames = vec![
        (10, raw_udp(sip_request("REGISTER", 1, "").as_bytes())),
        (11, raw_udp(b"\x00\x01not sip at all")),
    ];
    let path = dir.path().join("raw.pcap");
    write_legacy_pcap(&path, 101, &frames);

    let mut source = PcapFileSource::open(&path).unwrap();
    let mut count = 0;
    while let Some(frame) = source.next_frame().unwrap() {
        assert!(frame.ts.is_some());
        count += 1;
    }
    assert_eq!(count, 2);

    let (store, summary) = load_pcap_file(&path, StoreConfig::default()).unwrap();
    assert_eq!(summary.packets_total, 2);
    assert_eq!(summary.sip_messages, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.calls().next().unwrap().state(), None);
}

#[test]
fn policies_are_counted_as_rejections() {
    let dir = TempDir::new().unwrap();
    let frames = vec![(10, raw_udp(sip_request("REGISTER", 1, "").as_bytes()))];
    let path = dir.path().join("register.pcap");
    write_legacy_pcap(&path, 101, &frames);

    let mut config = StoreConfig::default();
    config.match_opts.invite = true;
    let (store, summary) = load_pcap_file(&path, config).unwrap();
    assert!(store.is_empty());
    assert_eq!(summary.rejected_messages, 1);
}

#[test]
fn truncated_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();

    let err = match load_pcap_file(&path, StoreConfig::default()) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, LoadError::Source(SourceError::Io(_))));
}

#[test]
fn invalid_match_expression_fails_before_reading() {
    let dir = TempDir::new().unwrap();
    let mut config = StoreConfig::default();
    config.match_opts.expression = Some("(unclosed".to_string());

    let err = match load_pcap_file(&dir.path().join("absent.pcapng"), config) {
        Ok(_) => panic!("expected configuration error"),
        Err(err) => err,
    };
    assert!(matches!(err, LoadError::Config(_)));
}
