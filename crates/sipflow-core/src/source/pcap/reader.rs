use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;

/// On-disk capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    /// Classic libpcap file.
    Legacy,
    PcapNg,
}

/// Peek at the magic bytes, rewind, and tell the format apart.
///
/// Anything that is not PCAPNG is handed to the legacy reader, which rejects
/// unknown magics itself.
///
/// # Errors
/// Returns `PcapSourceError::Io` when fewer than four bytes can be read or
/// the reader cannot be rewound.
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<CaptureFormat, PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    if magic == layout::PCAPNG_MAGIC {
        Ok(CaptureFormat::PcapNg)
    } else {
        Ok(CaptureFormat::Legacy)
    }
}

/// Linktype announced for a PCAPNG interface, defaulting to Ethernet.
pub fn linktype_for_interface(linktypes: &[Linktype], if_id: u32) -> Linktype {
    linktypes
        .get(if_id as usize)
        .copied()
        .unwrap_or(Linktype::ETHERNET)
}

/// PCAPNG 64-bit timestamp (microsecond resolution) in seconds.
pub fn pcapng_ts_to_seconds(ts_high: u32, ts_low: u32) -> f64 {
    let ts = ((ts_high as u64) << 32) | (ts_low as u64);
    ts as f64 / layout::PCAPNG_DEFAULT_TS_UNITS
}

/// Legacy record header timestamp in seconds.
pub fn legacy_ts_to_seconds(ts_sec: u32, ts_usec: u32) -> f64 {
    ts_sec as f64 + ts_usec as f64 * 1e-6
}
