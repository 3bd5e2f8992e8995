/// Initial buffer size handed to the `pcap-parser` readers.
pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// Section Header Block type, the first four bytes of every PCAPNG file.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Timestamp units per second when no `if_tsresol` option is present.
pub const PCAPNG_DEFAULT_TS_UNITS: f64 = 1e6;
