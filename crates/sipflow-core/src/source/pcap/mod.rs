//! PCAP/PCAPNG file source.
//!
//! - `layout`: magic numbers and reader buffer size
//! - `reader`: format detection and timestamp helpers
//! - `parser`: block iteration over `pcap-parser` readers

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
