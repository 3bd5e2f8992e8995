use std::fs::File;
use std::path::Path;

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader};

use crate::source::{FrameEvent, FrameSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    CaptureFormat, detect_format, legacy_ts_to_seconds, linktype_for_interface,
    pcapng_ts_to_seconds,
};

/// Frames read from a PCAP or PCAPNG file.
pub struct PcapFileSource {
    inner: PcapReader,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Linktype,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self {
            inner: create_reader(file)?,
        })
    }
}

impl FrameSource for PcapFileSource {
    fn next_frame(&mut self) -> Result<Option<FrameEvent>, SourceError> {
        Ok(self.inner.next_frame()?)
    }
}

fn create_reader(mut file: File) -> Result<PcapReader, PcapSourceError> {
    match detect_format(&mut file)? {
        CaptureFormat::PcapNg => {
            let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcapng reader init", e))?;
            Ok(PcapReader::Ng {
                reader,
                linktypes: Vec::new(),
            })
        }
        CaptureFormat::Legacy => {
            let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
                .map_err(|e| PcapSourceError::pcap("pcap reader init", e))?;
            Ok(PcapReader::Legacy {
                reader,
                linktype: Linktype::ETHERNET,
            })
        }
    }
}

impl PcapReader {
    fn next_frame(&mut self) -> Result<Option<FrameEvent>, PcapSourceError> {
        loop {
            let step = match self {
                PcapReader::Legacy { reader, linktype } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = legacy_block(block, linktype);
                        reader.consume(offset);
                        Step::Block(frame)
                    }
                    Err(err) => Step::from_error(err, "pcap reader")?,
                },
                PcapReader::Ng { reader, linktypes } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = ng_block(block, linktypes);
                        reader.consume(offset);
                        Step::Block(frame)
                    }
                    Err(err) => Step::from_error(err, "pcapng reader")?,
                },
            };
            match step {
                Step::Block(Some(frame)) => return Ok(Some(frame)),
                Step::Block(None) => {}
                Step::Eof => return Ok(None),
                Step::Refill => self.refill()?,
            }
        }
    }

    fn refill(&mut self) -> Result<(), PcapSourceError> {
        match self {
            PcapReader::Legacy { reader, .. } => reader
                .refill()
                .map_err(|e| PcapSourceError::pcap("pcap reader refill", e)),
            PcapReader::Ng { reader, .. } => reader
                .refill()
                .map_err(|e| PcapSourceError::pcap("pcapng reader refill", e)),
        }
    }
}

enum Step {
    Block(Option<FrameEvent>),
    Refill,
    Eof,
}

impl Step {
    fn from_error<I>(err: PcapError<I>, context: &'static str) -> Result<Self, PcapSourceError>
    where
        PcapError<I>: std::fmt::Display,
    {
        match err {
            PcapError::Eof => Ok(Step::Eof),
            PcapError::Incomplete(_) => Ok(Step::Refill),
            other => Err(PcapSourceError::pcap(context, other)),
        }
    }
}

fn legacy_block(block: PcapBlockOwned<'_>, linktype: &mut Linktype) -> Option<FrameEvent> {
    match block {
        PcapBlockOwned::LegacyHeader(header) => {
            *linktype = header.network;
            None
        }
        PcapBlockOwned::Legacy(packet) => Some(FrameEvent {
            ts: Some(legacy_ts_to_seconds(packet.ts_sec, packet.ts_usec)),
            linktype: *linktype,
            data: packet.data.to_vec(),
        }),
        _ => None,
    }
}

fn ng_block(block: PcapBlockOwned<'_>, linktypes: &mut Vec<Linktype>) -> Option<FrameEvent> {
    match block {
        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
            // Interface ids restart with every section.
            linktypes.clear();
            None
        }
        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
            linktypes.push(intf.linktype);
            None
        }
        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => Some(FrameEvent {
            ts: Some(pcapng_ts_to_seconds(packet.ts_high, packet.ts_low)),
            linktype: linktype_for_interface(linktypes, packet.if_id),
            data: packet.data.to_vec(),
        }),
        _ => None,
    }
}
