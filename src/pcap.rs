//! pcap container headers.
//!
//! A pcap file is one 24-byte global header followed by (16-byte record header,
//! packet bytes) pairs. Every field of the container is written in a single
//! byte order, announced by the way the magic number reads back. Only the
//! microsecond-resolution magic is produced.
//!
//! Useful resources:
//! * https://wiki.wireshark.org/Development/LibpcapFileFormat
//! * https://www.ietf.org/archive/id/draft-gharris-opsawg-pcap-01.html

use crate::error::{Error, Result};

pub const MAGIC: u32 = 0xa1b2_c3d4;
pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;
pub const VERSION_MAJOR: u16 = 2;
pub const VERSION_MINOR: u16 = 4;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const DEFAULT_SNAPLEN: u32 = 65535;
pub const MICROS_PER_SECOND: u32 = 1_000_000;

/// Byte order of the container fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine we run on
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    fn put_u16(self, buf: &mut [u8], v: u16) {
        match self {
            Endianness::Little => buf.copy_from_slice(&v.to_le_bytes()),
            Endianness::Big => buf.copy_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_u32(self, buf: &mut [u8], v: u32) {
        match self {
            Endianness::Little => buf.copy_from_slice(&v.to_le_bytes()),
            Endianness::Big => buf.copy_from_slice(&v.to_be_bytes()),
        }
    }

    fn get_u16(self, buf: &[u8]) -> u16 {
        let bytes = [buf[0], buf[1]];
        match self {
            Endianness::Little => u16::from_le_bytes(bytes),
            Endianness::Big => u16::from_be_bytes(bytes),
        }
    }

    fn get_u32(self, buf: &[u8]) -> u32 {
        let bytes = [buf[0], buf[1], buf[2], buf[3]];
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// The global header, written once at the beginning of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    pub endianness: Endianness,
    pub version_major: u16,
    pub version_minor: u16,
    /// GMT to local correction, in seconds
    pub gmt_offset: i32,
    pub ts_accuracy: u32,
    /// Maximum number of bytes captured per packet
    pub snaplen: u32,
    pub link_type: u32,
}

impl Default for GlobalHeader {
    fn default() -> Self {
        GlobalHeader {
            endianness: Endianness::native(),
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            gmt_offset: 0,
            ts_accuracy: 0,
            snaplen: DEFAULT_SNAPLEN,
            link_type: LINKTYPE_ETHERNET,
        }
    }
}

/// The header preceding each packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub ts_seconds: u64,
    pub ts_micros: u32,
    pub included_len: u32,
    pub original_len: u32,
}

pub fn encode_global_header(header: &GlobalHeader) -> [u8; GLOBAL_HEADER_LEN] {
    let e = header.endianness;
    let mut buf = [0u8; GLOBAL_HEADER_LEN];
    e.put_u32(&mut buf[0..4], MAGIC);
    e.put_u16(&mut buf[4..6], header.version_major);
    e.put_u16(&mut buf[6..8], header.version_minor);
    e.put_u32(&mut buf[8..12], header.gmt_offset as u32);
    e.put_u32(&mut buf[12..16], header.ts_accuracy);
    e.put_u32(&mut buf[16..20], header.snaplen);
    e.put_u32(&mut buf[20..24], header.link_type);
    buf
}

/// Decode a global header. The byte order is detected from the magic number.
pub fn decode_global_header(data: &[u8]) -> Result<GlobalHeader> {
    if data.len() < GLOBAL_HEADER_LEN {
        return Err(Error::truncated("pcap global header", GLOBAL_HEADER_LEN, data.len()));
    }
    let endianness = if data[0..4] == MAGIC.to_le_bytes() {
        Endianness::Little
    } else if data[0..4] == MAGIC.to_be_bytes() {
        Endianness::Big
    } else {
        return Err(Error::InvalidFormat(format!(
            "unknown pcap magic number {:02x?}",
            &data[0..4]
        )));
    };
    let e = endianness;
    Ok(GlobalHeader {
        endianness,
        version_major: e.get_u16(&data[4..6]),
        version_minor: e.get_u16(&data[6..8]),
        gmt_offset: e.get_u32(&data[8..12]) as i32,
        ts_accuracy: e.get_u32(&data[12..16]),
        snaplen: e.get_u32(&data[16..20]),
        link_type: e.get_u32(&data[20..24]),
    })
}

/// Encode a record header.
/// The timestamp must be representable: seconds on 32 bits and microseconds
/// strictly below one second.
pub fn encode_record_header(
    header: &RecordHeader,
    endianness: Endianness,
) -> Result<[u8; RECORD_HEADER_LEN]> {
    if header.ts_seconds > u32::MAX as u64 {
        return Err(Error::encoding(
            "record ts_seconds",
            header.ts_seconds,
            "0..=4294967295",
        ));
    }
    if header.ts_micros >= MICROS_PER_SECOND {
        return Err(Error::encoding(
            "record ts_micros",
            header.ts_micros as u64,
            "0..=999999",
        ));
    }
    if header.included_len > header.original_len {
        return Err(Error::encoding(
            "record included_len",
            header.included_len as u64,
            "0..=original_len",
        ));
    }
    let mut buf = [0u8; RECORD_HEADER_LEN];
    endianness.put_u32(&mut buf[0..4], header.ts_seconds as u32);
    endianness.put_u32(&mut buf[4..8], header.ts_micros);
    endianness.put_u32(&mut buf[8..12], header.included_len);
    endianness.put_u32(&mut buf[12..16], header.original_len);
    Ok(buf)
}

pub fn decode_record_header(data: &[u8], endianness: Endianness) -> Result<RecordHeader> {
    if data.len() < RECORD_HEADER_LEN {
        return Err(Error::truncated("pcap record header", RECORD_HEADER_LEN, data.len()));
    }
    Ok(RecordHeader {
        ts_seconds: endianness.get_u32(&data[0..4]) as u64,
        ts_micros: endianness.get_u32(&data[4..8]),
        included_len: endianness.get_u32(&data[8..12]),
        original_len: endianness.get_u32(&data[12..16]),
    })
}
