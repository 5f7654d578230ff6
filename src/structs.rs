use pnet::util::MacAddr;
use std::net::Ipv4Addr;

// Host structures

/// A traffic participant: one link address and one network address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

/// Which pool supplies the source of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound, // internal to external
    Inbound,  // external to internal
}

// Builder structures

/// What to generate: a time window and a size budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Unix time of the first packet, in seconds
    pub start: u64,
    /// Capture window, in seconds
    pub duration: u64,
    /// Upper bound on the file size, global header included
    pub max_size: u64,
}

/// A finished capture file, assembled in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub packet_count: u64,
}

impl Capture {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
