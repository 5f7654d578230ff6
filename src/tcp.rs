use crate::error::{check_bits, Error, Result};

use pnet_packet::tcp::{self, MutableTcpPacket, TcpPacket};
use std::net::Ipv4Addr;

pub const TCP_MIN_HEADER_LEN: usize = 20;

/// The nine TCP control bits. NS is carried by the low bit of byte 12, the
/// others by byte 13.
#[allow(non_snake_case)]
pub mod TcpFlags {
    use pnet_packet::tcp::TcpFlags as Wire;

    pub const NS: u16 = 0b1_0000_0000;
    pub const CWR: u16 = Wire::CWR as u16;
    pub const ECE: u16 = Wire::ECE as u16;
    pub const URG: u16 = Wire::URG as u16;
    pub const ACK: u16 = Wire::ACK as u16;
    pub const PSH: u16 = Wire::PSH as u16;
    pub const RST: u16 = Wire::RST as u16;
    pub const SYN: u16 = Wire::SYN as u16;
    pub const FIN: u16 = Wire::FIN as u16;
}

/// TCP header fields, options included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    /// In 32-bit words
    pub data_offset: u8,
    /// The three reserved bits
    pub reserved: u8,
    /// Nine bits, see `TcpFlags`
    pub flags: u16,
    pub window: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
    pub options: Vec<u8>,
}

impl TcpHeader {
    /// Encoded length, in bytes
    pub fn encoded_len(&self) -> usize {
        TCP_MIN_HEADER_LEN + self.options.len()
    }

    fn check(&self) -> Result<()> {
        check_bits("tcp reserved", self.reserved as u64, 3, "0..=7")?;
        check_bits("tcp flags", self.flags as u64, 9, "0..=511")?;
        if !(5..=15).contains(&self.data_offset) {
            return Err(Error::encoding(
                "tcp data_offset",
                self.data_offset as u64,
                "5..=15",
            ));
        }
        if self.options.len() % 4 != 0 || self.options.len() > 40 {
            return Err(Error::encoding(
                "tcp options length",
                self.options.len() as u64,
                "multiple of 4 in 0..=40",
            ));
        }
        if self.data_offset as usize * 4 != self.encoded_len() {
            return Err(Error::encoding(
                "tcp data_offset",
                self.data_offset as u64,
                "5 + options length in words",
            ));
        }
        Ok(())
    }
}

/// Write the TCP header at the beginning of `packet`. Anything after the
/// header is left untouched.
/// Returns the number of bytes written.
pub fn write(packet: &mut [u8], header: &TcpHeader) -> Result<usize> {
    header.check()?;
    let len = header.encoded_len();
    if packet.len() < len {
        return Err(Error::truncated("tcp", len, packet.len()));
    }
    {
        let mut tcp_packet = MutableTcpPacket::new(&mut packet[..len])
            .ok_or_else(|| Error::truncated("tcp", TCP_MIN_HEADER_LEN, len))?;
        tcp_packet.set_source(header.source_port);
        tcp_packet.set_destination(header.destination_port);
        tcp_packet.set_sequence(header.sequence);
        tcp_packet.set_acknowledgement(header.acknowledgement);
        tcp_packet.set_data_offset(header.data_offset);
        // reserved bits, then NS, share the low nibble of byte 12
        tcp_packet.set_reserved((header.reserved << 1) | (header.flags >> 8) as u8);
        tcp_packet.set_flags((header.flags & 0xff) as u8);
        tcp_packet.set_window(header.window);
        tcp_packet.set_checksum(header.checksum);
        tcp_packet.set_urgent_ptr(header.urgent_ptr);
    }
    packet[TCP_MIN_HEADER_LEN..len].copy_from_slice(&header.options);
    Ok(len)
}

pub fn encode(header: &TcpHeader) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; header.encoded_len()];
    write(&mut buf, header)?;
    Ok(buf)
}

pub fn decode(data: &[u8]) -> Result<TcpHeader> {
    let tcp_packet = TcpPacket::new(data)
        .ok_or_else(|| Error::truncated("tcp", TCP_MIN_HEADER_LEN, data.len()))?;
    let data_offset = tcp_packet.get_data_offset();
    let len = data_offset as usize * 4;
    if len < TCP_MIN_HEADER_LEN {
        return Err(Error::InvalidFormat(format!(
            "tcp data offset of {data_offset} words"
        )));
    }
    if data.len() < len {
        return Err(Error::truncated("tcp", len, data.len()));
    }
    let low_nibble = tcp_packet.get_reserved();
    Ok(TcpHeader {
        source_port: tcp_packet.get_source(),
        destination_port: tcp_packet.get_destination(),
        sequence: tcp_packet.get_sequence(),
        acknowledgement: tcp_packet.get_acknowledgement(),
        data_offset,
        reserved: low_nibble >> 1,
        flags: (((low_nibble & 1) as u16) << 8) | tcp_packet.get_flags() as u16,
        window: tcp_packet.get_window(),
        checksum: tcp_packet.get_checksum(),
        urgent_ptr: tcp_packet.get_urgent_ptr(),
        options: data[TCP_MIN_HEADER_LEN..len].to_vec(),
    })
}

/// Compute the checksum of an encoded segment (header and payload) with its
/// IPv4 pseudo-header
pub fn checksum(segment: &[u8], source: &Ipv4Addr, destination: &Ipv4Addr) -> Result<u16> {
    let tcp_packet = TcpPacket::new(segment)
        .ok_or_else(|| Error::truncated("tcp", TCP_MIN_HEADER_LEN, segment.len()))?;
    Ok(tcp::ipv4_checksum(&tcp_packet, source, destination))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSS_SACK_OPTIONS: [u8; 8] = [0x02, 0x04, 0x05, 0xb4, 0x01, 0x01, 0x04, 0x02];

    fn syn(data_offset: u8, options: Vec<u8>) -> TcpHeader {
        TcpHeader {
            source_port: 3372,
            destination_port: 80,
            sequence: 0x38af_fe13,
            acknowledgement: 0,
            data_offset,
            reserved: 0,
            flags: TcpFlags::SYN,
            window: 8760,
            checksum: 0xc30c,
            urgent_ptr: 0,
            options,
        }
    }

    #[test]
    fn syn_flag_byte_layout() {
        let bytes = encode(&syn(5, vec![])).unwrap();
        assert_eq!(bytes[12], 0x50);
        assert_eq!(bytes[13], 0x02);
    }

    #[test]
    fn reference_segment() {
        let bytes = encode(&syn(7, MSS_SACK_OPTIONS.to_vec())).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x0d, 0x2c, 0x00, 0x50, 0x38, 0xaf, 0xfe, 0x13, 0, 0, 0, 0, 0x70, 0x02, 0x22, 0x38,
                0xc3, 0x0c, 0, 0, 0x02, 0x04, 0x05, 0xb4, 0x01, 0x01, 0x04, 0x02
            ]
        );
    }

    #[test]
    fn ns_and_reserved_bits() {
        let mut h = syn(5, vec![]);
        h.flags = TcpFlags::NS | TcpFlags::CWR | TcpFlags::FIN;
        h.reserved = 0b101;
        let bytes = encode(&h).unwrap();
        assert_eq!(bytes[12], 0x50 | 0b1010 | 1);
        assert_eq!(bytes[13], 0x81);
        assert_eq!(decode(&bytes).unwrap(), h);
    }

    #[test]
    fn round_trip_boundaries() {
        let h = TcpHeader {
            source_port: u16::MAX,
            destination_port: 0,
            sequence: u32::MAX,
            acknowledgement: u32::MAX,
            data_offset: 15,
            reserved: 7,
            flags: 0x1ff,
            window: u16::MAX,
            checksum: u16::MAX,
            urgent_ptr: u16::MAX,
            options: vec![0x01; 40],
        };
        assert_eq!(decode(&encode(&h).unwrap()).unwrap(), h);
    }

    #[test]
    fn range_checks() {
        let mut h = syn(5, vec![]);
        h.flags = 0x200;
        assert!(matches!(
            encode(&h),
            Err(Error::Encoding { field: "tcp flags", value: 512, .. })
        ));
        let mut h = syn(5, vec![]);
        h.reserved = 8;
        assert!(matches!(
            encode(&h),
            Err(Error::Encoding { field: "tcp reserved", .. })
        ));
        assert!(matches!(
            encode(&syn(4, vec![])),
            Err(Error::Encoding { field: "tcp data_offset", .. })
        ));
        assert!(matches!(
            encode(&syn(7, vec![])),
            Err(Error::Encoding { field: "tcp data_offset", .. })
        ));
    }

    #[test]
    fn checksum_over_segment() {
        let mut h = syn(7, MSS_SACK_OPTIONS.to_vec());
        h.checksum = 0;
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(93, 184, 216, 34);
        let mut bytes = encode(&h).unwrap();
        let sum = checksum(&bytes, &src, &dst).unwrap();
        bytes[16..18].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(checksum(&bytes, &src, &dst).unwrap(), sum);
        assert!(checksum(&bytes[..10], &src, &dst).is_err());
    }
}
