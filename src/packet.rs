use crate::error::{narrow, Result};
use crate::ethernet::{self, EtherTypeOrder, EthernetHeader, ETHERNET_HEADER_LEN, ETHERTYPE_IPV4};
use crate::ipv4::{self, Ipv4Header, FLAG_DF, IPV4_MIN_HEADER_LEN, IPV4_VERSION, PROTOCOL_TCP};
use crate::structs::*;
use crate::tcp::{self, TcpFlags, TcpHeader, TCP_MIN_HEADER_LEN};

use pnet::util::MacAddr;
use serde::Deserialize;
use std::net::Ipv4Addr;

/// Byte used to fill the synthetic payload
pub const PAYLOAD_FILL: u8 = 0xff;

/// How the IPv4 and TCP checksums are filled
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumMode {
    /// Pass the template values through, whatever the packet content
    #[default]
    #[serde(alias = "none")]
    Placeholder,
    /// Compute them from the encoded headers and the addresses
    Computed,
}

/// Per-packet synthetic metadata. Only the addresses change from one packet
/// to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketTemplate {
    pub ether_type: u16,
    pub ether_type_order: EtherTypeOrder,
    pub dscp: u8,
    pub ecn: u8,
    pub identification: u16,
    pub ip_flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub ip_checksum: u16,
    pub ip_options: Vec<u8>,
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub tcp_reserved: u8,
    pub tcp_flags: u16,
    pub window: u16,
    pub tcp_checksum: u16,
    pub urgent_ptr: u16,
    pub tcp_options: Vec<u8>,
    /// Length of the synthetic payload after the TCP header
    pub payload_len: usize,
    pub checksum: ChecksumMode,
}

impl Default for PacketTemplate {
    /// A TCP SYN with MSS and SACK-permitted options, sent from a Windows-like
    /// stack
    fn default() -> Self {
        PacketTemplate {
            ether_type: ETHERTYPE_IPV4,
            ether_type_order: EtherTypeOrder::Network,
            dscp: 0,
            ecn: 0,
            identification: 0x0f41,
            ip_flags: FLAG_DF,
            fragment_offset: 0,
            ttl: 128,
            protocol: PROTOCOL_TCP,
            ip_checksum: 0x91eb,
            ip_options: vec![],
            src_port: 3372,
            dst_port: 80,
            sequence: 0x38af_fe13,
            acknowledgement: 0,
            tcp_reserved: 0,
            tcp_flags: TcpFlags::SYN,
            window: 8760,
            tcp_checksum: 0xc30c,
            urgent_ptr: 0,
            // MSS 1460, NOP, NOP, SACK permitted
            tcp_options: vec![0x02, 0x04, 0x05, 0xb4, 0x01, 0x01, 0x04, 0x02],
            payload_len: 0,
            checksum: ChecksumMode::Placeholder,
        }
    }
}

/// Header length field in 32-bit words. An invalid length is left for the
/// encoder to reject.
fn words(len: usize) -> u8 {
    u8::try_from(len / 4).unwrap_or(u8::MAX)
}

impl PacketTemplate {
    fn ip_header_len(&self) -> usize {
        IPV4_MIN_HEADER_LEN + self.ip_options.len()
    }

    fn tcp_header_len(&self) -> usize {
        TCP_MIN_HEADER_LEN + self.tcp_options.len()
    }

    /// Number of bytes of one frame, from the Ethernet header to the end of
    /// the payload
    pub fn frame_len(&self) -> usize {
        ETHERNET_HEADER_LEN + self.ip_header_len() + self.tcp_header_len() + self.payload_len
    }

    fn ipv4_header(&self, src: &Host, dst: &Host) -> Result<Ipv4Header> {
        let total_length = self.ip_header_len() + self.tcp_header_len() + self.payload_len;
        Ok(Ipv4Header {
            version: IPV4_VERSION,
            header_length: words(self.ip_header_len()),
            dscp: self.dscp,
            ecn: self.ecn,
            total_length: narrow("ipv4 total_length", total_length as u64, "20..=65535")?,
            identification: self.identification,
            flags: self.ip_flags,
            fragment_offset: self.fragment_offset,
            ttl: self.ttl,
            protocol: self.protocol,
            checksum: self.ip_checksum,
            source: src.ip,
            destination: dst.ip,
            options: self.ip_options.clone(),
        })
    }

    fn tcp_header(&self) -> TcpHeader {
        TcpHeader {
            source_port: self.src_port,
            destination_port: self.dst_port,
            sequence: self.sequence,
            acknowledgement: self.acknowledgement,
            data_offset: words(self.tcp_header_len()),
            reserved: self.tcp_reserved,
            flags: self.tcp_flags,
            window: self.window,
            checksum: self.tcp_checksum,
            urgent_ptr: self.urgent_ptr,
            options: self.tcp_options.clone(),
        }
    }

    /// Encode the Ethernet, IPv4 and TCP layers of one packet from `src` to
    /// `dst`, followed by the synthetic payload
    pub fn encode_frame(&self, src: &Host, dst: &Host) -> Result<Vec<u8>> {
        let mut packet = vec![0u8; self.frame_len()];
        let ip_start = ETHERNET_HEADER_LEN;
        let tcp_start = ip_start + self.ip_header_len();
        let payload_start = tcp_start + self.tcp_header_len();

        ethernet::write(
            &mut packet,
            &EthernetHeader {
                destination: dst.mac,
                source: src.mac,
                ether_type: self.ether_type,
            },
            self.ether_type_order,
        )?;

        packet[payload_start..].fill(PAYLOAD_FILL);

        let mut tcp_header = self.tcp_header();
        tcp::write(&mut packet[tcp_start..], &tcp_header)?;
        if self.checksum == ChecksumMode::Computed {
            tcp_header.checksum = tcp::checksum(&packet[tcp_start..], &src.ip, &dst.ip)?;
            tcp::write(&mut packet[tcp_start..], &tcp_header)?;
        }

        let mut ip_header = self.ipv4_header(src, dst)?;
        ipv4::write(&mut packet[ip_start..], &ip_header)?;
        if self.checksum == ChecksumMode::Computed {
            ip_header.checksum = ipv4::checksum(&packet[ip_start..tcp_start])?;
            ipv4::write(&mut packet[ip_start..], &ip_header)?;
        }

        Ok(packet)
    }

    /// Check that every field fits its wire format, before any file is built
    pub fn validate(&self) -> Result<()> {
        let host = Host {
            mac: MacAddr::zero(),
            ip: Ipv4Addr::UNSPECIFIED,
        };
        self.encode_frame(&host, &host).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn hosts() -> (Host, Host) {
        (
            Host {
                mac: MacAddr::new(0x00, 0x00, 0x01, 0x00, 0x00, 0x00),
                ip: Ipv4Addr::new(145, 254, 160, 237),
            },
            Host {
                mac: MacAddr::new(0xfe, 0xff, 0x20, 0x00, 0x01, 0x00),
                ip: Ipv4Addr::new(65, 208, 228, 223),
            },
        )
    }

    #[test]
    fn reference_frame() {
        let (src, dst) = hosts();
        let template = PacketTemplate::default();
        assert_eq!(template.frame_len(), 62);
        let frame = template.encode_frame(&src, &dst).unwrap();
        assert_eq!(frame.len(), 62);
        assert_eq!(&frame[0..6], &[0xfe, 0xff, 0x20, 0x00, 0x01, 0x00]);
        assert_eq!(&frame[6..12], &[0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&frame[12..14], &[0x08, 0x00]);

        let ip = ipv4::decode(&frame[14..]).unwrap();
        assert_eq!(ip.total_length, 48);
        assert_eq!(ip.header_length, 5);
        assert_eq!(ip.ttl, 128);
        assert_eq!(ip.flags, FLAG_DF);
        assert_eq!(ip.checksum, 0x91eb);
        assert_eq!(ip.source, src.ip);
        assert_eq!(ip.destination, dst.ip);

        let tcp = tcp::decode(&frame[34..]).unwrap();
        assert_eq!(tcp.data_offset, 7);
        assert_eq!(tcp.flags, TcpFlags::SYN);
        assert_eq!(tcp.window, 8760);
        assert_eq!(tcp.checksum, 0xc30c);
        assert_eq!(tcp.options.len(), 8);
    }

    #[test]
    fn payload_tail_counts_in_lengths() {
        let (src, dst) = hosts();
        let template = PacketTemplate {
            payload_len: 16,
            ..Default::default()
        };
        let frame = template.encode_frame(&src, &dst).unwrap();
        assert_eq!(frame.len(), 78);
        assert!(frame[62..].iter().all(|b| *b == PAYLOAD_FILL));
        assert_eq!(ipv4::decode(&frame[14..]).unwrap().total_length, 64);
    }

    #[test]
    fn computed_checksums() {
        let (src, dst) = hosts();
        let template = PacketTemplate {
            checksum: ChecksumMode::Computed,
            payload_len: 5,
            ..Default::default()
        };
        let frame = template.encode_frame(&src, &dst).unwrap();
        let ip = ipv4::decode(&frame[14..]).unwrap();
        assert_eq!(ip.checksum, ipv4::checksum(&frame[14..34]).unwrap());
        let tcp = tcp::decode(&frame[34..]).unwrap();
        assert_eq!(tcp.checksum, tcp::checksum(&frame[34..], &src.ip, &dst.ip).unwrap());
        assert_ne!(ip.checksum, 0x91eb);
    }

    #[test]
    fn invalid_template_fails_to_encode() {
        let (src, dst) = hosts();
        let template = PacketTemplate {
            ip_flags: 0b100,
            ..Default::default()
        };
        assert!(matches!(
            template.encode_frame(&src, &dst),
            Err(Error::Encoding { field: "ipv4 flags", .. })
        ));
        assert!(template.validate().is_err());
        assert!(PacketTemplate::default().validate().is_ok());
        let template = PacketTemplate {
            tcp_options: vec![1, 1],
            ..Default::default()
        };
        assert!(template.encode_frame(&src, &dst).is_err());
        let template = PacketTemplate {
            payload_len: 70_000,
            ..Default::default()
        };
        assert!(matches!(
            template.encode_frame(&src, &dst),
            Err(Error::Encoding { field: "ipv4 total_length", .. })
        ));
    }
}
