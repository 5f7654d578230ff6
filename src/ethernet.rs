use crate::error::{Error, Result};

use pnet::util::MacAddr;
use pnet_packet::ethernet::{EtherType, EthernetPacket, MutableEthernetPacket};
use serde::Deserialize;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Byte order used for the ether-type field.
///
/// Readers expect network order. `Little` writes the value least significant
/// byte first, so that `0x0008` in little order yields the same bytes as
/// `0x0800` in network order.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EtherTypeOrder {
    #[default]
    Network,
    Little,
}

impl EtherTypeOrder {
    fn to_wire(self, value: u16) -> u16 {
        match self {
            EtherTypeOrder::Network => value,
            EtherTypeOrder::Little => value.swap_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ether_type: u16,
}

/// Write the Ethernet header at the beginning of `packet`
pub fn write(packet: &mut [u8], header: &EthernetHeader, order: EtherTypeOrder) -> Result<()> {
    let len = packet.len();
    let mut eth_packet = MutableEthernetPacket::new(packet)
        .ok_or_else(|| Error::truncated("ethernet", ETHERNET_HEADER_LEN, len))?;
    eth_packet.set_destination(header.destination);
    eth_packet.set_source(header.source);
    eth_packet.set_ethertype(EtherType::new(order.to_wire(header.ether_type)));
    Ok(())
}

pub fn encode(header: &EthernetHeader, order: EtherTypeOrder) -> Result<[u8; ETHERNET_HEADER_LEN]> {
    let mut buf = [0u8; ETHERNET_HEADER_LEN];
    write(&mut buf, header, order)?;
    Ok(buf)
}

pub fn decode(data: &[u8], order: EtherTypeOrder) -> Result<EthernetHeader> {
    let eth_packet = EthernetPacket::new(data)
        .ok_or_else(|| Error::truncated("ethernet", ETHERNET_HEADER_LEN, data.len()))?;
    Ok(EthernetHeader {
        destination: eth_packet.get_destination(),
        source: eth_packet.get_source(),
        ether_type: order.to_wire(eth_packet.get_ethertype().0),
    })
}
