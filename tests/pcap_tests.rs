use hex_literal::hex;
use pcap_file::pcap::PcapReader;
use pcap_file::{DataLink, Endianness as PcapEndianness};
use rand_core::SeedableRng;
use rand_pcg::Pcg32;
use std::time::Duration;
use synthcap::builder::{CaptureFileBuilder, CaptureSettings};
use synthcap::config;
use synthcap::ethernet::{self, EtherTypeOrder};
use synthcap::hosts::HostPool;
use synthcap::ipv4;
use synthcap::pcap::{self, Endianness, GlobalHeader};
use synthcap::structs::*;
use synthcap::tcp::{self, TcpFlags};

const START: u64 = 1_714_555_800;

fn build(settings: CaptureSettings, duration: u64, max_size: u64, seed: u64) -> (Capture, HostPool) {
    let hosts = HostPool::new(8, 8, &mut Pcg32::seed_from_u64(seed)).unwrap();
    let capture = CaptureFileBuilder::new(settings)
        .build(
            &CaptureRequest {
                start: START,
                duration,
                max_size,
            },
            &hosts,
            &mut Pcg32::seed_from_u64(seed),
        )
        .unwrap();
    (capture, hosts)
}

#[test]
fn global_header_bytes() {
    let header = GlobalHeader {
        endianness: Endianness::Little,
        ..Default::default()
    };
    assert_eq!(
        pcap::encode_global_header(&header),
        hex!("d4c3b2a1 0200 0400 00000000 00000000 ffff0000 01000000")
    );
}

#[test]
fn readable_by_pcap_tools() {
    let (capture, hosts) = build(CaptureSettings::default(), 300, 100_000, 1);
    let mut reader = PcapReader::new(&capture.bytes[..]).unwrap();
    let header = reader.header();
    assert_eq!((header.version_major, header.version_minor), (2, 4));
    assert_eq!(header.snaplen, 65535);
    assert_eq!(header.datalink, DataLink::ETHERNET);

    let end = Duration::from_secs(START + 300);
    let mut previous = Duration::from_secs(START);
    let mut count = 0;
    while let Some(packet) = reader.next_packet() {
        let packet = packet.unwrap();
        assert!(packet.timestamp >= previous);
        assert!(packet.timestamp < end);
        previous = packet.timestamp;
        assert_eq!(packet.orig_len as usize, packet.data.len());

        let eth = ethernet::decode(&packet.data, EtherTypeOrder::Network).unwrap();
        assert_eq!(eth.ether_type, ethernet::ETHERTYPE_IPV4);
        let ip = ipv4::decode(&packet.data[14..]).unwrap();
        assert_eq!(ip.total_length as usize, packet.data.len() - 14);
        let internal = |addr| hosts.internal().iter().any(|h| h.ip == addr);
        let external = |addr| hosts.external().iter().any(|h| h.ip == addr);
        assert!(
            (internal(ip.source) && external(ip.destination))
                || (external(ip.source) && internal(ip.destination))
        );
        let segment = tcp::decode(&packet.data[34..]).unwrap();
        assert_eq!(segment.flags, TcpFlags::SYN);
        assert_eq!(segment.destination_port, 80);
        count += 1;
    }
    assert_eq!(count, capture.packet_count);
    assert!(count > 0);
    assert!(capture.len() <= 100_000);
}

#[test]
fn configured_container_and_checksums() {
    let config = config::import_config(
        r#"
        [capture]
        endianness = "big"
        checksum = "computed"
        [packet]
        payload_len = 6
        "#,
    )
    .unwrap();
    let (capture, _) = build(config.settings().unwrap(), 60, 5_000, 2);
    let mut reader = PcapReader::new(&capture.bytes[..]).unwrap();
    assert_eq!(reader.header().endianness, PcapEndianness::Big);
    while let Some(packet) = reader.next_packet() {
        let data = packet.unwrap().data.into_owned();
        assert_eq!(data.len(), 14 + 20 + 28 + 6);
        let ip = ipv4::decode(&data[14..]).unwrap();
        assert_eq!(ip.checksum, ipv4::checksum(&data[14..34]).unwrap());
        let segment = tcp::decode(&data[34..]).unwrap();
        assert_eq!(
            segment.checksum,
            tcp::checksum(&data[34..], &ip.source, &ip.destination).unwrap()
        );
    }
}
