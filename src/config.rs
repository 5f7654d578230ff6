use crate::builder::CaptureSettings;
use crate::error::{narrow, Error, Result};
use crate::ethernet::EtherTypeOrder;
use crate::hosts::DEFAULT_INTERNAL_PREFIX;
use crate::packet::{ChecksumMode, PacketTemplate};
use crate::pcap::{Endianness, GlobalHeader};

use chrono::FixedOffset;
use serde::Deserialize;

pub const DEFAULT_INTERNAL_HOSTS: usize = 50;
pub const DEFAULT_EXTERNAL_HOSTS: usize = 200;

/// Byte order of the pcap container
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerOrder {
    /// The byte order of the generating machine
    #[default]
    Native,
    Little,
    Big,
}

impl From<ContainerOrder> for Endianness {
    fn from(o: ContainerOrder) -> Self {
        match o {
            ContainerOrder::Native => Endianness::native(),
            ContainerOrder::Little => Endianness::Little,
            ContainerOrder::Big => Endianness::Big,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HostsSection {
    pub internal: Option<usize>,
    pub external: Option<usize>,
    pub internal_prefix: Option<[u8; 2]>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaptureSection {
    pub snaplen: Option<u32>,
    pub link_type: Option<u32>,
    pub endianness: Option<ContainerOrder>,
    pub gmt_offset: Option<i32>,
    pub ether_type_order: Option<EtherTypeOrder>,
    pub checksum: Option<ChecksumMode>,
    /// Offset used to find the local hour, such as "+02:00". The local time
    /// zone is used if it is not set.
    pub utc_offset: Option<String>,
}

/// Per-packet field overrides. Values are read as wide integers and checked
/// against their wire width.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PacketSection {
    pub ether_type: Option<u64>,
    pub dscp: Option<u64>,
    pub ecn: Option<u64>,
    pub identification: Option<u64>,
    pub ip_flags: Option<u64>,
    pub fragment_offset: Option<u64>,
    pub ttl: Option<u64>,
    pub protocol: Option<u64>,
    pub ip_checksum: Option<u64>,
    pub ip_options: Option<Vec<u8>>,
    pub src_port: Option<u64>,
    pub dst_port: Option<u64>,
    pub sequence: Option<u64>,
    pub acknowledgement: Option<u64>,
    pub tcp_reserved: Option<u64>,
    pub tcp_flags: Option<u64>,
    pub window: Option<u64>,
    pub tcp_checksum: Option<u64>,
    pub urgent_ptr: Option<u64>,
    pub tcp_options: Option<Vec<u8>>,
    pub payload_len: Option<u64>,
}

fn set<T: TryFrom<u64>>(
    target: &mut T,
    value: Option<u64>,
    field: &'static str,
    valid_range: &'static str,
) -> Result<()> {
    if let Some(v) = value {
        *target = narrow(field, v, valid_range)?;
    }
    Ok(())
}

impl PacketSection {
    /// Apply the overrides on top of `template`
    pub fn apply(&self, mut t: PacketTemplate) -> Result<PacketTemplate> {
        set(&mut t.ether_type, self.ether_type, "ether_type", "0..=65535")?;
        set(&mut t.dscp, self.dscp, "dscp", "0..=63")?;
        set(&mut t.ecn, self.ecn, "ecn", "0..=3")?;
        set(&mut t.identification, self.identification, "identification", "0..=65535")?;
        set(&mut t.ip_flags, self.ip_flags, "ip_flags", "0..=3")?;
        set(&mut t.fragment_offset, self.fragment_offset, "fragment_offset", "0..=8191")?;
        set(&mut t.ttl, self.ttl, "ttl", "0..=255")?;
        set(&mut t.protocol, self.protocol, "protocol", "0..=255")?;
        set(&mut t.ip_checksum, self.ip_checksum, "ip_checksum", "0..=65535")?;
        set(&mut t.src_port, self.src_port, "src_port", "0..=65535")?;
        set(&mut t.dst_port, self.dst_port, "dst_port", "0..=65535")?;
        set(&mut t.sequence, self.sequence, "sequence", "0..=4294967295")?;
        set(&mut t.acknowledgement, self.acknowledgement, "acknowledgement", "0..=4294967295")?;
        set(&mut t.tcp_reserved, self.tcp_reserved, "tcp_reserved", "0..=7")?;
        set(&mut t.tcp_flags, self.tcp_flags, "tcp_flags", "0..=511")?;
        set(&mut t.window, self.window, "window", "0..=65535")?;
        set(&mut t.tcp_checksum, self.tcp_checksum, "tcp_checksum", "0..=65535")?;
        set(&mut t.urgent_ptr, self.urgent_ptr, "urgent_ptr", "0..=65535")?;
        set(&mut t.payload_len, self.payload_len, "payload_len", "0..=65475")?;
        if let Some(options) = &self.ip_options {
            t.ip_options = options.clone();
        }
        if let Some(options) = &self.tcp_options {
            t.tcp_options = options.clone();
        }
        // sub-byte fields and lengths are checked by the encoders
        t.validate()?;
        Ok(t)
    }
}

/// The configuration file. Every section and field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub hosts: HostsSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub packet: PacketSection,
}

impl Config {
    pub fn internal_hosts(&self) -> usize {
        self.hosts.internal.unwrap_or(DEFAULT_INTERNAL_HOSTS)
    }

    pub fn external_hosts(&self) -> usize {
        self.hosts.external.unwrap_or(DEFAULT_EXTERNAL_HOSTS)
    }

    pub fn internal_prefix(&self) -> [u8; 2] {
        self.hosts.internal_prefix.unwrap_or(DEFAULT_INTERNAL_PREFIX)
    }

    /// Container and packet parameters, checked
    pub fn settings(&self) -> Result<CaptureSettings> {
        let c = &self.capture;
        let default_header = GlobalHeader::default();
        let header = GlobalHeader {
            endianness: c.endianness.unwrap_or_default().into(),
            gmt_offset: c.gmt_offset.unwrap_or(default_header.gmt_offset),
            snaplen: c.snaplen.unwrap_or(default_header.snaplen),
            link_type: c.link_type.unwrap_or(default_header.link_type),
            ..default_header
        };
        let template = PacketTemplate {
            ether_type_order: c.ether_type_order.unwrap_or_default(),
            checksum: c.checksum.unwrap_or_default(),
            ..Default::default()
        };
        Ok(CaptureSettings {
            header,
            template: self.packet.apply(template)?,
        })
    }

    /// The configured UTC offset, if any
    pub fn utc_offset(&self) -> Result<Option<FixedOffset>> {
        self.capture
            .utc_offset
            .as_deref()
            .map(|s| {
                s.parse::<FixedOffset>().map_err(|e| {
                    Error::Configuration(format!("cannot parse the UTC offset \"{s}\": {e}"))
                })
            })
            .transpose()
    }
}

/// Parse a TOML configuration
pub fn import_config(config: &str) -> Result<Config> {
    let config: Config = toml::from_str(config)?;
    log::info!("Configuration loaded");
    log::debug!("{config:?}");
    Ok(config)
}
