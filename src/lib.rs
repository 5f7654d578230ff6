pub mod error;
pub mod structs;

pub mod ethernet;
pub mod ipv4;
pub mod pcap;
pub mod tcp;

pub mod hosts;
pub mod packet;
pub mod temporal;

/// Capture file assembly
pub mod builder;
/// Atomic commit of capture files to storage
pub mod export;
/// Planning of file series
pub mod schedule;

pub mod config;
pub mod stats;
