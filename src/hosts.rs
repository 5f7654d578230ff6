use crate::error::{Error, Result};
use crate::structs::*;

use pnet::util::MacAddr;
use rand_core::*;
use rand_distr::{Distribution, Uniform};
use std::net::Ipv4Addr;

/// Two first octets of every internal address, unless configured otherwise
pub const DEFAULT_INTERNAL_PREFIX: [u8; 2] = [10, 0];

/// The internal and external host populations of one generation run.
///
/// Addresses are drawn independently, so a pool may contain the same address
/// twice. Duplicates are valid traffic participants and are kept, so the
/// address distribution stays uniform.
#[derive(Debug, Clone)]
pub struct HostPool {
    internal: Vec<Host>,
    external: Vec<Host>,
}

fn random_mac(rng: &mut impl RngCore) -> MacAddr {
    let mut bytes = [0u8; 6];
    rng.fill_bytes(&mut bytes);
    MacAddr::new(bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
}

fn random_internal_ip(rng: &mut impl RngCore, prefix: [u8; 2]) -> Ipv4Addr {
    let mut bytes = [0u8; 2];
    rng.fill_bytes(&mut bytes);
    Ipv4Addr::new(prefix[0], prefix[1], bytes[0], bytes[1])
}

fn random_external_ip(rng: &mut impl RngCore) -> Ipv4Addr {
    let first_octet = Uniform::new_inclusive(1u8, 255u8).sample(rng);
    let mut bytes = [0u8; 3];
    rng.fill_bytes(&mut bytes);
    Ipv4Addr::new(first_octet, bytes[0], bytes[1], bytes[2])
}

impl HostPool {
    /// Create the pools with the default internal prefix
    pub fn new(internal_count: usize, external_count: usize, rng: &mut impl RngCore) -> Result<Self> {
        Self::with_prefix(internal_count, external_count, DEFAULT_INTERNAL_PREFIX, rng)
    }

    pub fn with_prefix(
        internal_count: usize,
        external_count: usize,
        internal_prefix: [u8; 2],
        rng: &mut impl RngCore,
    ) -> Result<Self> {
        if internal_count == 0 || external_count == 0 {
            return Err(Error::Configuration(format!(
                "host counts must be positive (internal: {internal_count}, external: {external_count})"
            )));
        }
        let internal = (0..internal_count)
            .map(|_| Host {
                mac: random_mac(rng),
                ip: random_internal_ip(rng, internal_prefix),
            })
            .collect();
        let external = (0..external_count)
            .map(|_| Host {
                mac: random_mac(rng),
                ip: random_external_ip(rng),
            })
            .collect();
        let pool = HostPool { internal, external };
        log::debug!(
            "Host pool: {} internal hosts in {}.{}.0.0/16, {} external hosts",
            internal_count,
            internal_prefix[0],
            internal_prefix[1],
            external_count
        );
        Ok(pool)
    }

    /// Use already known hosts. Pools may be empty, in which case picking a
    /// pair that needs them fails.
    pub fn from_hosts(internal: Vec<Host>, external: Vec<Host>) -> Self {
        HostPool { internal, external }
    }

    pub fn internal(&self) -> &[Host] {
        &self.internal
    }

    pub fn external(&self) -> &[Host] {
        &self.external
    }

    fn pick(pool: &[Host], name: &str, rng: &mut impl RngCore) -> Result<Host> {
        if pool.is_empty() {
            return Err(Error::Configuration(format!("the {name} host pool is empty")));
        }
        Ok(pool[Uniform::new(0, pool.len()).sample(rng)])
    }

    /// Randomly selects a source and a destination host.
    /// The direction tells which pool provides the source.
    pub fn pick_pair(&self, direction: Direction, rng: &mut impl RngCore) -> Result<(Host, Host)> {
        match direction {
            Direction::Outbound => Ok((
                Self::pick(&self.internal, "internal", rng)?,
                Self::pick(&self.external, "external", rng)?,
            )),
            Direction::Inbound => Ok((
                Self::pick(&self.external, "external", rng)?,
                Self::pick(&self.internal, "internal", rng)?,
            )),
        }
    }
}
