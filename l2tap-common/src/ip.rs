//! Utilities for carving address space out of a collector network.
//!
//! A collector network (e.g. `10.100.0.0/16`) is split into disjoint subnets with a
//! [`SubnetAllocator`], one per tapped link. Each subnet then hands out its usable host
//! addresses in ascending order through a [`HostAllocator`].

use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net, Ipv4Subnets};

/// The prefix length of the subnets handed out for every tapped link.
pub const TAP_SUBNET_PREFIX: u8 = 24;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid network {input:?}: {source}")]
    InvalidNetwork {
        input: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("cannot split {network} into /{prefix} subnets")]
    InvalidPrefix { network: Ipv4Net, prefix: u8 },
    #[error("no /{prefix} subnets left in {network}")]
    SubnetsExhausted { network: Ipv4Net, prefix: u8 },
    #[error("no host addresses left in {subnet}")]
    HostsExhausted { subnet: Ipv4Net },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parses a CIDR block such as `10.100.0.0/16`. Host bits are cleared, so `10.100.3.7/16`
/// yields the same network.
pub fn parse_network(input: &str) -> Result<Ipv4Net> {
    input
        .trim()
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|source| Error::InvalidNetwork { input: input.to_owned(), source })
}

/// Number of usable host addresses in `subnet`. Network and broadcast addresses are excluded,
/// except for /31 and /32 which have none to spare.
pub fn host_capacity(subnet: Ipv4Net) -> u64 {
    let size = 1u64 << (32 - u32::from(subnet.prefix_len()));
    if subnet.prefix_len() >= 31 {
        size
    } else {
        size - 2
    }
}

/// Lazily partitions a network into disjoint subnets of a fixed prefix length, in ascending
/// address order.
#[derive(Debug, Clone)]
pub struct SubnetAllocator {
    network: Ipv4Net,
    prefix: u8,
    subnets: Ipv4Subnets,
}

impl SubnetAllocator {
    pub fn new(network: Ipv4Net, prefix: u8) -> Result<Self> {
        let network = network.trunc();
        let subnets =
            network.subnets(prefix).map_err(|_| Error::InvalidPrefix { network, prefix })?;

        Ok(Self { network, prefix, subnets })
    }

    /// Returns an allocator of /24 subnets, the size used for every tapped link.
    pub fn tap_subnets(network: Ipv4Net) -> Result<Self> {
        Self::new(network, TAP_SUBNET_PREFIX)
    }

    #[inline]
    pub fn network(&self) -> Ipv4Net {
        self.network
    }

    /// Draws the next subnet.
    pub fn next_subnet(&mut self) -> Result<Ipv4Net> {
        let subnet = self
            .subnets
            .next()
            .ok_or(Error::SubnetsExhausted { network: self.network, prefix: self.prefix })?;

        tracing::trace!(%subnet, network = %self.network, "allocated subnet");
        Ok(subnet)
    }
}

/// Hands out the host addresses of a subnet in ascending order, each at most once.
#[derive(Debug, Clone)]
pub struct HostAllocator {
    subnet: Ipv4Net,
    hosts: Ipv4AddrRange,
    issued: u64,
}

impl HostAllocator {
    pub fn new(subnet: Ipv4Net) -> Self {
        Self { subnet, hosts: subnet.hosts(), issued: 0 }
    }

    #[inline]
    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// The netmask shared by every address this allocator issues.
    #[inline]
    pub fn netmask(&self) -> Ipv4Addr {
        self.subnet.netmask()
    }

    /// How many addresses can still be drawn.
    pub fn remaining(&self) -> u64 {
        host_capacity(self.subnet).saturating_sub(self.issued)
    }

    pub fn next_host(&mut self) -> Result<Ipv4Addr> {
        let host = self.hosts.next().ok_or(Error::HostsExhausted { subnet: self.subnet })?;
        self.issued += 1;
        Ok(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_network_truncates_host_bits() {
        let net = parse_network("10.100.3.7/16").unwrap();
        assert_eq!(net.to_string(), "10.100.0.0/16");

        let err = parse_network("10.100.0.0/33").unwrap_err();
        assert!(matches!(err, Error::InvalidNetwork { .. }));
        assert!(parse_network("not-a-network").is_err());
    }

    #[test]
    fn subnets_are_carved_in_order() {
        let net = parse_network("10.100.0.0/16").unwrap();
        let mut subnets = SubnetAllocator::tap_subnets(net).unwrap();

        assert_eq!(subnets.next_subnet().unwrap().to_string(), "10.100.0.0/24");
        assert_eq!(subnets.next_subnet().unwrap().to_string(), "10.100.1.0/24");
        assert_eq!(subnets.next_subnet().unwrap().to_string(), "10.100.2.0/24");
    }

    #[test]
    fn subnets_exhaust() {
        let net = parse_network("192.168.0.0/23").unwrap();
        let mut subnets = SubnetAllocator::tap_subnets(net).unwrap();

        subnets.next_subnet().unwrap();
        subnets.next_subnet().unwrap();
        assert!(matches!(
            subnets.next_subnet(),
            Err(Error::SubnetsExhausted { prefix: 24, .. })
        ));
    }

    #[test]
    fn prefix_must_fit_network() {
        let net = parse_network("10.0.0.0/25").unwrap();
        assert!(matches!(SubnetAllocator::tap_subnets(net), Err(Error::InvalidPrefix { .. })));
    }

    #[test]
    fn hosts_skip_network_address() {
        let subnet = parse_network("10.100.4.0/24").unwrap();
        let mut hosts = HostAllocator::new(subnet);

        assert_eq!(hosts.remaining(), 254);
        assert_eq!(hosts.next_host().unwrap(), Ipv4Addr::new(10, 100, 4, 1));
        assert_eq!(hosts.next_host().unwrap(), Ipv4Addr::new(10, 100, 4, 2));
        assert_eq!(hosts.remaining(), 252);
        assert_eq!(hosts.netmask(), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn hosts_exhaust() {
        let subnet = parse_network("10.0.0.0/30").unwrap();
        let mut hosts = HostAllocator::new(subnet);

        assert_eq!(hosts.remaining(), 2);
        assert_eq!(hosts.next_host().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(hosts.next_host().unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(hosts.remaining(), 0);
        assert!(matches!(hosts.next_host(), Err(Error::HostsExhausted { .. })));
    }

    #[test]
    fn point_to_point_capacity() {
        assert_eq!(host_capacity(parse_network("10.0.0.0/31").unwrap()), 2);
        assert_eq!(host_capacity(parse_network("10.0.0.1/32").unwrap()), 1);
        assert_eq!(host_capacity(parse_network("10.0.0.0/16").unwrap()), 65534);
    }
}
