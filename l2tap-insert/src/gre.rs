use std::net::Ipv4Addr;

use l2tap_graph::Vertex;
use l2tap_ovs::TunnelParams;

/// Issues GRE keys for one insertion run. Keys are strictly increasing and never reused, so every
/// collector/tap tunnel pair of a run is distinguishable.
#[derive(Debug, Clone)]
pub struct GreKeys {
    next: u32,
}

impl Default for GreKeys {
    fn default() -> Self {
        Self::starting_at(Self::FIRST_KEY)
    }
}

impl GreKeys {
    pub const FIRST_KEY: u32 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub const fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// The key the next call to [`GreKeys::next_key`] returns.
    #[inline]
    pub const fn peek(&self) -> u32 {
        self.next
    }

    pub fn next_key(&mut self) -> u32 {
        let key = self.next;
        self.next += 1;
        key
    }
}

/// Schedules a `gretap` device named `tap<key>` on the collector, terminating the tunnel from the
/// tap. The device is created, brought up and then set promiscuous, in that order, ahead of the
/// tap's mirror configuration.
///
/// Returns the parameters the tap needs to send mirrored traffic into this tunnel.
pub fn set_up_gre_endpoint(
    collector: &mut Vertex,
    key: u32,
    collector_ip: Ipv4Addr,
    tap_ip: Ipv4Addr,
) -> TunnelParams {
    let device = format!("tap{key}");

    tracing::debug!(collector = %collector.name(), %device, %collector_ip, %tap_ip, "adding gre endpoint");

    collector.run_executable(
        -100,
        "ip",
        format!("link add {device} type gretap key {key} local {collector_ip} remote {tap_ip} ttl 255"),
    );
    collector.run_executable(-99, "ip", format!("link set dev {device} up"));
    collector.run_executable(-98, "ip", format!("link set {device} promisc on"));

    TunnelParams::new(collector_ip, key)
}
