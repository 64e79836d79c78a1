use std::net::Ipv4Addr;

use l2tap_common::MacAddr;
use l2tap_graph::{Capability, Vertex};
use rand::Rng;

use crate::{bridge::BridgeEndpoint, ensure_decorated, Error, Result};

/// The bridge a tap puts its layer 2 interfaces on.
pub const DEFAULT_BRIDGE: &str = "br0";

/// When the bridge holding the broken link is created.
const MITM_TIME: i32 = -90;
/// When mirrors are attached. Must run after the bridge exists.
const MIRROR_TIME: i32 = -75;

/// One end of a GRE tunnel carrying mirrored traffic.
///
/// The same key must be configured on the remote end. Keys also name the port (`gre<key>`) and
/// mirror (`mirror<key>`) on the bridge, so they must be unique per bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelParams {
    pub remote_ip: Ipv4Addr,
    pub key: u32,
}

impl TunnelParams {
    pub fn new(remote_ip: Ipv4Addr, key: u32) -> Self {
        Self { remote_ip, key }
    }
}

/// A vertex that can break a link at layer 2 and mirror the traffic crossing it.
pub trait TapEndpoint: BridgeEndpoint {
    /// Puts every layer 2 interface of the vertex on `bridge_name`, which "breaks" the link and
    /// leaves the vertex in a position to observe it.
    ///
    /// An interface without an address is assumed to be layer 2 only. Such interfaces that also
    /// lack a hardware address get a random unicast one, written back onto the interface.
    fn l2_mitm<R: Rng + ?Sized>(&mut self, bridge_name: &str, rng: &mut R) {
        let mut macs = Vec::new();
        for interface in self.vertex_mut().interfaces_mut() {
            if !interface.is_layer2() {
                continue;
            }

            let mac = match interface.mac.as_deref() {
                Some(mac) if !mac.is_empty() => mac.to_lowercase(),
                _ => {
                    let mac = MacAddr::random_unicast(rng).to_string();
                    tracing::debug!(interface = %interface.name, %mac, "assigned hardware address");
                    interface.mac = Some(mac.clone());
                    mac
                }
            };
            macs.push(mac);
        }

        self.bridge_layer2(MITM_TIME, bridge_name, &macs);
    }

    /// Mirrors all traffic on `bridge` through one GRE port per tunnel. The remote end of every
    /// tunnel is expected to have a matching GRE device configured.
    ///
    /// Emits a single `ovs-vsctl` transaction creating every port and mirror, then attaches all
    /// mirrors to the bridge.
    fn mirror_traffic(&mut self, bridge: &str, tunnels: &[TunnelParams]) -> Result<()> {
        if tunnels.is_empty() {
            return Err(Error::EmptyTunnelParams);
        }

        let mut arguments = String::new();
        let mut mirror_ids = Vec::with_capacity(tunnels.len());
        for TunnelParams { remote_ip, key } in tunnels {
            let mirror_id = format!("@m{key}");
            arguments.push_str(&format!(
                "add-port {bridge} gre{key} -- \
                 set interface gre{key} type=gre options:remote_ip={remote_ip} options:key={key} -- \
                 --id=@p{key} get port gre{key} -- \
                 --id={mirror_id} create mirror name=mirror{key} select-all=true output-port=@p{key} -- "
            ));
            mirror_ids.push(mirror_id);
        }
        arguments.push_str(&format!("set bridge {bridge} mirrors={}", mirror_ids.join(",")));

        tracing::debug!(vertex = %self.vertex().name(), bridge, tunnels = tunnels.len(), "mirroring traffic");
        self.vertex_mut().run_executable(MIRROR_TIME, "ovs-vsctl", arguments);

        Ok(())
    }
}

/// A [`Capability::Tap`] vertex.
#[derive(Debug)]
pub struct Tap<'a>(&'a mut Vertex);

impl<'a> Tap<'a> {
    pub fn new(vertex: &'a mut Vertex) -> Result<Self> {
        ensure_decorated(vertex, Capability::Tap)?;
        Ok(Self(vertex))
    }
}

impl BridgeEndpoint for Tap<'_> {
    fn vertex(&self) -> &Vertex {
        &*self.0
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut *self.0
    }
}

impl TapEndpoint for Tap<'_> {}
