use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use l2tap_common::HostAllocator;
use l2tap_graph::{Capability, CollectorRef, Collectors, EdgeId, Graph, VertexId};
use l2tap_ovs::{Tap, TapEndpoint, TunnelParams, DEFAULT_BRIDGE};
use rand::Rng;

use crate::{gre::set_up_gre_endpoint, Error, GreKeys, Result};

/// A collector wired to a tap: its address on the tap subnet and the key of its GRE tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorTunnel {
    pub collector: VertexId,
    pub address: Ipv4Addr,
    pub key: u32,
}

/// The outcome of tapping one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TappedEdge {
    /// The tapped edge. It no longer exists in the graph.
    pub edge: EdgeId,
    pub subnet: Ipv4Net,
    /// The VM endpoint whose link was broken.
    pub endpoint: VertexId,
    pub tap: VertexId,
    /// Switch between the tap and the endpoint.
    pub tap_switch: VertexId,
    /// Switch between the tap and the collectors.
    pub collector_switch: VertexId,
    pub tap_address: Ipv4Addr,
    /// One entry per collector, in the order the collectors were given.
    pub collectors: Vec<CollectorTunnel>,
}

/// Everything resolved about an edge before the graph is touched.
#[derive(Debug)]
struct Plan {
    /// Every listed collector, repeats included.
    collectors: Vec<VertexId>,
    switch: VertexId,
    endpoint: VertexId,
    endpoint_name: String,
    /// The endpoint's interface on the tapped link.
    interface: String,
    address: Ipv4Addr,
    netmask: Ipv4Addr,
    tap_name: String,
}

/// Taps a single edge: splits it with a tap VM and mirrors its traffic to the collectors.
///
/// Rewrites `switch <-> endpoint` into:
///
/// ```text
/// switch <-> tap <-> tap switch <-> endpoint
///             |
///             +-> collector switch <-> collector(s)
/// ```
///
/// The endpoint keeps its interface name, address and netmask; only the link behind it changes.
/// Every check that can fail runs before the first change to the graph, so an error leaves the
/// graph as it was.
#[derive(Debug)]
pub struct EdgeTapper {
    edge: EdgeId,
    hosts: HostAllocator,
    bridge_name: String,
    tunnels: Vec<TunnelParams>,
}

impl EdgeTapper {
    /// Creates a tapper for `edge`. The tap and its collectors take their addresses from
    /// `subnet`, in that order.
    pub fn new(edge: EdgeId, subnet: Ipv4Net) -> Self {
        Self {
            edge,
            hosts: HostAllocator::new(subnet),
            bridge_name: DEFAULT_BRIDGE.to_owned(),
            tunnels: Vec::new(),
        }
    }

    pub fn with_bridge_name(mut self, bridge_name: impl Into<String>) -> Self {
        self.bridge_name = bridge_name.into();
        self
    }

    /// Taps the edge, mirroring to every collector. A single collector is treated as a list of
    /// one. GRE keys are drawn from `keys`, one per collector.
    pub fn tap_edge<R: Rng + ?Sized>(
        mut self,
        graph: &mut Graph,
        collectors: impl Into<Collectors>,
        keys: &mut GreKeys,
        rng: &mut R,
    ) -> Result<TappedEdge> {
        let subnet = self.hosts.subnet();
        let _span = tracing::debug_span!("tap_edge", edge = %self.edge, %subnet).entered();

        let plan = self.plan(graph, collectors.into())?;

        let tap = graph.add_decorated(plan.tap_name.as_str(), Capability::Tap)?;
        let tap_switch =
            graph.add_decorated(Self::tap_switch_name(&plan.tap_name), Capability::Switch)?;
        let collector_switch =
            graph.add_decorated(Self::collector_switch_name(&plan.tap_name), Capability::Switch)?;

        self.reconstruct_edge(graph, &plan, tap, tap_switch)?;

        // Tap first, then one address per listed collector. A collector listed again keeps its
        // position but takes the later address.
        let tap_address = self.hosts.next_host()?;
        let mut collector_addresses: Vec<(VertexId, Ipv4Addr)> =
            Vec::with_capacity(plan.collectors.len());
        for &collector in &plan.collectors {
            let address = self.hosts.next_host()?;
            match collector_addresses.iter_mut().find(|(id, _)| *id == collector) {
                Some((_, existing)) => *existing = address,
                None => collector_addresses.push((collector, address)),
            }
        }

        let collectors = self.mirror_traffic(
            graph,
            tap,
            tap_address,
            collector_switch,
            &collector_addresses,
            keys,
            rng,
        )?;

        tracing::debug!(tap = %plan.tap_name, %tap_address, collectors = collectors.len(), "tapped edge");

        Ok(TappedEdge {
            edge: self.edge,
            subnet,
            endpoint: plan.endpoint,
            tap,
            tap_switch,
            collector_switch,
            tap_address,
            collectors,
        })
    }

    fn tap_switch_name(tap_name: &str) -> String {
        format!("{tap_name}.switch")
    }

    fn collector_switch_name(tap_name: &str) -> String {
        format!("{tap_name}-collectors.switch")
    }

    /// `tap-<endpoint>`, or `tap-<endpoint>-<n>` with the smallest `n` leaving the tap and both
    /// of its switch names unused. An endpoint with several tapped links gets one tap per link.
    fn free_tap_name(graph: &Graph, endpoint: &str) -> String {
        let is_free = |tap_name: &str| {
            !graph.contains_name(tap_name)
                && !graph.contains_name(&Self::tap_switch_name(tap_name))
                && !graph.contains_name(&Self::collector_switch_name(tap_name))
        };

        let base = format!("tap-{endpoint}");
        if is_free(&base) {
            return base;
        }

        let mut n = 1u32;
        loop {
            let name = format!("{base}-{n}");
            if is_free(&name) {
                return name;
            }
            n += 1;
        }
    }

    /// Resolves collectors and the edge's ends, and checks that the rewrite can complete.
    fn plan(&self, graph: &Graph, collectors: Collectors) -> Result<Plan> {
        if collectors.is_empty() {
            return Err(Error::NoCollectors(self.edge));
        }

        let mut resolved = Vec::with_capacity(collectors.len());
        for collector in &collectors {
            resolved.push(Self::validate_collector(graph, collector)?);
        }

        let (switch, endpoint) = self.determine_switch_and_endpoint(graph)?;
        let endpoint_vertex = graph.vertex(endpoint)?;
        let endpoint_name = endpoint_vertex.name().to_owned();

        let dst_ip = graph.edge(self.edge)?.dst_ip;
        let interface = dst_ip
            .and_then(|address| endpoint_vertex.interface_by_address(address))
            .ok_or_else(|| Error::InterfaceNotFound { endpoint: endpoint_name.clone() })?;
        let (Some(address), Some(netmask)) = (interface.address, interface.netmask) else {
            return Err(Error::InterfaceNotFound { endpoint: endpoint_name });
        };
        let interface = interface.name.clone();

        let tap_name = Self::free_tap_name(graph, &endpoint_name);

        let needed = 1 + resolved.len() as u64;
        let available = self.hosts.remaining();
        if needed > available {
            return Err(Error::HostsExhausted { subnet: self.hosts.subnet(), needed, available });
        }

        Ok(Plan {
            collectors: resolved,
            switch,
            endpoint,
            endpoint_name,
            interface,
            address,
            netmask,
            tap_name,
        })
    }

    fn validate_collector(graph: &Graph, collector: &CollectorRef) -> Result<VertexId> {
        let id = match collector {
            CollectorRef::ByName(name) => graph
                .find_vertex(name)
                .map_err(|_| Error::InvalidCollector(collector.to_string()))?,
            CollectorRef::ByReference(id) => *id,
        };

        if !graph.is_decorated_by(id, Capability::VmEndpoint) {
            return Err(Error::InvalidCollector(collector.to_string()));
        }

        Ok(id)
    }

    /// Returns `(switch, endpoint)`. Exactly one end of the edge must be a switch.
    fn determine_switch_and_endpoint(&self, graph: &Graph) -> Result<(VertexId, VertexId)> {
        let edge = graph.edge(self.edge)?;
        let source_is_switch = graph.is_decorated_by(edge.source, Capability::Switch);
        let destination_is_switch = graph.is_decorated_by(edge.destination, Capability::Switch);

        match (source_is_switch, destination_is_switch) {
            (true, false) => Ok((edge.source, edge.destination)),
            (false, true) => Ok((edge.destination, edge.source)),
            (true, true) => {
                Err(Error::UntappableEdge { edge: self.edge, reason: "both ends are switches" })
            }
            (false, false) => {
                Err(Error::UntappableEdge { edge: self.edge, reason: "neither end is a switch" })
            }
        }
    }

    /// Routes the original link through the tap. All new links are synthetic.
    fn reconstruct_edge(
        &self,
        graph: &mut Graph,
        plan: &Plan,
        tap: VertexId,
        tap_switch: VertexId,
    ) -> Result<()> {
        let (_, tap_to_switch) = graph.l2_connect(tap, plan.switch)?;
        let (_, tap_to_tap_switch) = graph.l2_connect(tap, tap_switch)?;
        let qos = graph.edge(self.edge)?.qos;

        let new_edge = self.refresh_endpoint_interface(graph, plan, tap_switch)?;
        graph.edge_mut(new_edge)?.qos = qos;

        for edge in [tap_to_switch, tap_to_tap_switch, new_edge] {
            graph.edge_mut(edge)?.synthetic = true;
        }

        Ok(())
    }

    /// Moves the endpoint's interface on the tapped link over to the tap switch. The interface
    /// keeps its name, since other per-interface configuration on the endpoint is keyed by it.
    fn refresh_endpoint_interface(
        &self,
        graph: &mut Graph,
        plan: &Plan,
        tap_switch: VertexId,
    ) -> Result<EdgeId> {
        // Drops the tapped edge along with the interface.
        let old = graph.remove_interface(plan.endpoint, &plan.interface)?;
        let (new_name, new_edge) =
            graph.connect(plan.endpoint, tap_switch, plan.address, plan.netmask)?;
        graph.rename_interface(plan.endpoint, &new_name, &old.name)?;
        if let Some(interface) = graph.vertex_mut(plan.endpoint)?.interface_mut(&old.name) {
            interface.mac = old.mac;
        }

        tracing::debug!(endpoint = %plan.endpoint_name, interface = %old.name, address = %plan.address, "moved interface to tap switch");

        Ok(new_edge)
    }

    /// Bridges the tap, puts the tap and every collector on the collector switch, and tunnels
    /// mirrored traffic to each collector.
    #[allow(clippy::too_many_arguments)]
    fn mirror_traffic<R: Rng + ?Sized>(
        &mut self,
        graph: &mut Graph,
        tap: VertexId,
        tap_address: Ipv4Addr,
        collector_switch: VertexId,
        collectors: &[(VertexId, Ipv4Addr)],
        keys: &mut GreKeys,
        rng: &mut R,
    ) -> Result<Vec<CollectorTunnel>> {
        let netmask = self.hosts.netmask();

        Tap::new(graph.vertex_mut(tap)?)?.l2_mitm(&self.bridge_name, rng);
        graph.connect(tap, collector_switch, tap_address, netmask)?;

        self.tunnels.clear();
        let mut wired = Vec::with_capacity(collectors.len());
        for &(collector, address) in collectors {
            graph.connect(collector, collector_switch, address, netmask)?;

            let key = keys.next_key();
            let params = set_up_gre_endpoint(graph.vertex_mut(collector)?, key, address, tap_address);
            self.tunnels.push(params);
            wired.push(CollectorTunnel { collector, address, key });
        }

        Tap::new(graph.vertex_mut(tap)?)?.mirror_traffic(&self.bridge_name, &self.tunnels)?;

        Ok(wired)
    }
}
