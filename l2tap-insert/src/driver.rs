use std::{net::Ipv4Addr, str::FromStr};

use ipnet::Ipv4Net;
use l2tap_common::{
    ip::{self, TAP_SUBNET_PREFIX},
    SubnetAllocator,
};
use l2tap_graph::{Collectors, EdgeId, Graph};
use l2tap_ovs::DEFAULT_BRIDGE;
use rand::Rng;

use crate::{EdgeTapper, Error, GreKeys, Result, TappedEdge};

/// The address space tap subnets are carved from, unless configured otherwise.
pub const DEFAULT_COLLECTOR_NETWORK: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::new(10, 100, 0, 0), 16);

#[derive(Debug, Clone)]
pub struct InsertTapsOptions {
    /// Address space for the tap subnets, one /24 per tapped edge.
    collector_network: Ipv4Net,
    /// The bridge each tap puts the broken link on.
    bridge_name: String,
}

impl Default for InsertTapsOptions {
    fn default() -> Self {
        Self {
            collector_network: DEFAULT_COLLECTOR_NETWORK,
            bridge_name: DEFAULT_BRIDGE.to_owned(),
        }
    }
}

impl InsertTapsOptions {
    /// Sets the address space tap subnets are carved from.
    pub fn collector_network(mut self, collector_network: Ipv4Net) -> Self {
        self.collector_network = collector_network.trunc();
        self
    }

    /// Sets the name of the bridge created on every tap.
    pub fn bridge_name(mut self, bridge_name: impl Into<String>) -> Self {
        self.bridge_name = bridge_name.into();
        self
    }
}

impl FromStr for InsertTapsOptions {
    type Err = Error;

    /// Parses a collector network such as `10.100.0.0/16`.
    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::default().collector_network(ip::parse_network(s)?))
    }
}

/// Every edge tapped during a run, in the order they were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapReport {
    pub tapped: Vec<TappedEdge>,
}

impl TapReport {
    #[inline]
    pub fn len(&self) -> usize {
        self.tapped.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tapped.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TappedEdge> {
        self.tapped.iter()
    }

    /// Every GRE key issued during the run, in issue order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.tapped.iter().flat_map(|t| t.collectors.iter().map(|c| c.key))
    }
}

/// Inserts a passive tap on every edge of the graph that names collectors.
///
/// Each tapped edge gets the next /24 of the collector network and is rewritten by an
/// [`EdgeTapper`]. GRE keys start at [`GreKeys::FIRST_KEY`] and are unique across the run.
///
/// Tapped edges are collected before any of them is rewritten, so the links a tap adds are never
/// considered. A failure aborts the run and leaves already tapped edges in place.
#[derive(Debug, Clone, Default)]
pub struct InsertTaps {
    options: InsertTapsOptions,
}

impl InsertTaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InsertTapsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InsertTapsOptions {
        &self.options
    }

    /// Runs the pass. Hardware addresses for tap interfaces are drawn from the thread-local RNG.
    pub fn run(&self, graph: &mut Graph) -> Result<TapReport> {
        self.run_with_rng(graph, &mut rand::thread_rng())
    }

    pub fn run_with_rng<R: Rng + ?Sized>(&self, graph: &mut Graph, rng: &mut R) -> Result<TapReport> {
        let network = self.options.collector_network;
        let _span = tracing::info_span!("insert_taps", %network).entered();

        let mut subnets = SubnetAllocator::tap_subnets(network)?;

        // Snapshot before mutating: tapping adds edges to the graph being walked.
        let candidates: Vec<(EdgeId, Collectors)> = graph
            .edges()
            .filter(|(_, edge)| edge.is_tapped())
            .map(|(id, edge)| (id, edge.tap.clone()))
            .collect();

        let needed = candidates.len() as u64;
        let available = 1u64 << (TAP_SUBNET_PREFIX - network.prefix_len());
        if needed > available {
            return Err(Error::SubnetsExhausted { network, needed, available });
        }

        tracing::debug!(edges = candidates.len(), "found tapped edges");

        let mut keys = GreKeys::new();
        let mut report = TapReport::default();
        for (edge, collectors) in candidates {
            let subnet = subnets.next_subnet()?;
            let tapped = EdgeTapper::new(edge, subnet)
                .with_bridge_name(self.options.bridge_name.as_str())
                .tap_edge(graph, collectors, &mut keys, rng)?;

            report.tapped.push(tapped);
        }

        tracing::info!(tapped = report.len(), next_key = keys.peek(), "inserted taps");

        Ok(report)
    }
}

/// Inserts taps using `collector_network` (e.g. `"10.100.0.0/16"`) for the tap subnets.
pub fn insert_taps(graph: &mut Graph, collector_network: &str) -> Result<TapReport> {
    InsertTaps::with_options(collector_network.parse()?).run(graph)
}
