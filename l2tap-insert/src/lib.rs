#![doc(issue_tracker_base_url = "https://github.com/chainbound/l2tap/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Splices passive taps into links of an experiment graph.
//!
//! Every edge marked with collectors is broken in two by a [`Tap`](l2tap_ovs::Tap) VM that
//! bridges both halves and mirrors all traffic crossing it to each collector over a dedicated GRE
//! tunnel. Mirrored traffic travels on its own /24, carved out of a collector network, so it can
//! never be picked up by another tap upstream.
//!
//! See [`InsertTaps`] for the driver and [`EdgeTapper`] for the per-edge rewrite.

use l2tap_graph::EdgeId;

mod driver;
pub use driver::{insert_taps, InsertTaps, InsertTapsOptions, TapReport, DEFAULT_COLLECTOR_NETWORK};

mod gre;
pub use gre::{set_up_gre_endpoint, GreKeys};

mod tapper;
pub use tapper::{CollectorTunnel, EdgeTapper, TappedEdge};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph error: {0}")]
    Graph(#[from] l2tap_graph::Error),
    #[error("ovs error: {0}")]
    Ovs(#[from] l2tap_ovs::Error),
    #[error("address error: {0}")]
    Ip(#[from] l2tap_common::ip::Error),
    #[error("collector {0} must be a named or direct reference to a VM endpoint vertex")]
    InvalidCollector(String),
    #[error("no collectors given for edge {0}")]
    NoCollectors(EdgeId),
    #[error("edge {edge} cannot be tapped: {reason}")]
    UntappableEdge { edge: EdgeId, reason: &'static str },
    #[error("could not find interface for tapping on endpoint: {endpoint}")]
    InterfaceNotFound { endpoint: String },
    #[error("{subnet} has {available} host addresses left, {needed} needed")]
    HostsExhausted { subnet: ipnet::Ipv4Net, needed: u64, available: u64 },
    #[error("{network} has room for {available} tap subnets, {needed} needed")]
    SubnetsExhausted { network: ipnet::Ipv4Net, needed: u64, available: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
