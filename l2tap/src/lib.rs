#![doc(issue_tracker_base_url = "https://github.com/chainbound/l2tap/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use l2tap_graph::*;
pub use l2tap_insert::{
    insert_taps, set_up_gre_endpoint, CollectorTunnel, EdgeTapper, GreKeys, InsertTaps,
    InsertTapsOptions, TapReport, TappedEdge, DEFAULT_COLLECTOR_NETWORK,
};
pub use l2tap_ovs::{BridgeEndpoint, OpenvSwitch, Tap, TapEndpoint, TunnelParams};

pub mod common {
    pub use l2tap_common::*;
}

/// Errors raised by the tap insertion pass.
pub mod insert {
    pub use l2tap_insert::{Error, Result};
}

/// Errors raised by Open vSwitch capabilities.
pub mod ovs {
    pub use l2tap_ovs::{Error, Result, BRIDGE_SCRIPT, DEFAULT_BRIDGE};
}
