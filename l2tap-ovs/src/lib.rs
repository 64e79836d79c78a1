#![doc(issue_tracker_base_url = "https://github.com/chainbound/l2tap/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Capabilities for VMs running Open vSwitch.
//!
//! Operations are exposed as traits with default methods: [`BridgeEndpoint`] for any vertex
//! decorated with [`Capability::OpenvSwitch`], and [`TapEndpoint`] for vertices decorated with
//! [`Capability::Tap`]. The [`OpenvSwitch`] and [`Tap`] handles check the decoration once, on
//! construction. Operations only schedule host commands on the vertex; nothing is executed.

use l2tap_graph::{Capability, Vertex};

pub mod bridge;
pub use bridge::{BridgeEndpoint, OpenvSwitch, BRIDGE_SCRIPT};

pub mod tap;
pub use tap::{Tap, TapEndpoint, TunnelParams, DEFAULT_BRIDGE};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vertex {vertex} is not decorated with {capability:?}")]
    MissingCapability { vertex: String, capability: Capability },
    #[error("tunnel parameters need to be provided to mirror traffic")]
    EmptyTunnelParams,
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn ensure_decorated(vertex: &Vertex, capability: Capability) -> Result<()> {
    if !vertex.is_decorated_by(capability) {
        return Err(Error::MissingCapability { vertex: vertex.name().to_owned(), capability });
    }

    Ok(())
}
