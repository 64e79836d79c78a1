use l2tap_graph::{Capability, Vertex};

use crate::{ensure_decorated, Result};

/// The VM resource that creates a bridge and enslaves interfaces by hardware address.
pub const BRIDGE_SCRIPT: &str = "bridge_layer2.sh";

/// A vertex able to put interfaces on an L2 bridge.
pub trait BridgeEndpoint {
    fn vertex(&self) -> &Vertex;

    fn vertex_mut(&mut self) -> &mut Vertex;

    /// Schedules the creation of `bridge_name` at `time`, joining the interfaces with the given
    /// hardware addresses. Interfaces are matched by address because names aren't guaranteed to
    /// be stable on the VM. Addresses are lower-cased but otherwise passed through unchecked.
    fn bridge_layer2<S: AsRef<str>>(&mut self, time: i32, bridge_name: &str, interfaces: &[S]) {
        let mut arguments = bridge_name.to_owned();
        for mac in interfaces {
            arguments.push(' ');
            arguments.push_str(&mac.as_ref().to_lowercase());
        }

        tracing::debug!(vertex = %self.vertex().name(), bridge_name, time, "bridging interfaces");
        self.vertex_mut().run_vm_resource(time, BRIDGE_SCRIPT, arguments);
    }
}

/// A [`Capability::OpenvSwitch`] vertex.
#[derive(Debug)]
pub struct OpenvSwitch<'a>(&'a mut Vertex);

impl<'a> OpenvSwitch<'a> {
    pub fn new(vertex: &'a mut Vertex) -> Result<Self> {
        ensure_decorated(vertex, Capability::OpenvSwitch)?;
        Ok(Self(vertex))
    }
}

impl BridgeEndpoint for OpenvSwitch<'_> {
    fn vertex(&self) -> &Vertex {
        &*self.0
    }

    fn vertex_mut(&mut self) -> &mut Vertex {
        &mut *self.0
    }
}
