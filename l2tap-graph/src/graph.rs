use std::{collections::BTreeMap, net::Ipv4Addr};

use rustc_hash::FxHashMap;

use crate::{
    edge::{Edge, EdgeId},
    vertex::{Capability, Interface, Vertex, VertexId},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vertex not found: {0}")]
    VertexNotFound(String),
    #[error("unknown vertex id: {0}")]
    UnknownVertex(VertexId),
    #[error("vertex already exists: {0}")]
    DuplicateVertex(String),
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("interface {interface} not found on {vertex}")]
    InterfaceNotFound { vertex: String, interface: String },
    #[error("interface {interface} already exists on {vertex}")]
    DuplicateInterface { vertex: String, interface: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The experiment graph: every vertex and edge of the emulated topology.
///
/// Vertices and edges are enumerated in insertion order. Vertex names are unique.
#[derive(Debug, Default)]
pub struct Graph {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
    /// Name index, kept in sync with `vertices`.
    names: FxHashMap<String, VertexId>,
    next_vertex: usize,
    next_edge: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, name: impl Into<String>) -> Result<VertexId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateVertex(name));
        }

        let id = VertexId(self.next_vertex);
        self.next_vertex += 1;

        tracing::trace!(%id, %name, "adding vertex");
        self.names.insert(name.clone(), id);
        self.vertices.insert(id, Vertex::new(name));

        Ok(id)
    }

    /// Adds a vertex decorated with `capability`.
    pub fn add_decorated(
        &mut self,
        name: impl Into<String>,
        capability: Capability,
    ) -> Result<VertexId> {
        let id = self.add_vertex(name)?;
        self.decorate(id, capability)?;
        Ok(id)
    }

    pub fn find_vertex(&self, name: &str) -> Result<VertexId> {
        self.names.get(name).copied().ok_or_else(|| Error::VertexNotFound(name.to_owned()))
    }

    #[inline]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Vertex> {
        self.vertices.get(&id).ok_or(Error::UnknownVertex(id))
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex> {
        self.vertices.get_mut(&id).ok_or(Error::UnknownVertex(id))
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter().map(|(id, v)| (*id, v))
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn decorate(&mut self, id: VertexId, capability: Capability) -> Result<()> {
        self.vertex_mut(id)?.decorate(capability);
        Ok(())
    }

    /// Returns `false` for unknown vertices.
    pub fn is_decorated_by(&self, id: VertexId, capability: Capability) -> bool {
        self.vertices.get(&id).is_some_and(|v| v.is_decorated_by(capability))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(&id).ok_or(Error::EdgeNotFound(id))
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge> {
        self.edges.get_mut(&id).ok_or(Error::EdgeNotFound(id))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(id, e)| (*id, e))
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges with at least one endpoint at `vertex`.
    pub fn edges_of(&self, vertex: VertexId) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges().filter(move |(_, e)| e.touches(vertex))
    }

    fn add_edge(&mut self, source: VertexId, destination: VertexId) -> Result<EdgeId> {
        self.vertex(source)?;
        self.vertex(destination)?;

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;

        tracing::trace!(%id, %source, %destination, "adding edge");
        self.edges.insert(id, Edge::new(source, destination));

        Ok(id)
    }

    /// Removes an edge. Interfaces that terminated it stay in place, detached.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge> {
        let edge = self.edges.remove(&id).ok_or(Error::EdgeNotFound(id))?;

        for vertex in [edge.source, edge.destination] {
            if let Some(vertex) = self.vertices.get_mut(&vertex) {
                vertex
                    .interfaces_mut()
                    .iter_mut()
                    .filter(|i| i.edge == Some(id))
                    .for_each(|i| i.edge = None);
            }
        }

        Ok(edge)
    }

    /// Connects `vertex` to `peer` at layer 2 only: a new address-less interface is created on
    /// `vertex`. Returns the interface name and the new edge.
    pub fn l2_connect(&mut self, vertex: VertexId, peer: VertexId) -> Result<(String, EdgeId)> {
        self.attach(vertex, peer, None)
    }

    /// Connects `vertex` to `peer` with a new interface on `vertex` holding `address`. The new
    /// edge records the address as its `dst_ip`. Returns the interface name and the new edge.
    pub fn connect(
        &mut self,
        vertex: VertexId,
        peer: VertexId,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> Result<(String, EdgeId)> {
        self.attach(vertex, peer, Some((address, netmask)))
    }

    fn attach(
        &mut self,
        vertex: VertexId,
        peer: VertexId,
        address: Option<(Ipv4Addr, Ipv4Addr)>,
    ) -> Result<(String, EdgeId)> {
        let edge_id = self.add_edge(vertex, peer)?;

        let v = self.vertex_mut(vertex)?;
        let mut interface = Interface::new(v.next_interface_name());
        interface.edge = Some(edge_id);
        if let Some((address, netmask)) = address {
            interface = interface.with_address(address, netmask);
        }

        let name = interface.name.clone();
        tracing::debug!(vertex = %v.name(), interface = %name, ?address, %edge_id, "connected");
        v.push_interface(interface);

        if let Some((address, netmask)) = address {
            let edge = self.edge_mut(edge_id)?;
            edge.dst_ip = Some(address);
            edge.netmask = Some(netmask);
        }

        Ok((name, edge_id))
    }

    /// Removes an interface together with the edge it terminates.
    pub fn remove_interface(&mut self, vertex: VertexId, name: &str) -> Result<Interface> {
        let v = self.vertex_mut(vertex)?;
        let interface = v.take_interface(name).ok_or_else(|| Error::InterfaceNotFound {
            vertex: v.name().to_owned(),
            interface: name.to_owned(),
        })?;

        if let Some(edge) = interface.edge {
            // The edge may already be gone if it was removed explicitly.
            if self.edges.contains_key(&edge) {
                self.remove_edge(edge)?;
            }
        }

        Ok(interface)
    }

    pub fn rename_interface(&mut self, vertex: VertexId, from: &str, to: &str) -> Result<()> {
        let v = self.vertex_mut(vertex)?;
        if from != to && v.interface(to).is_some() {
            return Err(Error::DuplicateInterface {
                vertex: v.name().to_owned(),
                interface: to.to_owned(),
            });
        }

        let vertex_name = v.name().to_owned();
        let interface = v.interface_mut(from).ok_or_else(|| Error::InterfaceNotFound {
            vertex: vertex_name,
            interface: from.to_owned(),
        })?;
        interface.name = to.to_owned();

        Ok(())
    }
}
