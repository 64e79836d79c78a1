use std::{fmt, net::Ipv4Addr};

use crate::vertex::VertexId;

/// Identifies an edge within its [`Graph`](crate::Graph). Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Quality of service parameters of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Qos {
    /// Propagation delay in ms.
    pub delay: Option<u64>,
    /// Bandwidth cap in Kbps.
    pub bandwidth: Option<u64>,
    /// Packet loss rate in percent.
    pub loss: Option<f64>,
}

impl Qos {
    pub fn delay(mut self, delay: u64) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn loss(mut self, loss: f64) -> Self {
        self.loss = Some(loss);
        self
    }
}

/// A reference to a collector vertex, either by name or by id. Names are resolved against the
/// graph when the edge is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectorRef {
    ByName(String),
    ByReference(VertexId),
}

impl From<&str> for CollectorRef {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_owned())
    }
}

impl From<String> for CollectorRef {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<VertexId> for CollectorRef {
    fn from(id: VertexId) -> Self {
        Self::ByReference(id)
    }
}

impl fmt::Display for CollectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "{name}"),
            Self::ByReference(id) => write!(f, "{id}"),
        }
    }
}

/// An ordered list of collectors. A single collector converts into a one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collectors(Vec<CollectorRef>);

impl Collectors {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollectorRef> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<CollectorRef> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Collectors {
    type Item = &'a CollectorRef;
    type IntoIter = std::slice::Iter<'a, CollectorRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<CollectorRef> for Collectors {
    fn from(collector: CollectorRef) -> Self {
        Self(vec![collector])
    }
}

impl From<&str> for Collectors {
    fn from(name: &str) -> Self {
        CollectorRef::from(name).into()
    }
}

impl From<String> for Collectors {
    fn from(name: String) -> Self {
        CollectorRef::from(name).into()
    }
}

impl From<VertexId> for Collectors {
    fn from(id: VertexId) -> Self {
        CollectorRef::from(id).into()
    }
}

impl<T: Into<CollectorRef>> From<Vec<T>> for Collectors {
    fn from(collectors: Vec<T>) -> Self {
        Self(collectors.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CollectorRef>, const N: usize> From<[T; N]> for Collectors {
    fn from(collectors: [T; N]) -> Self {
        Self(collectors.into_iter().map(Into::into).collect())
    }
}

/// An undirected link between two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: VertexId,
    pub destination: VertexId,
    /// Collectors that should receive a mirror of this link's traffic. Empty means untapped.
    pub tap: Collectors,
    pub qos: Option<Qos>,
    /// The address of the interface that terminates this link on the VM side.
    pub dst_ip: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    /// Set on links that only exist as bookkeeping for an inserted tap.
    pub synthetic: bool,
}

impl Edge {
    pub(crate) fn new(source: VertexId, destination: VertexId) -> Self {
        Self {
            source,
            destination,
            tap: Collectors::default(),
            qos: None,
            dst_ip: None,
            netmask: None,
            synthetic: false,
        }
    }

    /// Marks the link for tapping by the given collectors.
    pub fn set_tap(&mut self, collectors: impl Into<Collectors>) {
        self.tap = collectors.into();
    }

    #[inline]
    pub fn is_tapped(&self) -> bool {
        !self.tap.is_empty()
    }

    #[inline]
    pub fn touches(&self, vertex: VertexId) -> bool {
        self.source == vertex || self.destination == vertex
    }
}
