use std::{collections::BTreeSet, fmt, net::Ipv4Addr};

use crate::{edge::EdgeId, schedule::ScheduleEntry};

/// Identifies a vertex within its [`Graph`](crate::Graph). Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) usize);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A role a vertex can be decorated with. A vertex's behavior is the union of the operations of
/// all its capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// An L2 forwarding point with no IP identity of its own.
    Switch,
    /// A virtual machine that owns interfaces and runs scheduled commands.
    VmEndpoint,
    /// A VM with Open vSwitch available, able to bridge its interfaces.
    OpenvSwitch,
    /// A VM that bridges a broken link and mirrors its traffic.
    Tap,
}

impl Capability {
    /// The capability this one is built on, if any.
    pub const fn requires(self) -> Option<Self> {
        match self {
            Self::Tap => Some(Self::OpenvSwitch),
            Self::OpenvSwitch => Some(Self::VmEndpoint),
            Self::Switch | Self::VmEndpoint => None,
        }
    }

    /// This capability followed by everything it transitively requires.
    pub fn with_requirements(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), |c| c.requires())
    }
}

/// A network interface on a VM endpoint. An interface without an address is layer 2 only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub mac: Option<String>,
    pub address: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    /// The link this interface terminates.
    pub edge: Option<EdgeId>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), mac: None, address: None, netmask: None, edge: None }
    }

    pub fn with_address(mut self, address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        self.address = Some(address);
        self.netmask = Some(netmask);
        self
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    /// Whether the interface carries no layer 3 configuration.
    pub fn is_layer2(&self) -> bool {
        self.address.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    name: String,
    capabilities: BTreeSet<Capability>,
    interfaces: Vec<Interface>,
    schedule: Vec<ScheduleEntry>,
    next_interface: usize,
}

impl Vertex {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BTreeSet::new(),
            interfaces: Vec::new(),
            schedule: Vec::new(),
            next_interface: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `capability` and everything it requires. Decorating twice is a no-op.
    pub fn decorate(&mut self, capability: Capability) {
        self.capabilities.extend(capability.with_requirements());
    }

    #[inline]
    pub fn is_decorated_by(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut [Interface] {
        &mut self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.name == name)
    }

    /// Finds the interface holding `address`. At most one interface holds a given address.
    pub fn interface_by_address(&self, address: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.address == Some(address))
    }

    /// Returns the next free `eth<N>` name.
    pub(crate) fn next_interface_name(&mut self) -> String {
        loop {
            let name = format!("eth{}", self.next_interface);
            self.next_interface += 1;
            if self.interface(&name).is_none() {
                return name;
            }
        }
    }

    pub(crate) fn push_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
    }

    pub(crate) fn take_interface(&mut self, name: &str) -> Option<Interface> {
        let index = self.interfaces.iter().position(|i| i.name == name)?;
        Some(self.interfaces.remove(index))
    }

    /// Schedules `program` to run with `arguments` at `time`.
    pub fn run_executable(
        &mut self,
        time: i32,
        program: impl Into<String>,
        arguments: impl Into<String>,
    ) {
        self.push_entry(ScheduleEntry::new(time, program, arguments));
    }

    /// Schedules a resource shipped to the VM, rather than an installed binary.
    pub fn run_vm_resource(
        &mut self,
        time: i32,
        resource: impl Into<String>,
        arguments: impl Into<String>,
    ) {
        self.push_entry(ScheduleEntry::new(time, resource, arguments).vm_resource());
    }

    fn push_entry(&mut self, entry: ScheduleEntry) {
        tracing::trace!(vertex = %self.name, time = entry.time, command = %entry, "scheduled");
        self.schedule.push(entry);
    }

    /// Scheduled entries in the order they were added.
    pub fn schedule_entries(&self) -> &[ScheduleEntry] {
        &self.schedule
    }

    /// Scheduled entries in execution order. Entries sharing a time keep insertion order.
    pub fn schedule(&self) -> Vec<&ScheduleEntry> {
        let mut entries: Vec<_> = self.schedule.iter().collect();
        entries.sort_by_key(|e| e.time);
        entries
    }
}
