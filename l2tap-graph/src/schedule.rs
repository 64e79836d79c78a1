//! Host commands scheduled on a vertex.
//!
//! Commands are not executed here. Each entry records the relative time at which the host
//! runtime should launch it; lower values run earlier.

use std::{fmt, process::Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Relative start time. Negative values run before the experiment starts.
    pub time: i32,
    /// The program to launch, e.g. `ip` or `ovs-vsctl`.
    pub program: String,
    /// The argument string, passed verbatim to the host.
    pub arguments: String,
    /// Whether `program` is a resource shipped to the VM rather than a binary already installed.
    pub vm_resource: bool,
}

impl ScheduleEntry {
    pub fn new(time: i32, program: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { time, program: program.into(), arguments: arguments.into(), vm_resource: false }
    }

    /// Marks this entry as a VM resource.
    pub fn vm_resource(mut self) -> Self {
        self.vm_resource = true;
        self
    }

    /// Builds the [`Command`] that runs this entry, splitting arguments on whitespace.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments.split_ascii_whitespace());
        cmd
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.arguments)
        }
    }
}
