//! # Bootstrap Handle
//!
//! The process's bootstrap port is a single process-wide resource. Instead of
//! poking a global, callers hold a [`BootstrapHandle`] and replace it through
//! [`BootstrapHandle::install`], which installs the new port on the task and
//! then releases the old one.

use crate::errors::MigrationError;
use crate::mechanism::Launchd;

/// A mach port name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachPort(pub u32);

impl MachPort {
    /// `MACH_PORT_NULL`.
    pub const NULL: MachPort = MachPort(0);

    /// Returns `true` for `MACH_PORT_NULL`.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// The bootstrap namespace handle the process is currently attached to.
#[derive(Debug, PartialEq, Eq)]
pub struct BootstrapHandle {
    port: MachPort,
}

impl BootstrapHandle {
    /// Wraps the port the task currently uses as its bootstrap port.
    pub fn new(port: MachPort) -> Self {
        Self { port }
    }

    /// The current port.
    pub fn port(&self) -> MachPort {
        self.port
    }

    /// Makes `new_port` the task's bootstrap port and releases the old one.
    ///
    /// If installing fails, nothing changes. If releasing the old port fails,
    /// `new_port` is still the active handle and the old port is leaked.
    pub fn install<L: Launchd + ?Sized>(
        &mut self,
        launchd: &L,
        new_port: MachPort,
    ) -> Result<(), MigrationError> {
        launchd.set_task_bootstrap_port(new_port)?;
        let old = std::mem::replace(&mut self.port, new_port);
        launchd.deallocate_port(old)
    }
}
