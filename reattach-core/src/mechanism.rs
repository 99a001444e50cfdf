//! # Namespace Mechanisms
//!
//! Each release band moves the bootstrap namespace handle a different way.
//! Every way is a [`NamespaceMechanism`]; all of them talk to the system only
//! through the [`Launchd`] capability trait, so nothing here touches a raw
//! foreign signature. The real implementation lives in
//! [`crate::unsafe_mod::launchd`].

use crate::errors::{MigrationError, ProtocolStep};
use crate::release::{ModernLookup, ReattachVariant};
use crate::session::{BootstrapHandle, MachPort};
use nix::unistd::Uid;
use tracing::debug;

/// The session type every mechanism moves into.
pub const BACKGROUND_SESSION: &str = "Background";

/// Manager name launchd reports when the process lives in the system session.
pub const SYSTEM_MANAGER_NAME: &str = "System";

/// The launchd and mach operations the mechanisms are built from.
///
/// Each method reports a missing entry point as
/// [`MigrationError::EntryPointNotFound`], separately from the routine
/// returning an error.
pub trait Launchd {
    /// `_vprocmgr_move_subset_to_user(uid, session)`.
    fn move_subset_to_user(&self, uid: Uid, session: &str) -> Result<(), MigrationError>;

    /// `_vprocmgr_move_subset_to_user(uid, session, flags)`.
    fn move_subset_to_user_with_flags(
        &self,
        uid: Uid,
        session: &str,
        flags: u64,
    ) -> Result<(), MigrationError>;

    /// The launchd manager name of the current session.
    fn manager_name(&self) -> Result<String, MigrationError>;

    /// The root bootstrap namespace reachable from `bootstrap`.
    fn root_namespace(&self, bootstrap: MachPort) -> Result<MachPort, MigrationError>;

    /// The per-user namespace of `uid` inside `root`.
    fn look_up_per_user(&self, root: MachPort, uid: Uid) -> Result<MachPort, MigrationError>;

    /// `_vprocmgr_detach_from_console(0)`.
    fn detach_from_console(&self) -> Result<(), MigrationError>;

    /// Asks launchd over `bootstrap` for the per-user namespace of `uid`.
    fn request_per_user_namespace(
        &self,
        bootstrap: MachPort,
        uid: Uid,
    ) -> Result<MachPort, MigrationError>;

    /// The task's current bootstrap port.
    fn current_bootstrap_port(&self) -> Result<MachPort, MigrationError>;

    /// Installs `port` as the task's bootstrap port.
    fn set_task_bootstrap_port(&self, port: MachPort) -> Result<(), MigrationError>;

    /// Releases a send right held by the task.
    fn deallocate_port(&self, port: MachPort) -> Result<(), MigrationError>;
}

/// Result of running a mechanism once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The process now lives in the per-user namespace.
    Succeeded,
    /// The move did not happen, or only partly happened.
    Failed(MigrationError),
}

impl From<Result<(), MigrationError>> for MigrationOutcome {
    fn from(result: Result<(), MigrationError>) -> Self {
        match result {
            Ok(()) => MigrationOutcome::Succeeded,
            Err(e) => MigrationOutcome::Failed(e),
        }
    }
}

/// A way of moving the process into the per-user bootstrap namespace.
pub trait NamespaceMechanism {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether [`NamespaceMechanism::resolve`] reads or replaces the handle.
    fn uses_bootstrap_handle(&self) -> bool {
        false
    }

    /// Moves the process. Never terminates it.
    fn resolve(
        &self,
        launchd: &dyn Launchd,
        uid: Uid,
        handle: &mut BootstrapHandle,
    ) -> Result<(), MigrationError>;
}

/// Two-argument `_vprocmgr_move_subset_to_user`.
#[derive(Debug, Default)]
pub struct LegacyMove;

impl NamespaceMechanism for LegacyMove {
    fn name(&self) -> &'static str {
        "move subset (2 args)"
    }

    fn resolve(
        &self,
        launchd: &dyn Launchd,
        uid: Uid,
        _handle: &mut BootstrapHandle,
    ) -> Result<(), MigrationError> {
        launchd.move_subset_to_user(uid, BACKGROUND_SESSION)
    }
}

/// Three-argument `_vprocmgr_move_subset_to_user`, flags zero.
#[derive(Debug, Default)]
pub struct MidMove;

impl NamespaceMechanism for MidMove {
    fn name(&self) -> &'static str {
        "move subset (3 args)"
    }

    fn resolve(
        &self,
        launchd: &dyn Launchd,
        uid: Uid,
        _handle: &mut BootstrapHandle,
    ) -> Result<(), MigrationError> {
        launchd.move_subset_to_user_with_flags(uid, BACKGROUND_SESSION, 0)
    }
}

/// Checks the manager name, then either looks the per-user namespace up
/// under the root namespace or detaches from the console session.
///
/// Only used for the first release with the modern launchd; newer releases
/// use [`DirectLookup`].
#[derive(Debug, Default)]
pub struct ManagerCheckLookup;

impl NamespaceMechanism for ManagerCheckLookup {
    fn name(&self) -> &'static str {
        "manager check lookup"
    }

    fn uses_bootstrap_handle(&self) -> bool {
        true
    }

    fn resolve(
        &self,
        launchd: &dyn Launchd,
        uid: Uid,
        handle: &mut BootstrapHandle,
    ) -> Result<(), MigrationError> {
        let manager = launchd.manager_name()?;
        debug!("launchd manager name: {manager}");

        if manager != SYSTEM_MANAGER_NAME {
            // Detaching moves the process in place; there is no port to install.
            return launchd.detach_from_console();
        }

        let root = launchd.root_namespace(handle.port())?;
        let per_user = launchd.look_up_per_user(root, uid);
        if let Err(e) = launchd.deallocate_port(root) {
            debug!("releasing root namespace port: {e}");
        }
        handle.install(launchd, per_user?)
    }
}

/// Looks the per-user namespace up directly, with no manager-name check.
#[derive(Debug, Default)]
pub struct DirectLookup;

impl NamespaceMechanism for DirectLookup {
    fn name(&self) -> &'static str {
        "direct lookup"
    }

    fn uses_bootstrap_handle(&self) -> bool {
        true
    }

    fn resolve(
        &self,
        launchd: &dyn Launchd,
        uid: Uid,
        handle: &mut BootstrapHandle,
    ) -> Result<(), MigrationError> {
        let per_user = launchd.request_per_user_namespace(handle.port(), uid)?;
        if per_user.is_null() {
            return Err(MigrationError::ProtocolStepFailed {
                step: ProtocolStep::PerUserLookup,
                symbol: "xpc_dictionary_copy_mach_send",
                code: 0,
            });
        }
        handle.install(launchd, per_user)
    }
}

/// The mechanism bound to `variant`.
pub fn mechanism_for(variant: ReattachVariant) -> Box<dyn NamespaceMechanism> {
    match variant {
        ReattachVariant::Legacy => Box::new(LegacyMove),
        ReattachVariant::Mid => Box::new(MidMove),
        ReattachVariant::Modern(ModernLookup::ManagerCheck) => Box::new(ManagerCheckLookup),
        ReattachVariant::Modern(ModernLookup::Direct) => Box::new(DirectLookup),
    }
}
