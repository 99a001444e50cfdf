//! # Reattachment
//!
//! Classifies the platform, runs the mechanism bound to the resulting variant
//! exactly once, and reduces whatever happened to warnings. Nothing here is
//! fatal: the caller goes on to exec its program either way.

use crate::errors::ClassifyWarning;
use crate::mechanism::{Launchd, MigrationOutcome, mechanism_for};
use crate::platform::Platform;
use crate::release::{ModernLookup, ReattachVariant, classify_platform};
use crate::session::{BootstrapHandle, MachPort};
use crate::unsafe_mod::SystemLaunchd;
use nix::unistd::{self, Uid};
use tracing::{debug, warn};

/// What a reattach attempt did. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReattachReport {
    /// The variant chosen for the platform.
    pub variant: ReattachVariant,
    /// Warnings raised while classifying.
    pub warnings: Vec<ClassifyWarning>,
    /// How the mechanism went.
    pub outcome: MigrationOutcome,
    /// The bootstrap port the process ended up with, if it could be read.
    pub bootstrap_port: Option<MachPort>,
}

impl ReattachReport {
    /// Returns `true` if the process now lives in the per-user namespace.
    pub fn reattached(&self) -> bool {
        match &self.outcome {
            MigrationOutcome::Succeeded => true,
            MigrationOutcome::Failed(e) => e.handle_was_installed(),
        }
    }
}

/// Moves the current process into the invoking user's per-user namespace
/// using the real launchd.
///
/// `lookup` replaces the lookup a modern release would select; it has no
/// effect on older releases.
pub fn reattach(platform: &Platform, lookup: Option<ModernLookup>) -> ReattachReport {
    reattach_with(&SystemLaunchd::new(), platform, unistd::getuid(), lookup)
}

/// Like [`reattach`], with the launchd binding and user given explicitly.
pub fn reattach_with(
    launchd: &dyn Launchd,
    platform: &Platform,
    uid: Uid,
    lookup: Option<ModernLookup>,
) -> ReattachReport {
    let classification = classify_platform(&platform.sysname, &platform.release);
    for w in &classification.warnings {
        warn!("{w}");
    }

    let variant = match lookup {
        Some(lookup) => classification.variant.with_modern_lookup(lookup),
        None => classification.variant,
    };
    let mechanism = mechanism_for(variant);
    debug!(
        "release {:?} selects {variant}, using {}",
        platform.release,
        mechanism.name()
    );

    let (outcome, bootstrap_port) = match launchd.current_bootstrap_port() {
        Ok(port) => {
            let mut handle = BootstrapHandle::new(port);
            let outcome = MigrationOutcome::from(mechanism.resolve(launchd, uid, &mut handle));
            (outcome, Some(handle.port()))
        }
        Err(e) if mechanism.uses_bootstrap_handle() => (MigrationOutcome::Failed(e), None),
        Err(e) => {
            debug!("bootstrap port unavailable: {e}");
            let mut handle = BootstrapHandle::new(MachPort::NULL);
            let outcome = MigrationOutcome::from(mechanism.resolve(launchd, uid, &mut handle));
            (outcome, None)
        }
    };

    match &outcome {
        MigrationOutcome::Succeeded => debug!("reattached to the per-user namespace"),
        MigrationOutcome::Failed(e) if e.handle_was_installed() => {
            warn!("reattached, but leaked the previous bootstrap port: {e}")
        }
        MigrationOutcome::Failed(e) => warn!("unable to reattach: {e}"),
    }

    ReattachReport {
        variant,
        warnings: classification.warnings,
        outcome,
        bootstrap_port,
    }
}
