//! reattach-core - Per-User Bootstrap Namespace Library
//! This crate moves a process from the system-wide launchd bootstrap
//! namespace into the invoking user's per-user ("Background") namespace,
//! picking the mechanism that matches the host release, and then replaces
//! the process image with a target program.

pub mod unsafe_mod;

pub mod mechanism;
pub mod session;

pub mod exec;
pub mod reattach;

pub mod errors;
pub mod logging;
pub mod namespace;
pub mod platform;
pub mod release;

pub use errors::{ClassifyWarning, ExecError, MigrationError, ProtocolStep};
pub use exec::{ExecOptions, ExecPlan, build_exec_plan, exec};
pub use mechanism::{Launchd, MigrationOutcome, NamespaceMechanism};
pub use namespace::ReattachOptions;
pub use platform::Platform;
pub use reattach::{ReattachReport, reattach, reattach_with};
pub use release::{Classification, ModernLookup, ReattachVariant, classify, classify_platform};

use std::ffi::OsString;
use tracing::debug;

/// Reattaches (unless disabled) and then execs `command`.
///
/// Migration problems are logged and never stop the exec. This only returns
/// when the command could not be executed.
///
/// # Arguments
/// * `reattach_options` - Where the release comes from and whether to migrate at all.
/// * `exec_options` - How argv is built.
/// * `command` - The program followed by its arguments.
pub fn run(
    reattach_options: &ReattachOptions,
    exec_options: &ExecOptions,
    command: Vec<OsString>,
) -> ExecError {
    if reattach_options.no_reattach {
        debug!("namespace migration disabled");
    } else {
        reattach(
            &Platform::resolve(reattach_options),
            reattach_options.modern_lookup,
        );
    }

    match build_exec_plan(command, exec_options.login) {
        Ok(plan) => exec(plan),
        Err(e) => e,
    }
}
