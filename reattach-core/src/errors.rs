//! Error types for the things that can go wrong while classifying the host,
//! moving the bootstrap namespace handle, and replacing the process image.

use std::ffi::OsString;
use std::fmt;
use thiserror::Error;

/// Kernel return code reported by a mach or launchd routine.
pub type KernReturn = i32;

/// A non-fatal problem found while mapping a release string to a variant.
///
/// Every warning degrades the accuracy of the mapping but never prevents a
/// variant from being chosen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyWarning {
    /// The leading component of the release string is not a number.
    #[error("unparsable major release number: '{release}'")]
    Unparsable {
        /// The release string as given.
        release: String,
    },
    /// The release predates the oldest supported band.
    #[error("unsupported old OS, trying as if it were {assumed}")]
    OldOs {
        /// The marketing version the classifier fell back to.
        assumed: &'static str,
    },
    /// The release is newer than any band we know about.
    #[error("unsupported new OS, trying as if it were {assumed}")]
    NewOs {
        /// The marketing version the classifier fell back to.
        assumed: &'static str,
    },
    /// `uname` reported something other than Darwin.
    #[error("unsupported OS sysname: {sysname}")]
    ForeignSysname {
        /// The reported system name.
        sysname: String,
    },
}

/// One step of the multi-step lookup protocols used on newer releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStep {
    /// Reading the launchd manager name property.
    PropertyQuery,
    /// Obtaining the root bootstrap namespace.
    RootLookup,
    /// Looking up the per-user namespace inside the root.
    PerUserLookup,
}

impl fmt::Display for ProtocolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolStep::PropertyQuery => write!(f, "property query"),
            ProtocolStep::RootLookup => write!(f, "root namespace lookup"),
            ProtocolStep::PerUserLookup => write!(f, "per-user namespace lookup"),
        }
    }
}

/// Why moving the bootstrap namespace handle did not work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// The system routine could not be resolved at runtime.
    #[error("unable to find {symbol}")]
    EntryPointNotFound {
        /// Name of the missing entry point.
        symbol: &'static str,
    },
    /// The routine was found and called but reported failure.
    #[error("{symbol} failed")]
    CallRejected {
        /// Name of the routine that rejected the call.
        symbol: &'static str,
    },
    /// A step of a lookup protocol failed.
    #[error("{step} failed: {symbol} returned {code}")]
    ProtocolStepFailed {
        /// Which step failed.
        step: ProtocolStep,
        /// Name of the routine used for the step.
        symbol: &'static str,
        /// The kernel or launchd return code.
        code: KernReturn,
    },
    /// Installing the new bootstrap port on the task failed.
    #[error("task_set_bootstrap_port failed: {code}")]
    HandleInstallFailed {
        /// The kernel return code.
        code: KernReturn,
    },
    /// The new port is installed but the previous one could not be released.
    #[error("mach_port_deallocate failed: {code}")]
    HandleReleaseFailed {
        /// The kernel return code.
        code: KernReturn,
    },
}

impl MigrationError {
    /// Returns `true` when the failure happened after the new handle was
    /// installed, meaning the process did move namespaces.
    pub fn handle_was_installed(&self) -> bool {
        matches!(self, MigrationError::HandleReleaseFailed { .. })
    }

    /// Returns `true` when the mechanism itself is absent on this host.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MigrationError::EntryPointNotFound { .. })
    }
}

/// Errors from building the exec plan or replacing the process image.
#[derive(Error, Debug)]
pub enum ExecError {
    /// No program was given to run.
    #[error("no program given")]
    MissingProgram,
    /// `execvp` returned, so the image was not replaced.
    #[error("execvp failed for {program:?}")]
    Failed {
        /// The program that could not be executed.
        program: OsString,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// The OS error text without Rust's `(os error N)` suffix, if any.
    pub fn system_error_text(&self) -> Option<String> {
        match self {
            ExecError::MissingProgram => None,
            ExecError::Failed { source, .. } => Some(match source.raw_os_error() {
                Some(code) => nix::errno::Errno::from_raw(code).desc().to_string(),
                None => source.to_string(),
            }),
        }
    }
}
