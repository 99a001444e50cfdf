//! # Reattach Configuration Types
//!
//! Options that control how (and whether) the process is moved into the
//! per-user bootstrap namespace before exec.

use crate::release::ModernLookup;
#[cfg(feature = "cli")]
use clap::Args;

/// Configuration for the namespace migration step.
///
/// By default the release and sysname are read from `uname`, and the
/// migration is attempted.
#[cfg_attr(feature = "cli", derive(Args))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReattachOptions {
    /// Classify this release instead of the running kernel's
    #[cfg_attr(
        feature = "cli",
        arg(long, value_name = "RELEASE", env = "REATTACH_RELEASE")
    )]
    pub release: Option<String>,
    /// Treat the host as this sysname instead of the running kernel's
    #[cfg_attr(feature = "cli", arg(long, value_name = "SYSNAME", hide = true))]
    pub sysname: Option<String>,
    /// Use this lookup on modern releases instead of the one the release selects
    #[cfg_attr(
        feature = "cli",
        arg(long, value_enum, value_name = "LOOKUP", hide = true)
    )]
    pub modern_lookup: Option<ModernLookup>,
    /// Skip the namespace migration and only exec the program
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_reattach: bool,
}

impl ReattachOptions {
    /// Options that classify `release` as if it came from a Darwin host.
    pub fn for_release(release: impl Into<String>) -> Self {
        Self {
            release: Some(release.into()),
            sysname: Some(crate::release::EXPECTED_SYSNAME.to_string()),
            modern_lookup: None,
            no_reattach: false,
        }
    }
}
