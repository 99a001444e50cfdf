//! Host platform identification.

use crate::namespace::ReattachOptions;
use anyhow::{Context, Result};
use nix::sys::utsname::uname;

/// The `uname` sysname and release of the host, or of an override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// e.g. `Darwin`.
    pub sysname: String,
    /// e.g. `13.2.0`.
    pub release: String,
}

impl Platform {
    /// A platform with the given identifiers.
    pub fn new(sysname: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            sysname: sysname.into(),
            release: release.into(),
        }
    }

    /// Reads the running kernel's identifiers.
    pub fn detect() -> Result<Self> {
        let uts = uname().context("uname failed")?;
        Ok(Self::new(
            uts.sysname().to_string_lossy(),
            uts.release().to_string_lossy(),
        ))
    }

    /// The host platform with any overrides from `options` applied.
    ///
    /// If `uname` fails and no override is given, the release is left empty,
    /// which classifies as unparsable.
    pub fn resolve(options: &ReattachOptions) -> Self {
        let detected = match (&options.sysname, &options.release) {
            (Some(sysname), Some(release)) => return Self::new(sysname, release),
            _ => Self::detect().unwrap_or_else(|e| {
                tracing::warn!("{e:#}");
                Self::new("", "")
            }),
        };
        Self {
            sysname: options.sysname.clone().unwrap_or(detected.sysname),
            release: options.release.clone().unwrap_or(detected.release),
        }
    }
}
