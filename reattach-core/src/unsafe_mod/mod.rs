#![deny(missing_docs)]
//! reattach-unsafe
//!
//! This module holds every `unsafe` call in the crate: the runtime-resolved
//! launchd and mach entry points behind [`crate::mechanism::Launchd`].

pub mod launchd;

pub use launchd::SystemLaunchd;
