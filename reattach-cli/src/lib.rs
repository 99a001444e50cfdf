#![forbid(unsafe_code)]
#![deny(missing_docs)]
//! # Reattach CLI
//!
//! The command-line front end for `reattach-core`. It parses the command
//! line, reattaches the process to the per-user bootstrap namespace through
//! `reattach-core`, and execs the requested program.
//!
//! ## Architecture
//!
//! - **CLI Logic**: argument parsing, validation, usage text and exit codes.
//! - **Core**: release classification, the launchd mechanisms and the exec
//!   itself live in `reattach-core`.

pub mod adapter;
pub mod parser;
pub mod runner;

pub use adapter::adapt_and_validate;
pub use parser::Cli;
pub use runner::ExitCode;
