//! Command-line argument parser using `clap` derive macros.

use clap::Parser;
use reattach_core::{ExecOptions, ReattachOptions};
use std::ffi::OsString;

/// Shown under the usage line when no program is given.
pub const USAGE_TEXT: &str = "\
    Reattach to the per-user bootstrap namespace in its \"Background\"
    session then exec the program with args. If \"-l\" is given,
    rewrite the program's argv[0] so that it starts with a '-'.";

/// Reattach to the per-user bootstrap namespace, then exec a program.
#[derive(Parser, Debug)]
#[command(
    name = "reattach-to-user-namespace",
    version,
    about,
    long_about = USAGE_TEXT
)]
pub struct Cli {
    /// Options for the namespace migration.
    #[command(flatten)]
    pub reattach: ReattachOptions,

    /// Options for building the program's argv.
    #[command(flatten)]
    pub exec: ExecOptions,

    /// The program to run, followed by its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        value_name = "PROGRAM",
        value_parser = clap::value_parser!(OsString)
    )]
    pub command: Vec<OsString>,
}
