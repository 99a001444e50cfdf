//! Turns parsed [`Cli`] arguments into the option sets `reattach-core` takes.

use crate::parser::Cli;
use anyhow::{Result, bail};
use reattach_core::{ExecOptions, ReattachOptions};
use std::ffi::OsString;

/// The validated configuration: migration options, exec options, command.
type Config = (ReattachOptions, ExecOptions, Vec<OsString>);

/// Validates `cli` and splits it into the pieces the core library needs.
pub fn adapt_and_validate(cli: Cli) -> Result<Config> {
    let Some(program) = cli.command.first() else {
        bail!("no program given");
    };
    if program.is_empty() {
        bail!("program name is empty");
    }

    let mut reattach = cli.reattach;
    if reattach
        .release
        .as_ref()
        .is_some_and(|release| release.trim().is_empty())
    {
        // An empty REATTACH_RELEASE means "detect".
        reattach.release = None;
    }

    Ok((reattach, cli.exec, cli.command))
}
