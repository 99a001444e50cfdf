//! This module provides the `run_clap` function to execute the CLI application.

use crate::{Cli, adapt_and_validate};
use anyhow::Result;
use clap::Parser;
use clap::error::{ContextKind, ErrorKind};
use reattach_core::ExecError;
use std::ffi::OsString;
use tracing::error;

use crate::parser::USAGE_TEXT;

/// How the process ends when it does not become the target program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Help or version was printed.
    Success,
    /// No program, or a malformed argument.
    Usage,
    /// An option we do not know.
    UnparsedOption,
    /// The program could not be executed.
    ExecFailed,
}

impl ExitCode {
    /// The numeric process exit status.
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::Usage => 1,
            ExitCode::UnparsedOption => 2,
            ExitCode::ExecFailed => 3,
        }
    }
}

/// Runs the CLI application with the provided arguments.
///
/// On success the process is replaced and this never returns.
pub fn run_clap(args: Vec<OsString>) -> Result<ExitCode> {
    let program_name = args
        .first()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reattach-to-user-namespace".to_string());

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => return Ok(report_parse_error(&program_name, &e)),
    };

    let (reattach_options, exec_options, command) = match adapt_and_validate(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            print_usage(&program_name);
            return Ok(ExitCode::Usage);
        }
    };

    let err = reattach_core::run(&reattach_options, &exec_options, command);
    match &err {
        ExecError::Failed { .. } => match err.system_error_text() {
            Some(text) => error!("{err}: {text}"),
            None => error!("{err}"),
        },
        ExecError::MissingProgram => {
            error!("{err}");
            print_usage(&program_name);
            return Ok(ExitCode::Usage);
        }
    }
    Ok(ExitCode::ExecFailed)
}

fn report_parse_error(program_name: &str, err: &clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::Success
        }
        ErrorKind::UnknownArgument => {
            match err.get(ContextKind::InvalidArg) {
                Some(arg) => error!("unknown option: {arg}"),
                None => error!("unknown option"),
            }
            print_usage(program_name);
            ExitCode::UnparsedOption
        }
        _ => {
            error!("{}", first_line(err));
            print_usage(program_name);
            ExitCode::Usage
        }
    }
}

fn first_line(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string()
}

fn print_usage(program_name: &str) {
    eprintln!("usage: {program_name} [-l] <program> [args...]\n\n{USAGE_TEXT}");
}
