use anyhow::Result;
use reattach_cli::runner;
use reattach_core::logging::{LogConfig, init_logging};
use std::{env, ffi::OsString, process};

fn main() {
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("warning: {e:#}");
        let _ = init_logging(&LogConfig::default());
    }

    let args: Vec<OsString> = env::args_os().collect();
    let exit_code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            1
        }
    };
    process::exit(exit_code);
}

fn run(args: Vec<OsString>) -> Result<i32> {
    runner::run_clap(args).map(runner::ExitCode::code)
}
