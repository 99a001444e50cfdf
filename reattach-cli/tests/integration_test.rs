//! Integration tests for the reattach-to-user-namespace CLI.
//!
//! These run on any Unix host. Off Darwin none of the launchd entry points
//! exist, which exercises the "migration failed, exec anyway" path.

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// The CLI with a clean logging and release environment.
fn reattach_cmd() -> Command {
    let mut cmd = Command::cargo_bin("reattach-to-user-namespace").expect("binary not found");
    cmd.env_remove("REATTACH_RELEASE").env_remove("REATTACH_LOG");
    cmd
}

// --- Exec ---

#[test]
fn test_execs_program_even_when_reattach_fails() -> Result<()> {
    reattach_cmd()
        .arg("--release")
        .arg("garbage")
        .arg("/bin/echo")
        .arg("hi")
        .assert()
        .success()
        .stdout("hi\n")
        .stderr(predicate::str::contains(
            "warning: unparsable major release number: 'garbage'",
        ))
        .stderr(predicate::str::contains("warning: unable to reattach"));
    Ok(())
}

#[test]
fn test_exit_status_is_the_programs() -> Result<()> {
    reattach_cmd()
        .arg("/bin/sh")
        .arg("-c")
        .arg("exit 7")
        .assert()
        .code(7);
    Ok(())
}

#[test]
fn test_arguments_pass_through_in_order() -> Result<()> {
    reattach_cmd()
        .arg("--no-reattach")
        .arg("/bin/sh")
        .arg("-c")
        .arg("printf '%s|' \"$@\"")
        .arg("sh")
        .arg("-l")
        .arg("a b")
        .arg("--")
        .assert()
        .success()
        .stdout("-l|a b|--|")
        .stderr(predicate::str::is_empty());
    Ok(())
}

#[test]
fn test_program_is_searched_on_path() -> Result<()> {
    reattach_cmd()
        .arg("--no-reattach")
        .arg("echo")
        .arg("found")
        .assert()
        .success()
        .stdout("found\n");
    Ok(())
}

#[test]
fn test_login_mode_prefixes_argv0() -> Result<()> {
    // With -c and no further operands, the shell's $0 is its own argv[0].
    reattach_cmd()
        .env("HOME", "/nonexistent")
        .env_remove("ENV")
        .arg("--no-reattach")
        .arg("-l")
        .arg("/bin/sh")
        .arg("-c")
        .arg("echo \"$0\"")
        .assert()
        .success()
        .stdout(predicate::str::ends_with("-sh\n"));
    Ok(())
}

#[test]
fn test_mid_release_scenario() -> Result<()> {
    reattach_cmd()
        .arg("--sysname")
        .arg("Darwin")
        .arg("--release")
        .arg("10.9")
        .arg("-l")
        .arg("/bin/echo")
        .arg("hi")
        .assert()
        .success()
        .stdout("hi\n");
    Ok(())
}

#[test]
fn test_oversized_marketing_release_still_runs_program() -> Result<()> {
    reattach_cmd()
        .arg("--sysname")
        .arg("Darwin")
        .arg("--release")
        .arg("10.4294967295")
        .arg("/bin/echo")
        .arg("ran")
        .assert()
        .success()
        .stdout("ran\n")
        .stderr(predicate::str::contains("warning:"))
        .stderr(predicate::str::contains("panicked").not());
    Ok(())
}

#[test]
fn test_manager_check_lookup_on_request() -> Result<()> {
    reattach_cmd()
        .arg("--sysname")
        .arg("Darwin")
        .arg("--release")
        .arg("19.6.0")
        .arg("--modern-lookup")
        .arg("manager-check")
        .arg("/bin/echo")
        .arg("hi")
        .assert()
        .success()
        .stdout("hi\n");
    Ok(())
}

#[test]
fn test_release_from_environment() -> Result<()> {
    reattach_cmd()
        .env("REATTACH_RELEASE", "garbage")
        .arg("/bin/true")
        .assert()
        .success()
        .stderr(predicate::str::contains("'garbage'"));
    Ok(())
}

// --- Failures ---

#[test]
fn test_missing_program_is_exec_failure() -> Result<()> {
    reattach_cmd()
        .arg("--no-reattach")
        .arg("/nonexistent/reattach-test-binary")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("fatal: execvp failed"))
        .stderr(predicate::str::contains("No such file or directory"));
    Ok(())
}

#[test]
fn test_no_arguments_is_usage_error() -> Result<()> {
    reattach_cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("usage:"))
        .stderr(predicate::str::contains("Background"));
    Ok(())
}

#[test]
fn test_unknown_option_is_distinct_error() -> Result<()> {
    reattach_cmd()
        .arg("-x")
        .arg("/bin/echo")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fatal: unknown option: -x"));
    Ok(())
}

#[test]
fn test_version_flag() -> Result<()> {
    reattach_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}
