//! # Process Replacement
//!
//! Builds the final argument vector for the target program and replaces the
//! current process image with it.

use crate::errors::ExecError;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::process::CommandExt;
use std::process::Command;

#[cfg(feature = "cli")]
use clap::Args;

/// Options for the exec step.
#[cfg_attr(feature = "cli", derive(Args))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Rewrite the program's argv[0] so that it starts with a '-', like a login shell
    #[cfg_attr(feature = "cli", arg(short = 'l', long = "login"))]
    pub login: bool,
}

/// The program to run and the exact argv it will see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecPlan {
    program: OsString,
    argv: Vec<OsString>,
}

impl ExecPlan {
    /// The path or name searched for on `PATH`.
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// The argument vector, argv[0] included.
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }
}

/// `-` followed by the part of `program` after its last `/`.
///
/// The whole of `program` is used when it has no `/` or ends in one.
pub fn login_arg0(program: &OsStr) -> OsString {
    let bytes = program.as_bytes();
    let base = match bytes.iter().rposition(|&b| b == b'/') {
        Some(slash) if slash + 1 < bytes.len() => &bytes[slash + 1..],
        _ => bytes,
    };
    let mut arg0 = Vec::with_capacity(base.len() + 1);
    arg0.push(b'-');
    arg0.extend_from_slice(base);
    OsString::from_vec(arg0)
}

/// Builds the exec plan from the command-line tail starting at the program.
///
/// Outside login mode the tail is used as argv unchanged. In login mode
/// argv[0] becomes [`login_arg0`] of the program and the rest pass through.
pub fn build_exec_plan<I, S>(remaining_args: I, login: bool) -> Result<ExecPlan, ExecError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut argv: Vec<OsString> = remaining_args.into_iter().map(Into::into).collect();
    let Some(program) = argv.first().cloned() else {
        return Err(ExecError::MissingProgram);
    };
    if login {
        argv[0] = login_arg0(&program);
    }
    Ok(ExecPlan { program, argv })
}

/// Replaces the current process with the plan's program.
///
/// The program is searched for on `PATH` like `execvp`. This only returns if
/// the exec failed.
pub fn exec(plan: ExecPlan) -> ExecError {
    let mut command = Command::new(&plan.program);
    command.arg0(&plan.argv[0]).args(&plan.argv[1..]);

    let source = command.exec();
    ExecError::Failed {
        program: plan.program,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(argv: &[OsString]) -> Vec<&str> {
        argv.iter().map(|a| a.to_str().unwrap()).collect()
    }

    #[test]
    fn login_arg0_takes_basename() {
        assert_eq!(login_arg0(OsStr::new("/usr/local/bin/foo")), "-foo");
        assert_eq!(login_arg0(OsStr::new("foo")), "-foo");
    }

    #[test]
    fn login_arg0_falls_back_to_whole_path_on_empty_basename() {
        assert_eq!(login_arg0(OsStr::new("/usr/bin/")), "-/usr/bin/");
        assert_eq!(login_arg0(OsStr::new("/")), "-/");
        assert_eq!(login_arg0(OsStr::new("")), "-");
    }

    #[test]
    fn plain_mode_keeps_tail_unchanged() {
        let plan = build_exec_plan(["myprogram", "-x", "--", "a b"], false).unwrap();
        assert_eq!(plan.program(), "myprogram");
        assert_eq!(strings(plan.argv()), ["myprogram", "-x", "--", "a b"]);
    }

    #[test]
    fn login_mode_rewrites_only_argv0() {
        let plan = build_exec_plan(["/bin/echo", "hi", "there"], true).unwrap();
        assert_eq!(plan.program(), "/bin/echo");
        assert_eq!(strings(plan.argv()), ["-echo", "hi", "there"]);
    }

    #[test]
    fn empty_tail_is_missing_program() {
        let err = build_exec_plan(Vec::<OsString>::new(), true).unwrap_err();
        assert!(matches!(err, ExecError::MissingProgram));
    }

    #[test]
    fn non_utf8_arguments_survive() {
        let raw = OsString::from_vec(vec![b'/', b'x', 0xff]);
        let plan = build_exec_plan([raw.clone()], true).unwrap();
        assert_eq!(plan.program(), raw.as_os_str());
        assert_eq!(plan.argv()[0], OsString::from_vec(vec![b'-', b'x', 0xff]));
    }

    #[test]
    fn failed_exec_returns_error_with_program() {
        let plan = build_exec_plan(["/nonexistent/reattach-test-binary"], false).unwrap();
        match exec(plan) {
            ExecError::Failed { program, source } => {
                assert_eq!(program, "/nonexistent/reattach-test-binary");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
