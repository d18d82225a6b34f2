//! External command execution.
//!
//! Every subprocess the pipeline starts (bundler, payload materialization,
//! signing, notarization, postject) goes through a [`CommandRunner`], so tests
//! can substitute a fake without spawning processes.

use crate::packager::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::PathBuf;

/// A command line to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    /// Starts an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends a `--flag=value` argument without lossy path conversion.
    pub fn flag_value(mut self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        let mut joined = OsString::from(flag);
        joined.push("=");
        joined.push(value.as_ref());
        self.args.push(joined);
        self
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Human-readable command line.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured result of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
    /// Exit code; None when terminated by a signal
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Capability to run external tools.
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion and captures its output.
    ///
    /// A non-zero exit is NOT an error at this level; see [`run_checked`].
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Resolves `program` on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Runs processes with `tokio::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut command = tokio::process::Command::new(invocation.program());
        command.args(invocation.args());

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(invocation.program().to_string())
            } else {
                Error::GenericError(format!(
                    "failed to execute `{}`: {}",
                    invocation.display(),
                    e
                ))
            }
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}

/// Runs a command, relays its output to the log, and fails on non-zero exit.
///
/// The captured stdout/stderr are logged before the error propagates so the
/// failing tool's own diagnostics are never lost.
pub async fn run_checked<R: CommandRunner>(
    runner: &R,
    invocation: &Invocation,
) -> Result<CommandOutput> {
    log::debug!("Running: {}", invocation.display());
    let output = runner.run(invocation).await?;

    for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
        log::info!("  {}", line);
    }

    if output.success() {
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("  {}", line);
        }
        return Ok(output);
    }

    for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
        log::error!("  {}", line);
    }

    Err(Error::CommandFailed {
        command: invocation.display(),
        code: output.code,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
