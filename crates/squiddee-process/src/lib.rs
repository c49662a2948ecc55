//! External process invocation
//!
//! Every cryptographic and proxy operation squiddee performs is delegated to an
//! external executable (`openssl`, `squid`, the TLS certificate helper). This
//! crate is the single seam through which those executables are run, so that
//! callers can substitute a fake runner in tests.

use std::fmt;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` was terminated by a signal")]
    Signaled { command: String },
}

impl ProcessError {
    /// Exit status of the failed command, when it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Failed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The command line that failed
    pub fn command(&self) -> &str {
        match self {
            ProcessError::Spawn { command, .. }
            | ProcessError::Failed { command, .. }
            | ProcessError::Signaled { command } => command,
        }
    }
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Value following `flag` in the argument list, if any
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Inherit the controlling terminal; nothing is captured
    Foreground,
    /// Capture stdout and stderr
    Captured,
}

/// Result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn exited(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external commands synchronously
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion and report how it exited
    fn run(&self, command: &CommandLine, mode: OutputMode) -> Result<ProcessOutput, ProcessError>;

    /// Run `command` and turn any non-zero exit into a [`ProcessError`]
    fn run_checked(
        &self,
        command: &CommandLine,
        mode: OutputMode,
    ) -> Result<ProcessOutput, ProcessError> {
        let output = self.run(command, mode)?;
        match output.status {
            Some(0) => Ok(output),
            Some(status) => Err(ProcessError::Failed {
                command: command.to_string(),
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            None => Err(ProcessError::Signaled {
                command: command.to_string(),
            }),
        }
    }
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandLine, mode: OutputMode) -> Result<ProcessOutput, ProcessError> {
        debug!("Running {}", command);

        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args());

        let spawn_error = |source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        };

        match mode {
            OutputMode::Foreground => {
                let status = cmd
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .map_err(spawn_error)?;
                Ok(ProcessOutput {
                    status: status.code(),
                    ..Default::default()
                })
            }
            OutputMode::Captured => {
                let output = cmd.output().map_err(spawn_error)?;
                Ok(ProcessOutput {
                    status: output.status.code(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").args(["-c", script])
    }

    #[test]
    fn test_command_line_display() {
        let cmd = CommandLine::new("squid").args(["-f", "squid.conf", "-N"]);
        assert_eq!(cmd.to_string(), "squid -f squid.conf -N");
        assert_eq!(cmd.arg_after("-f"), Some("squid.conf"));
        assert_eq!(cmd.arg_after("-N"), None);
        assert!(cmd.has_arg("-N"));
        assert!(!cmd.has_arg("-z"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captured_output() {
        let runner = SystemProcessRunner::new();
        let cmd = sh("echo out; echo err >&2");

        let output = runner.run(&cmd, OutputMode::Captured).unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_checked_reports_exit_status() {
        let runner = SystemProcessRunner::new();
        let cmd = sh("echo boom >&2; exit 3");

        let err = runner.run_checked(&cmd, OutputMode::Captured).unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.command(), "sh -c echo boom >&2; exit 3");
        match err {
            ProcessError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = SystemProcessRunner::new();
        let cmd = CommandLine::new("/nonexistent/squiddee-test-binary");

        let err = runner.run(&cmd, OutputMode::Captured).unwrap_err();

        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
    }
}
