//! External command execution

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::DoxyError;

/// A single external command of the build-and-run sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

impl BuildStep {
    pub fn new<I, S>(program: &str, args: I, current_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: current_dir.into(),
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(cd {} && {}", self.current_dir.display(), self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, ")")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Diagnostic for a step that exited unsuccessfully
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub step: BuildStep,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    pub fn new(step: BuildStep, output: CommandOutput) -> Self {
        Self {
            step,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    /// Plain-text report returned to the HTTP caller
    pub fn report(&self) -> String {
        format!(
            "Error running command: {}\ncommand:\n{}\nstdout:\n{}\nstderr:\n{}",
            self.status(),
            self.step,
            self.stdout,
            self.stderr
        )
    }

    fn status(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command {} failed with {}", self.step, self.status())
    }
}

/// Runs build steps. Implemented over real processes in production and
/// scripted in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a step to completion and capture its output. Returns `Err` only
    /// when the process could not be spawned at all.
    async fn run(&self, step: &BuildStep) -> Result<CommandOutput, DoxyError>;
}

/// Runs steps as child processes via tokio
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, step: &BuildStep) -> Result<CommandOutput, DoxyError> {
        debug!("Running {}", step);

        // never killed on drop: a step that outlives its caller runs to the end
        let output = Command::new(&step.program)
            .args(&step.args)
            .current_dir(&step.current_dir)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
