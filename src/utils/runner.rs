// src/utils/runner.rs: runs one external command to completion and logs its wall-clock time

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::process::Command;

use crate::config::defs::Diagnostic;
use crate::utils::command::ToolCommand;
use crate::utils::file::ensure_dir;


#[derive(Debug, Clone, PartialEq)]
pub enum ExitState {
    Success,
    Failed { code: Option<i32> },
    SpawnFailed(String),
}

/// Result of a single invocation. Elapsed time is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub command: String,
    pub elapsed: f64,
    pub state: ExitState,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == ExitState::Success
    }

    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let detail = match &self.state {
            ExitState::Success => return None,
            ExitState::Failed { code: Some(code) } => format!("exit status {}", code),
            ExitState::Failed { code: None } => "terminated by signal".to_string(),
            ExitState::SpawnFailed(e) => format!("could not start: {}", e),
        };
        Some(Diagnostic::ToolFailure {
            command: self.command.clone(),
            detail,
        })
    }
}

/// Elapsed time and best-effort failures accumulated by one stage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StageReport {
    pub elapsed: f64,
    pub invocations: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl StageReport {
    pub fn add_outcome(&mut self, outcome: &CommandOutcome) {
        self.elapsed += outcome.elapsed;
        self.invocations += 1;
        if let Some(diagnostic) = outcome.diagnostic() {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn missing(&mut self, context: impl Into<String>) {
        let context = context.into();
        warn!("{}", context);
        self.diagnostics.push(Diagnostic::MissingInput(context));
    }

    pub fn file_error(&mut self, path: &Path, detail: impl Display) {
        warn!("Skipping {}: {}", path.display(), detail);
        self.diagnostics.push(Diagnostic::FileError {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        });
    }

    pub fn merge(&mut self, other: StageReport) {
        self.elapsed += other.elapsed;
        self.invocations += other.invocations;
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Executes commands one at a time and appends a timing block per command to the execution log.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    log_path: PathBuf,
}

impl CommandRunner {
    pub fn new(log_path: &Path) -> Self {
        Self {
            log_path: log_path.to_path_buf(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Runs `cmd` and waits for it. Never fails: a non-zero exit or a spawn error
    /// is logged and reflected in the returned ExitState.
    ///
    /// # Arguments
    ///
    /// * `cmd` - Program, arguments and optional working directory.
    ///
    /// # Returns
    /// CommandOutcome with elapsed seconds.
    pub async fn execute(&self, cmd: &ToolCommand) -> CommandOutcome {
        let command = cmd.to_string();
        info!("Running command: {}", command);
        let start = Instant::now();

        let mut process = Command::new(&cmd.program);
        process
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &cmd.cwd {
            process.current_dir(dir);
        }

        let state = match process.status().await {
            Ok(status) if status.success() => ExitState::Success,
            Ok(status) => {
                error!("Error occurred: {} exited with {}", cmd.program, status);
                ExitState::Failed { code: status.code() }
            }
            Err(e) => {
                error!("Error occurred: failed to spawn {}: {}", cmd.program, e);
                ExitState::SpawnFailed(e.to_string())
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        info!("Command finished in {:.2} seconds", elapsed);

        if let Err(e) = self.append_log(&command, elapsed) {
            warn!("Could not append to execution log {}: {}", self.log_path.display(), e);
        }

        CommandOutcome { command, elapsed, state }
    }

    fn append_log(&self, command: &str, elapsed: f64) -> io::Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }
        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        write!(log_file, "Command: {}\nElapsed time: {:.2} seconds\n\n", command, elapsed)?;
        debug!("Appended timing for '{}' to {}", command, self.log_path.display());
        Ok(())
    }
}
