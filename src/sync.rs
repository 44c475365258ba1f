//! Offline sync invocation
//!
//! Runs opened in [`crate::RunMode::Offline`] stage their writes locally;
//! publishing them requires an external synchronization command. The
//! command is configured explicitly and receives the project's
//! fully-qualified name through the child process environment only - the
//! parent's environment is never mutated.

use crate::error::{Error, Result};

/// Environment variable, set on the child process only, naming the project
/// to synchronize.
pub const SYNC_PROJECT_ENV: &str = "TRUENO_TRACK_PROJECT";

/// External command that publishes an offline run's staged writes.
#[derive(Debug, Clone)]
pub struct SyncCommand {
    program: String,
    args: Vec<String>,
}

impl SyncCommand {
    /// Configure the sync program to invoke.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument to the invocation.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program that will be invoked.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command for the given project and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SyncFailed`] if the program cannot be spawned or
    /// exits non-zero.
    pub async fn invoke(&self, project_full_name: &str) -> Result<()> {
        tracing::info!(command = %self.program, project = %project_full_name, "invoking offline sync");
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env(SYNC_PROJECT_ENV, project_full_name)
            .status()
            .await
            .map_err(|e| Error::SyncFailed(format!("failed to spawn {}: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::SyncFailed(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}
