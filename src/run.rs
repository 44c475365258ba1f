//! Experiment run handle
//!
//! A run is opened under a project in a chosen [`RunMode`] and mutated
//! through tag, value, series, and upload operations; each maps to one
//! remote call. `stop(self)` consumes the handle, so a second close cannot
//! compile; the backend additionally rejects raw-id access after close.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::TrackingBackend;
use crate::error::Result;
use crate::mode::RunMode;
use crate::project::Project;
use crate::sync::SyncCommand;
use crate::tags::IntoTags;

/// Identity snapshot of a run: service-assigned id and browsable URL.
///
/// Written verbatim into model versions as provenance metadata by
/// [`crate::ModelStorage::log_run_info`]; the snapshot is denormalized, not
/// a live link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    run_id: String,
    run_url: String,
}

impl RunInfo {
    /// Create a snapshot.
    #[must_use]
    pub fn new(run_id: impl Into<String>, run_url: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            run_url: run_url.into(),
        }
    }

    /// Service-assigned run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Browsable URL of the run.
    #[must_use]
    pub fn run_url(&self) -> &str {
        &self.run_url
    }
}

/// Handle on an open remote experiment run.
pub struct ExperimentRun<B: TrackingBackend> {
    backend: Arc<B>,
    project: String,
    info: RunInfo,
    mode: RunMode,
    sync: Option<SyncCommand>,
    stopped: bool,
}

impl<B: TrackingBackend> ExperimentRun<B> {
    /// Open a new run under the project.
    ///
    /// Returns as soon as the service assigns an id and URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote open fails (for instance when the
    /// project does not exist).
    pub async fn open(project: &Project<B>, mode: RunMode) -> Result<Self> {
        let handle = project
            .backend()
            .open_run(project.full_name(), project.token(), mode)
            .await?;
        tracing::info!(run = %handle.id(), url = %handle.url(), mode = %mode, "opened experiment run");
        Ok(Self {
            backend: Arc::clone(project.backend()),
            project: project.full_name().to_string(),
            info: RunInfo::new(handle.id(), handle.url()),
            mode,
            sync: None,
            stopped: false,
        })
    }

    /// Attach the sync command invoked by [`stop`](Self::stop) when the run
    /// was opened in [`RunMode::Offline`].
    #[must_use]
    pub fn with_sync_command(mut self, command: SyncCommand) -> Self {
        self.sync = Some(command);
        self
    }

    /// Identity snapshot of this run.
    #[must_use]
    pub const fn run_info(&self) -> &RunInfo {
        &self.info
    }

    /// Mode the run was opened in.
    #[must_use]
    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// Append one or many tags to the run's `sys/tags` set.
    ///
    /// A single string and a sequence of strings produce the same tag set.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote write fails.
    pub async fn add_tags<T: IntoTags>(&self, tags: T) -> Result<()> {
        self.backend
            .add_run_tags(self.info.run_id(), tags.into_tags())
            .await
    }

    /// Write a value at the path `name`; a later write to the same path
    /// replaces the value wholesale (no merge).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the remote write fails.
    pub async fn log_value(&self, name: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend
            .write_run_value(self.info.run_id(), name, value)
            .await
    }

    /// Append one point to the series `"{name}/{metric}"`.
    ///
    /// N calls produce exactly N points, kept in call order.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote append fails.
    pub async fn log_series(&self, name: &str, metric: &str, value: f64) -> Result<()> {
        let path = format!("{name}/{metric}");
        self.backend
            .append_run_series(self.info.run_id(), &path, value)
            .await
    }

    /// Transmit local files to the storage path `name` under the run.
    ///
    /// # Errors
    ///
    /// Returns an error if a local file is missing or the transfer fails.
    pub async fn upload<I, P>(&self, name: &str, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        self.backend
            .upload_run_files(self.info.run_id(), name, files)
            .await
    }

    /// Flush and close the run.
    ///
    /// For a run opened in [`RunMode::Offline`] with a sync command
    /// attached, the command is invoked first; a sync failure does not
    /// prevent the close from being attempted, and the first error wins.
    ///
    /// # Errors
    ///
    /// Returns the sync error or the close error, in that priority.
    pub async fn stop(mut self) -> Result<()> {
        self.stopped = true;
        let synced = if self.mode == RunMode::Offline {
            match &self.sync {
                Some(command) => command.invoke(&self.project).await,
                None => Ok(()),
            }
        } else {
            Ok(())
        };
        let closed = self.backend.close_run(self.info.run_id()).await;
        tracing::info!(run = %self.info.run_id(), "stopped experiment run");
        synced.and(closed)
    }
}

impl<B: TrackingBackend> Drop for ExperimentRun<B> {
    fn drop(&mut self) {
        if !self.stopped {
            tracing::warn!(
                run = %self.info.run_id(),
                "experiment run dropped without stop(); remote handle left open"
            );
        }
    }
}
