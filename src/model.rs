//! Model storage handle
//!
//! One `ModelStorage` owns two open remote objects: a model container (all
//! versions of one logical model) and a single model version. Construction
//! tries to create the container and falls back to reopening it only on a
//! discriminated "already exists" failure; every other create error
//! propagates. At most one version handle is open at a time;
//! [`ModelStorage::get_stage_model`] closes the current one before opening
//! the selected one.

use std::sync::Arc;

use serde::Serialize;

use crate::backend::{HandleInfo, ModelVersionRecord, TrackingBackend};
use crate::credential::ApiToken;
use crate::error::{Error, Result};
use crate::mode::Stage;
use crate::project::Project;
use crate::run::{ExperimentRun, RunInfo};
use crate::tags::IntoTags;

/// Handle on a model container plus one open model version.
#[derive(Debug)]
pub struct ModelStorage<B: TrackingBackend> {
    backend: Arc<B>,
    token: ApiToken,
    project: String,
    container: HandleInfo,
    version: HandleInfo,
    run_info: Option<RunInfo>,
    stopped: bool,
}

impl<B: TrackingBackend> ModelStorage<B> {
    /// Open model storage for `storage_key` under the project.
    ///
    /// The key is normalized to uppercase; the container id is
    /// `"{project_key}-{storage_key}"`. Container creation falls back to
    /// reopen-by-id only when the service reports
    /// [`Error::AlreadyExists`]. With `version: Some(serial)` the exact
    /// version `"{container_id}-{serial}"` is reopened; with `None` the
    /// latest version is opened, creating version 1 in a fresh container.
    ///
    /// Passing a run records its identity snapshot for
    /// [`log_run_info`](Self::log_run_info).
    ///
    /// # Errors
    ///
    /// Returns any container-create failure other than a key conflict, or
    /// any version-open failure.
    pub async fn open(
        project: &Project<B>,
        run: Option<&ExperimentRun<B>>,
        storage_key: &str,
        version: Option<u64>,
    ) -> Result<Self> {
        let storage_key = storage_key.to_uppercase();
        let container_id = format!("{}-{storage_key}", project.key());

        let container = match project
            .backend()
            .create_model_container(project.full_name(), &storage_key, project.token())
            .await
        {
            Ok(info) => {
                tracing::info!(container = %info.id(), "created model container");
                info
            }
            Err(Error::AlreadyExists(_)) => {
                tracing::debug!(container = %container_id, "model container exists, reopening");
                project
                    .backend()
                    .open_model_container(project.full_name(), &container_id, project.token())
                    .await?
            }
            Err(other) => return Err(other),
        };

        let version = match version {
            Some(serial) => {
                let version_id = format!("{container_id}-{serial}");
                project
                    .backend()
                    .open_version(project.full_name(), &version_id, project.token())
                    .await?
            }
            None => {
                project
                    .backend()
                    .open_latest_version(project.full_name(), container.id(), project.token())
                    .await?
            }
        };
        tracing::info!(version = %version.id(), "opened model version");

        Ok(Self {
            backend: Arc::clone(project.backend()),
            token: project.token().clone(),
            project: project.full_name().to_string(),
            container,
            version,
            run_info: run.map(|r| r.run_info().clone()),
            stopped: false,
        })
    }

    /// Container identifier, `"{project_key}-{storage_key}"`.
    #[must_use]
    pub fn container_id(&self) -> &str {
        self.container.id()
    }

    /// Browsable URL of the container.
    #[must_use]
    pub fn container_url(&self) -> &str {
        self.container.url()
    }

    /// Identifier of the currently open model version.
    #[must_use]
    pub fn version_id(&self) -> &str {
        self.version.id()
    }

    /// Browsable URL of the currently open model version.
    #[must_use]
    pub fn version_url(&self) -> &str {
        self.version.url()
    }

    /// Append tags to the container's `sys/tags` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote write fails.
    pub async fn add_container_tags<T: IntoTags>(&self, tags: T) -> Result<()> {
        self.backend
            .add_container_tags(self.container.id(), tags.into_tags())
            .await
    }

    /// Append tags to the open version's `sys/tags` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote write fails.
    pub async fn add_version_tags<T: IntoTags>(&self, tags: T) -> Result<()> {
        self.backend
            .add_version_tags(self.version.id(), tags.into_tags())
            .await
    }

    /// Write a value at a path under the container; last write wins.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the remote write fails.
    pub async fn log_container_value(&self, name: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend
            .write_container_value(self.container.id(), name, value)
            .await
    }

    /// Write a value at a path under the open version; last write wins.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the remote write fails.
    pub async fn log_version_value(&self, name: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend
            .write_version_value(self.version.id(), name, value)
            .await
    }

    /// Write the originating run's `{run_id, run_url}` snapshot under the
    /// open version's `run_info` path. A no-op when no run was supplied at
    /// open time.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote write fails.
    pub async fn log_run_info(&self) -> Result<()> {
        let Some(info) = &self.run_info else {
            return Ok(());
        };
        let value = serde_json::to_value(info)?;
        self.backend
            .write_version_value(self.version.id(), "run_info", value)
            .await
    }

    /// Transition the open version to a lifecycle stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote transition fails.
    pub async fn change_stage(&self, stage: Stage) -> Result<()> {
        self.backend
            .change_version_stage(self.version.id(), stage)
            .await?;
        tracing::info!(version = %self.version.id(), stage = %stage, "changed model stage");
        Ok(())
    }

    /// Fetch the container's full version table.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails.
    pub async fn get_models(&self) -> Result<Vec<ModelVersionRecord>> {
        self.backend.fetch_version_table(self.container.id()).await
    }

    /// Switch the open version to the latest version in `stage`.
    ///
    /// Rows are filtered by stage and the one with the greatest
    /// `sys/modification_time` wins; rows sharing the maximum timestamp are
    /// tie-broken by lexicographically greatest `sys/id`. The current
    /// version handle is closed before the selected one is opened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingVersion`] when no row matches, leaving
    /// the currently open version handle unchanged.
    pub async fn get_stage_model(&mut self, stage: Stage) -> Result<()> {
        let rows = self.backend.fetch_version_table(self.container.id()).await?;
        let selected = rows
            .into_iter()
            .filter(|row| row.stage() == Some(stage))
            .max_by(|a, b| {
                a.modification_time()
                    .cmp(&b.modification_time())
                    .then_with(|| a.id().cmp(b.id()))
            });
        let Some(selected) = selected else {
            return Err(Error::NoMatchingVersion { stage });
        };

        self.backend.close_version(self.version.id()).await?;
        let reopened = self
            .backend
            .open_version(&self.project, selected.id(), &self.token)
            .await?;
        tracing::info!(version = %reopened.id(), stage = %stage, "switched to stage model");
        self.version = reopened;
        Ok(())
    }

    /// Close both the container and the version handle.
    ///
    /// Both closes are always attempted; a failure closing the container
    /// does not prevent the version close, and the first error wins.
    ///
    /// # Errors
    ///
    /// Returns the container-close error or the version-close error, in
    /// that priority.
    pub async fn stop(mut self) -> Result<()> {
        self.stopped = true;
        let container = self.backend.close_container(self.container.id()).await;
        let version = self.backend.close_version(self.version.id()).await;
        tracing::info!(
            container = %self.container.id(),
            version = %self.version.id(),
            "stopped model storage"
        );
        container.and(version)
    }
}

impl<B: TrackingBackend> Drop for ModelStorage<B> {
    fn drop(&mut self) {
        if !self.stopped {
            tracing::warn!(
                container = %self.container.id(),
                version = %self.version.id(),
                "model storage dropped without stop(); remote handles left open"
            );
        }
    }
}
