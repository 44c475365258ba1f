//! Tracking service boundary
//!
//! [`TrackingBackend`] is the seam between the typed handles and the hosted
//! tracking service: project management, run lifecycle, and the model
//! registry (containers, versions, stage transitions, version tables). The
//! handles in [`crate::project`], [`crate::run`], and [`crate::model`] are
//! generic over this trait.
//!
//! [`MemoryBackend`] is the in-process reference implementation - same
//! observable semantics, no network. A hosted binding implements the same
//! trait against the real service.
//!
//! # Example
//!
//! ```rust
//! use trueno_track::backend::{MemoryBackend, TrackingBackend};
//! use trueno_track::{ApiToken, RunMode};
//!
//! # async fn example() -> trueno_track::Result<()> {
//! let backend = MemoryBackend::new();
//! let token = ApiToken::new("tok");
//!
//! backend.create_project("acme/churn", "CHURN", &token).await?;
//! let run = backend.open_run("acme/churn", &token, RunMode::Async).await?;
//! backend.append_run_series(run.id(), "train/loss", 0.5).await?;
//! backend.close_run(run.id()).await?;
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryBackend;

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::ApiToken;
use crate::error::Result;
use crate::mode::{RunMode, Stage};

/// Identity of an open remote object: service-assigned id plus a browsable
/// URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    id: String,
    url: String,
}

impl HandleInfo {
    /// Create a handle descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Service-assigned identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Browsable URL of the remote object.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One point of an append-only metric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    value: f64,
    logged_at: DateTime<Utc>,
}

impl SeriesPoint {
    /// Create a point stamped with the current wall-clock time.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            value,
            logged_at: Utc::now(),
        }
    }

    /// Metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Wall-clock time the point was logged.
    #[must_use]
    pub const fn logged_at(&self) -> DateTime<Utc> {
        self.logged_at
    }
}

/// A file transmitted to run storage, recorded as identity plus size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    name: String,
    size_bytes: u64,
}

impl UploadedFile {
    /// Create an upload record.
    #[must_use]
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }

    /// File name as stored under the run.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the file in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// One row of a model container's version table.
///
/// Field names follow the service's system namespace (`sys/id`,
/// `sys/stage`, `sys/modification_time`); logged attributes are flattened
/// alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersionRecord {
    #[serde(rename = "sys/id")]
    id: String,
    #[serde(rename = "sys/stage")]
    stage: Option<Stage>,
    #[serde(rename = "sys/modification_time")]
    modification_time: DateTime<Utc>,
    #[serde(flatten)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl ModelVersionRecord {
    /// Create a version-table row.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        stage: Option<Stage>,
        modification_time: DateTime<Utc>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            stage,
            modification_time,
            attributes,
        }
    }

    /// Version identifier (`sys/id`).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lifecycle stage (`sys/stage`), `None` before any transition.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Last mutation time (`sys/modification_time`).
    #[must_use]
    pub const fn modification_time(&self) -> DateTime<Utc> {
        self.modification_time
    }

    /// Logged attributes of the version.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }
}

/// Capability surface of the hosted tracking service.
///
/// Every method maps to one remote call. Ids are service-assigned strings;
/// writes against an id that was closed fail with
/// [`crate::Error::AlreadyClosed`], unknown ids with
/// [`crate::Error::UnknownHandle`].
pub trait TrackingBackend: Send + Sync {
    /// List fully-qualified names of existing projects.
    fn list_projects(&self, token: &ApiToken) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Create a project under its fully-qualified name.
    ///
    /// Fails with [`crate::Error::AlreadyExists`] on a name conflict.
    fn create_project(
        &self,
        full_name: &str,
        key: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a project by fully-qualified name.
    fn delete_project(
        &self,
        full_name: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Open a new run under a project in the given mode.
    fn open_run(
        &self,
        project: &str,
        token: &ApiToken,
        mode: RunMode,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Append tags to a run's `sys/tags` set.
    fn add_run_tags(
        &self,
        run_id: &str,
        tags: Vec<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write a value at a path under a run; last write wins.
    fn write_run_value(
        &self,
        run_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append one point to a run's metric series at the given path.
    fn append_run_series(
        &self,
        run_id: &str,
        path: &str,
        value: f64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Transmit local files to a storage path under a run.
    fn upload_run_files(
        &self,
        run_id: &str,
        path: &str,
        files: Vec<PathBuf>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flush and close a run.
    fn close_run(&self, run_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Create a model container keyed by `storage_key` under a project.
    ///
    /// The service derives the container id from the project key and the
    /// storage key. Fails with [`crate::Error::AlreadyExists`] if the key
    /// is taken; that is the only failure a caller may treat as "reopen
    /// instead".
    fn create_model_container(
        &self,
        project: &str,
        storage_key: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Reopen an existing model container by id.
    fn open_model_container(
        &self,
        project: &str,
        container_id: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Append tags to a container's `sys/tags` set.
    fn add_container_tags(
        &self,
        container_id: &str,
        tags: Vec<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write a value at a path under a container; last write wins.
    fn write_container_value(
        &self,
        container_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Close a container handle.
    fn close_container(&self, container_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Create a fresh version in a container; the service assigns the next
    /// serial.
    fn create_version(
        &self,
        project: &str,
        container_id: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Open the latest version of a container, creating version 1 if the
    /// container has none.
    fn open_latest_version(
        &self,
        project: &str,
        container_id: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Reopen an exact model version by id.
    fn open_version(
        &self,
        project: &str,
        version_id: &str,
        token: &ApiToken,
    ) -> impl Future<Output = Result<HandleInfo>> + Send;

    /// Append tags to a version's `sys/tags` set.
    fn add_version_tags(
        &self,
        version_id: &str,
        tags: Vec<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Write a value at a path under a version; last write wins.
    fn write_version_value(
        &self,
        version_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Transition a version to a lifecycle stage.
    fn change_version_stage(
        &self,
        version_id: &str,
        stage: Stage,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the full version table of a container.
    fn fetch_version_table(
        &self,
        container_id: &str,
    ) -> impl Future<Output = Result<Vec<ModelVersionRecord>>> + Send;

    /// Close a version handle.
    fn close_version(&self, version_id: &str) -> impl Future<Output = Result<()>> + Send;
}
