//! In-memory tracking backend
//!
//! Reference implementation of [`TrackingBackend`] over `DashMap`
//! registries. Data is lost on process restart; the point is observable
//! semantics identical to the hosted service: handle registries with open
//! flags, append-only series, last-write-wins values, per-mode write
//! routing, and version tables with modification timestamps.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use super::{HandleInfo, ModelVersionRecord, SeriesPoint, TrackingBackend, UploadedFile};
use crate::credential::ApiToken;
use crate::error::{Error, Result};
use crate::mode::{RunMode, Stage};

/// Append tags, skipping ones already present. Order of first appearance is
/// kept.
fn merge_tags(dst: &mut Vec<String>, tags: Vec<String>) {
    for tag in tags {
        if !dst.contains(&tag) {
            dst.push(tag);
        }
    }
}

#[derive(Debug, Default)]
struct RunData {
    tags: Vec<String>,
    values: HashMap<String, serde_json::Value>,
    series: HashMap<String, Vec<SeriesPoint>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl RunData {
    fn absorb(&mut self, staged: Self) {
        merge_tags(&mut self.tags, staged.tags);
        self.values.extend(staged.values);
        for (path, points) in staged.series {
            self.series.entry(path).or_default().extend(points);
        }
        for (path, files) in staged.files {
            self.files.entry(path).or_default().extend(files);
        }
    }
}

#[derive(Debug)]
struct RunState {
    mode: RunMode,
    open: bool,
    committed: RunData,
    staged: RunData,
}

impl RunState {
    /// Which buffer a write lands in, if any. Debug runs discard writes,
    /// read-only runs reject them, offline runs stage until close.
    fn writable(&mut self, run_id: &str) -> Result<Option<&mut RunData>> {
        match self.mode {
            RunMode::Debug => Ok(None),
            RunMode::ReadOnly => Err(Error::ReadOnlyRun(run_id.to_string())),
            RunMode::Offline => Ok(Some(&mut self.staged)),
            RunMode::Async | RunMode::Sync => Ok(Some(&mut self.committed)),
        }
    }
}

#[derive(Debug)]
struct ProjectState {
    key: String,
    run_seq: u64,
}

#[derive(Debug)]
struct ContainerState {
    project: String,
    open: bool,
    tags: Vec<String>,
    values: HashMap<String, serde_json::Value>,
    version_seq: u64,
}

#[derive(Debug)]
struct VersionState {
    container: String,
    serial: u64,
    open: bool,
    stage: Option<Stage>,
    tags: Vec<String>,
    values: HashMap<String, serde_json::Value>,
    modification_time: DateTime<Utc>,
}

/// In-process tracking backend backed by lock-free concurrent hashmaps.
///
/// Run ids derive from the project key (`CHURN-1`, `CHURN-2`, ...);
/// container ids from project key and storage key (`CHURN-MDL`); version
/// ids append a serial (`CHURN-MDL-3`).
///
/// Beyond the [`TrackingBackend`] surface, the type exposes inspection
/// accessors (committed state only) used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    projects: DashMap<String, ProjectState>,
    runs: DashMap<String, RunState>,
    containers: DashMap<String, ContainerState>,
    versions: DashMap<String, VersionState>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of projects currently registered.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Whether a project exists under the given fully-qualified name.
    #[must_use]
    pub fn contains_project(&self, full_name: &str) -> bool {
        self.projects.contains_key(full_name)
    }

    /// Whether the run handle is currently open.
    #[must_use]
    pub fn is_run_open(&self, run_id: &str) -> bool {
        self.runs.get(run_id).is_some_and(|r| r.open)
    }

    /// Whether the container handle is currently open.
    #[must_use]
    pub fn is_container_open(&self, container_id: &str) -> bool {
        self.containers.get(container_id).is_some_and(|c| c.open)
    }

    /// Whether the version handle is currently open.
    #[must_use]
    pub fn is_version_open(&self, version_id: &str) -> bool {
        self.versions.get(version_id).is_some_and(|v| v.open)
    }

    /// Committed tags of a run.
    #[must_use]
    pub fn run_tags(&self, run_id: &str) -> Option<Vec<String>> {
        self.runs.get(run_id).map(|r| r.committed.tags.clone())
    }

    /// Committed value at a path under a run.
    #[must_use]
    pub fn run_value(&self, run_id: &str, path: &str) -> Option<serde_json::Value> {
        self.runs
            .get(run_id)
            .and_then(|r| r.committed.values.get(path).cloned())
    }

    /// Committed series points at a path under a run.
    #[must_use]
    pub fn run_series(&self, run_id: &str, path: &str) -> Option<Vec<SeriesPoint>> {
        self.runs
            .get(run_id)
            .and_then(|r| r.committed.series.get(path).cloned())
    }

    /// Committed upload records at a path under a run.
    #[must_use]
    pub fn run_files(&self, run_id: &str, path: &str) -> Option<Vec<UploadedFile>> {
        self.runs
            .get(run_id)
            .and_then(|r| r.committed.files.get(path).cloned())
    }

    /// Tags of a model container.
    #[must_use]
    pub fn container_tags(&self, container_id: &str) -> Option<Vec<String>> {
        self.containers.get(container_id).map(|c| c.tags.clone())
    }

    /// Value at a path under a model container.
    #[must_use]
    pub fn container_value(&self, container_id: &str, path: &str) -> Option<serde_json::Value> {
        self.containers
            .get(container_id)
            .and_then(|c| c.values.get(path).cloned())
    }

    /// Tags of a model version.
    #[must_use]
    pub fn version_tags(&self, version_id: &str) -> Option<Vec<String>> {
        self.versions.get(version_id).map(|v| v.tags.clone())
    }

    /// Value at a path under a model version.
    #[must_use]
    pub fn version_value(&self, version_id: &str, path: &str) -> Option<serde_json::Value> {
        self.versions
            .get(version_id)
            .and_then(|v| v.values.get(path).cloned())
    }

    /// Lifecycle stage of a model version; outer `None` means the version
    /// does not exist.
    #[must_use]
    pub fn version_stage(&self, version_id: &str) -> Option<Option<Stage>> {
        self.versions.get(version_id).map(|v| v.stage)
    }

    fn open_run_state(&self, run_id: &str) -> Result<RefMut<'_, String, RunState>> {
        let state = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::UnknownHandle(run_id.to_string()))?;
        if state.open {
            Ok(state)
        } else {
            Err(Error::AlreadyClosed(run_id.to_string()))
        }
    }

    fn open_container_state(
        &self,
        container_id: &str,
    ) -> Result<RefMut<'_, String, ContainerState>> {
        let state = self
            .containers
            .get_mut(container_id)
            .ok_or_else(|| Error::UnknownHandle(container_id.to_string()))?;
        if state.open {
            Ok(state)
        } else {
            Err(Error::AlreadyClosed(container_id.to_string()))
        }
    }

    fn open_version_state(&self, version_id: &str) -> Result<RefMut<'_, String, VersionState>> {
        let state = self
            .versions
            .get_mut(version_id)
            .ok_or_else(|| Error::UnknownHandle(version_id.to_string()))?;
        if state.open {
            Ok(state)
        } else {
            Err(Error::AlreadyClosed(version_id.to_string()))
        }
    }

    fn project_key(&self, project: &str) -> Result<String> {
        self.projects
            .get(project)
            .map(|p| p.key.clone())
            .ok_or_else(|| Error::Remote(format!("project {project} not found")))
    }
}

impl TrackingBackend for MemoryBackend {
    async fn list_projects(&self, _token: &ApiToken) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.projects.iter().map(|p| p.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn create_project(&self, full_name: &str, key: &str, _token: &ApiToken) -> Result<()> {
        match self.projects.entry(full_name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("project {full_name}"))),
            Entry::Vacant(slot) => {
                slot.insert(ProjectState {
                    key: key.to_string(),
                    run_seq: 0,
                });
                Ok(())
            }
        }
    }

    async fn delete_project(&self, full_name: &str, _token: &ApiToken) -> Result<()> {
        self.projects
            .remove(full_name)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownHandle(format!("project {full_name}")))
    }

    async fn open_run(&self, project: &str, _token: &ApiToken, mode: RunMode) -> Result<HandleInfo> {
        let (key, seq) = {
            let mut state = self
                .projects
                .get_mut(project)
                .ok_or_else(|| Error::Remote(format!("project {project} not found")))?;
            state.run_seq += 1;
            (state.key.clone(), state.run_seq)
        };

        let id = format!("{key}-{seq}");
        let url = format!("memory://{project}/e/{id}");
        self.runs.insert(
            id.clone(),
            RunState {
                mode,
                open: true,
                committed: RunData::default(),
                staged: RunData::default(),
            },
        );
        Ok(HandleInfo::new(id, url))
    }

    async fn add_run_tags(&self, run_id: &str, tags: Vec<String>) -> Result<()> {
        let mut state = self.open_run_state(run_id)?;
        if let Some(data) = state.writable(run_id)? {
            merge_tags(&mut data.tags, tags);
        }
        Ok(())
    }

    async fn write_run_value(
        &self,
        run_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut state = self.open_run_state(run_id)?;
        if let Some(data) = state.writable(run_id)? {
            data.values.insert(path.to_string(), value);
        }
        Ok(())
    }

    async fn append_run_series(&self, run_id: &str, path: &str, value: f64) -> Result<()> {
        let mut state = self.open_run_state(run_id)?;
        if let Some(data) = state.writable(run_id)? {
            data.series
                .entry(path.to_string())
                .or_default()
                .push(SeriesPoint::new(value));
        }
        Ok(())
    }

    async fn upload_run_files(
        &self,
        run_id: &str,
        path: &str,
        files: Vec<PathBuf>,
    ) -> Result<()> {
        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let meta = std::fs::metadata(&file)?;
            let name = file
                .file_name()
                .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
            records.push(UploadedFile::new(name, meta.len()));
        }

        let mut state = self.open_run_state(run_id)?;
        if let Some(data) = state.writable(run_id)? {
            data.files.entry(path.to_string()).or_default().extend(records);
        }
        Ok(())
    }

    async fn close_run(&self, run_id: &str) -> Result<()> {
        let mut state = self.open_run_state(run_id)?;
        if state.mode == RunMode::Offline {
            let staged = std::mem::take(&mut state.staged);
            state.committed.absorb(staged);
        }
        state.open = false;
        Ok(())
    }

    async fn create_model_container(
        &self,
        project: &str,
        storage_key: &str,
        _token: &ApiToken,
    ) -> Result<HandleInfo> {
        let key = self.project_key(project)?;
        let id = format!("{key}-{storage_key}");
        match self.containers.entry(id.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!("model container {id}"))),
            Entry::Vacant(slot) => {
                slot.insert(ContainerState {
                    project: project.to_string(),
                    open: true,
                    tags: Vec::new(),
                    values: HashMap::new(),
                    version_seq: 0,
                });
                let url = format!("memory://{project}/m/{id}");
                Ok(HandleInfo::new(id, url))
            }
        }
    }

    async fn open_model_container(
        &self,
        project: &str,
        container_id: &str,
        _token: &ApiToken,
    ) -> Result<HandleInfo> {
        let mut state = self
            .containers
            .get_mut(container_id)
            .ok_or_else(|| Error::UnknownHandle(container_id.to_string()))?;
        state.open = true;
        Ok(HandleInfo::new(
            container_id,
            format!("memory://{project}/m/{container_id}"),
        ))
    }

    async fn add_container_tags(&self, container_id: &str, tags: Vec<String>) -> Result<()> {
        let mut state = self.open_container_state(container_id)?;
        merge_tags(&mut state.tags, tags);
        Ok(())
    }

    async fn write_container_value(
        &self,
        container_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut state = self.open_container_state(container_id)?;
        state.values.insert(path.to_string(), value);
        Ok(())
    }

    async fn close_container(&self, container_id: &str) -> Result<()> {
        let mut state = self.open_container_state(container_id)?;
        state.open = false;
        Ok(())
    }

    async fn create_version(
        &self,
        project: &str,
        container_id: &str,
        _token: &ApiToken,
    ) -> Result<HandleInfo> {
        let serial = {
            let mut container = self
                .containers
                .get_mut(container_id)
                .ok_or_else(|| Error::UnknownHandle(container_id.to_string()))?;
            container.version_seq += 1;
            container.version_seq
        };
        let id = format!("{container_id}-{serial}");
        self.versions.insert(
            id.clone(),
            VersionState {
                container: container_id.to_string(),
                serial,
                open: true,
                stage: None,
                tags: Vec::new(),
                values: HashMap::new(),
                modification_time: Utc::now(),
            },
        );
        let url = format!("memory://{project}/m/{container_id}/v/{id}");
        Ok(HandleInfo::new(id, url))
    }

    async fn open_latest_version(
        &self,
        project: &str,
        container_id: &str,
        token: &ApiToken,
    ) -> Result<HandleInfo> {
        if !self.containers.contains_key(container_id) {
            return Err(Error::UnknownHandle(container_id.to_string()));
        }

        let latest = self
            .versions
            .iter()
            .filter(|v| v.value().container == container_id)
            .map(|v| (v.value().serial, v.key().clone()))
            .max();

        let Some((_, id)) = latest else {
            return self.create_version(project, container_id, token).await;
        };
        self.versions
            .get_mut(&id)
            .ok_or_else(|| Error::UnknownHandle(id.clone()))?
            .open = true;

        let url = format!("memory://{project}/m/{container_id}/v/{id}");
        Ok(HandleInfo::new(id, url))
    }

    async fn open_version(
        &self,
        project: &str,
        version_id: &str,
        _token: &ApiToken,
    ) -> Result<HandleInfo> {
        let container = {
            let mut state = self
                .versions
                .get_mut(version_id)
                .ok_or_else(|| Error::UnknownHandle(version_id.to_string()))?;
            state.open = true;
            state.container.clone()
        };
        Ok(HandleInfo::new(
            version_id,
            format!("memory://{project}/m/{container}/v/{version_id}"),
        ))
    }

    async fn add_version_tags(&self, version_id: &str, tags: Vec<String>) -> Result<()> {
        let mut state = self.open_version_state(version_id)?;
        merge_tags(&mut state.tags, tags);
        state.modification_time = Utc::now();
        Ok(())
    }

    async fn write_version_value(
        &self,
        version_id: &str,
        path: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut state = self.open_version_state(version_id)?;
        state.values.insert(path.to_string(), value);
        state.modification_time = Utc::now();
        Ok(())
    }

    async fn change_version_stage(&self, version_id: &str, stage: Stage) -> Result<()> {
        let mut state = self.open_version_state(version_id)?;
        state.stage = Some(stage);
        state.modification_time = Utc::now();
        Ok(())
    }

    async fn fetch_version_table(&self, container_id: &str) -> Result<Vec<ModelVersionRecord>> {
        if !self.containers.contains_key(container_id) {
            return Err(Error::UnknownHandle(container_id.to_string()));
        }

        let mut rows: Vec<(u64, ModelVersionRecord)> = self
            .versions
            .iter()
            .filter(|v| v.value().container == container_id)
            .map(|v| {
                let state = v.value();
                let attributes: serde_json::Map<String, serde_json::Value> = state
                    .values
                    .iter()
                    .map(|(k, val)| (k.clone(), val.clone()))
                    .collect();
                (
                    state.serial,
                    ModelVersionRecord::new(
                        v.key().clone(),
                        state.stage,
                        state.modification_time,
                        attributes,
                    ),
                )
            })
            .collect();
        rows.sort_by_key(|(serial, _)| *serial);
        Ok(rows.into_iter().map(|(_, record)| record).collect())
    }

    async fn close_version(&self, version_id: &str) -> Result<()> {
        let mut state = self.open_version_state(version_id)?;
        state.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> ApiToken {
        ApiToken::new("test-token")
    }

    async fn backend_with_project() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .create_project("acme/churn", "CHURN", &token())
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_offline_writes_invisible_until_close() {
        let backend = backend_with_project().await;
        let run = backend
            .open_run("acme/churn", &token(), RunMode::Offline)
            .await
            .unwrap();

        backend
            .append_run_series(run.id(), "train/loss", 0.5)
            .await
            .unwrap();
        assert!(backend.run_series(run.id(), "train/loss").is_none());

        backend.close_run(run.id()).await.unwrap();
        let points = backend.run_series(run.id(), "train/loss").unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].value() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_debug_writes_are_discarded() {
        let backend = backend_with_project().await;
        let run = backend
            .open_run("acme/churn", &token(), RunMode::Debug)
            .await
            .unwrap();

        backend
            .write_run_value(run.id(), "parameters", serde_json::json!({"lr": 0.1}))
            .await
            .unwrap();
        backend.close_run(run.id()).await.unwrap();

        assert!(backend.run_value(run.id(), "parameters").is_none());
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let backend = backend_with_project().await;
        let run = backend
            .open_run("acme/churn", &token(), RunMode::ReadOnly)
            .await
            .unwrap();

        let err = backend
            .append_run_series(run.id(), "train/loss", 0.5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyRun(_)));
    }

    #[tokio::test]
    async fn test_tag_merge_is_set_like() {
        let backend = backend_with_project().await;
        let run = backend
            .open_run("acme/churn", &token(), RunMode::Async)
            .await
            .unwrap();

        backend
            .add_run_tags(run.id(), vec!["a".into(), "b".into()])
            .await
            .unwrap();
        backend
            .add_run_tags(run.id(), vec!["b".into(), "c".into()])
            .await
            .unwrap();

        assert_eq!(backend.run_tags(run.id()).unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_container_create_conflict_then_reopen() {
        let backend = backend_with_project().await;
        let tok = token();

        let created = backend
            .create_model_container("acme/churn", "MDL", &tok)
            .await
            .unwrap();
        assert_eq!(created.id(), "CHURN-MDL");

        let err = backend
            .create_model_container("acme/churn", "MDL", &tok)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let reopened = backend
            .open_model_container("acme/churn", "CHURN-MDL", &tok)
            .await
            .unwrap();
        assert_eq!(reopened.id(), "CHURN-MDL");
    }

    #[tokio::test]
    async fn test_latest_version_creates_then_reopens() {
        let backend = backend_with_project().await;
        let tok = token();

        backend
            .create_model_container("acme/churn", "MDL", &tok)
            .await
            .unwrap();

        let first = backend
            .open_latest_version("acme/churn", "CHURN-MDL", &tok)
            .await
            .unwrap();
        assert_eq!(first.id(), "CHURN-MDL-1");

        backend.close_version(first.id()).await.unwrap();
        let again = backend
            .open_latest_version("acme/churn", "CHURN-MDL", &tok)
            .await
            .unwrap();
        assert_eq!(again.id(), "CHURN-MDL-1");
        assert!(backend.is_version_open("CHURN-MDL-1"));
    }

    #[tokio::test]
    async fn test_stage_change_bumps_modification_time() {
        let backend = backend_with_project().await;
        let tok = token();

        backend
            .create_model_container("acme/churn", "MDL", &tok)
            .await
            .unwrap();
        let version = backend
            .open_latest_version("acme/churn", "CHURN-MDL", &tok)
            .await
            .unwrap();

        let before = backend.fetch_version_table("CHURN-MDL").await.unwrap()[0]
            .modification_time();
        backend
            .change_version_stage(version.id(), Stage::Staging)
            .await
            .unwrap();
        let rows = backend.fetch_version_table("CHURN-MDL").await.unwrap();

        assert_eq!(rows[0].stage(), Some(Stage::Staging));
        assert!(rows[0].modification_time() >= before);
    }

    #[tokio::test]
    async fn test_version_table_includes_closed_versions() {
        let backend = backend_with_project().await;
        let tok = token();

        backend
            .create_model_container("acme/churn", "MDL", &tok)
            .await
            .unwrap();
        let version = backend
            .open_latest_version("acme/churn", "CHURN-MDL", &tok)
            .await
            .unwrap();
        backend.close_version(version.id()).await.unwrap();

        let rows = backend.fetch_version_table("CHURN-MDL").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), "CHURN-MDL-1");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let backend = backend_with_project().await;
        let run = backend
            .open_run("acme/churn", &token(), RunMode::Async)
            .await
            .unwrap();

        let err = backend
            .upload_run_files(
                run.id(),
                "files",
                vec![PathBuf::from("no-such-file-anywhere.bin")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
