//! # Trueno-Track: Typed Experiment Tracking & Model Registry Client
//!
//! Trueno-Track is a thin, typed client for a hosted experiment-tracking
//! service: projects, experiment runs, and a model registry with lifecycle
//! stages (`production` / `staging` / `archived`).
//!
//! The remote service is reached through the [`backend::TrackingBackend`]
//! trait. The crate ships [`backend::MemoryBackend`], a complete in-process
//! reference backend with the same observable semantics; a hosted binding
//! implements the same trait.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trueno_track::{ApiToken, ExperimentRun, MemoryBackend, Project, RunMode};
//!
//! # async fn example() -> trueno_track::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! let token = ApiToken::from_env()?;
//!
//! let project = Project::new(backend, token, "acme", "churn-model", "CHURN");
//! project.create().await?;
//!
//! let run = ExperimentRun::open(&project, RunMode::Async).await?;
//! run.add_tags(["baseline", "lightgbm"]).await?;
//! run.log_value("parameters", serde_json::json!({"lr": 0.001})).await?;
//! run.log_series("train", "loss", 0.42).await?;
//! run.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod backend;
pub mod credential;
pub mod error;
pub mod mode;
pub mod model;
pub mod project;
pub mod run;
pub mod sync;
pub mod tags;

pub use backend::{MemoryBackend, ModelVersionRecord, TrackingBackend};
pub use credential::ApiToken;
pub use error::{Error, Result};
pub use mode::{RunMode, Stage};
pub use model::ModelStorage;
pub use project::Project;
pub use run::{ExperimentRun, RunInfo};
pub use sync::SyncCommand;
