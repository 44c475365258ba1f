//! Project handle
//!
//! A project is identified remotely by `"{workspace}/{name}"` plus an
//! uppercase short key; the key prefixes every identifier the service
//! derives for the project's runs and model storage. Create and delete are
//! membership-checked, so repeating either is a no-op rather than an error.

use std::sync::Arc;

use crate::backend::TrackingBackend;
use crate::credential::ApiToken;
use crate::error::Result;

/// Handle on a remote project, the scope for runs and model storage.
pub struct Project<B> {
    backend: Arc<B>,
    token: ApiToken,
    full_name: String,
    key: String,
}

impl<B: TrackingBackend> Project<B> {
    /// Create a handle for `"{workspace}/{name}"`.
    ///
    /// `key` is normalized to uppercase. No remote call is made until
    /// [`create`](Self::create) or a downstream handle is opened.
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        token: ApiToken,
        workspace: &str,
        name: &str,
        key: &str,
    ) -> Self {
        Self {
            backend,
            token,
            full_name: format!("{workspace}/{name}"),
            key: key.to_uppercase(),
        }
    }

    /// Create the project remotely if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the project list cannot be fetched or creation
    /// fails remotely. An existing project is not an error.
    pub async fn create(&self) -> Result<()> {
        let projects = self.backend.list_projects(&self.token).await?;
        if projects.iter().any(|name| name == &self.full_name) {
            tracing::debug!(project = %self.full_name, "project already exists, skipping create");
            return Ok(());
        }
        self.backend
            .create_project(&self.full_name, &self.key, &self.token)
            .await?;
        tracing::info!(project = %self.full_name, key = %self.key, "created project");
        Ok(())
    }

    /// Delete the project remotely if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the project list cannot be fetched or deletion
    /// fails remotely. An absent project is not an error.
    pub async fn delete(&self) -> Result<()> {
        let projects = self.backend.list_projects(&self.token).await?;
        if !projects.iter().any(|name| name == &self.full_name) {
            tracing::debug!(project = %self.full_name, "project already absent, skipping delete");
            return Ok(());
        }
        self.backend
            .delete_project(&self.full_name, &self.token)
            .await?;
        tracing::info!(project = %self.full_name, "deleted project");
        Ok(())
    }

    /// Fully-qualified project name, `"{workspace}/{name}"`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Uppercase project key used to derive storage identifiers.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub(crate) fn token(&self) -> &ApiToken {
        &self.token
    }
}
