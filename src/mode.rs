//! Run modes and model lifecycle stages
//!
//! Both selectors are closed enums. The hosted service speaks lowercase
//! strings (`"async"`, `"read-only"`, `"production"`, ...); parsing is
//! case-insensitive and an unmatched name is a typed error, never a silent
//! no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Connection mode for an experiment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Writes are buffered and flushed in the background (default).
    #[default]
    Async,
    /// Every write blocks until acknowledged by the service.
    Sync,
    /// Writes are staged locally; publishing requires an explicit sync step.
    Offline,
    /// Writes are accepted and discarded (dry-run).
    Debug,
    /// Writes are rejected; the run is opened for reading only.
    ReadOnly,
}

impl RunMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::Sync => "sync",
            Self::Offline => "offline",
            Self::Debug => "debug",
            Self::ReadOnly => "read-only",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "async" => Ok(Self::Async),
            "sync" => Ok(Self::Sync),
            "offline" => Ok(Self::Offline),
            "debug" => Ok(Self::Debug),
            "read-only" => Ok(Self::ReadOnly),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

/// Lifecycle stage of a model version.
///
/// A freshly created version has no stage (`Option<Stage>::None` in the
/// version table) until an explicit stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Serving production traffic.
    Production,
    /// Candidate under evaluation.
    Staging,
    /// Retired; kept for provenance.
    Archived,
}

impl Stage {
    /// Wire name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "archived" => Ok(Self::Archived),
            _ => Err(Error::UnknownStage(s.to_string())),
        }
    }
}
