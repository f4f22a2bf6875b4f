//! Errors raised while building a package.

use std::path::PathBuf;

use nyx_schema::StateError;
use thiserror::Error;

/// A stage failure. Any of these aborts the current package's pipeline.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Source could not be fetched, copied or cloned, or the strategy is
    /// not supported.
    #[error("failed to acquire source for {package}: {reason}")]
    Acquisition { package: String, reason: String },

    /// A configure, build or package command exited non-zero.
    #[error("step {index} of {package} exited with {}: {command}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Step {
        package: String,
        index: usize,
        command: String,
        code: Option<i32>,
    },

    /// A patch file could not be read or did not apply.
    #[error("failed to apply {} to {package}: {reason}", .patch.display())]
    Patch {
        package: String,
        patch: PathBuf,
        reason: String,
    },

    /// The staging tree could not be archived.
    #[error("failed to package {package}: {reason}")]
    Packaging { package: String, reason: String },

    /// The external install action failed.
    #[error("failed to install {package}: {reason}")]
    Install { package: String, reason: String },

    /// The external clean action failed.
    #[error("failed to clean {package}: {reason}")]
    Clean { package: String, reason: String },

    /// A build directory could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A step template referenced an unknown placeholder or was malformed.
    #[error("invalid step template `{template}`: {reason}")]
    Template { template: String, reason: String },

    /// A shell command could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Recorded progress is inconsistent or a transition was refused.
    #[error(transparent)]
    State(#[from] StateError),

    /// Any other I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Create an acquisition failure for `package`.
    pub fn acquisition(package: &str, reason: impl std::fmt::Display) -> Self {
        Self::Acquisition {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a packaging failure for `package`.
    pub fn packaging(package: &str, reason: impl std::fmt::Display) -> Self {
        Self::Packaging {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }
}
