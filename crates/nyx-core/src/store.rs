//! Recorded build progress between runs.
//!
//! Each package's [`BuildState`] is kept as JSON under
//! `<build_path>/state/<name>-<version>.json`, keyed by the package's
//! qualified name so two versions never share progress. A build that aborted
//! halfway resumes at the failed stage next time instead of starting over.

use std::path::PathBuf;

use nyx_schema::BuildState;

use crate::config::Config;
use crate::environment;
use crate::error::BuildError;
use crate::paths;

/// JSON-file store for package build states.
#[derive(Debug, Clone)]
pub struct StateStore<'a> {
    config: &'a Config,
}

impl<'a> StateStore<'a> {
    /// Store rooted in `config`'s build tree.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Where the state for `key`, a qualified package name, is kept.
    pub fn path(&self, name: &str) -> PathBuf {
        paths::state_file(self.config, name)
    }

    /// Load the recorded state for `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(&self, name: &str) -> Result<Option<BuildState>, BuildError> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let state = serde_json::from_str(&content).map_err(std::io::Error::other)?;
        Ok(Some(state))
    }

    /// Record `state` for `name`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Directory`] or [`BuildError::Io`] if the file
    /// cannot be written.
    pub fn save(&self, name: &str, state: &BuildState) -> Result<(), BuildError> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            environment::ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
