//! Builder configuration.
//!
//! Read from TOML:
//!
//! ```toml
//! target = "x86_64"
//! host_type = "build"
//!
//! [build_env]
//! source_path = "src"
//! build_path = "build"
//! system_root = "sysroot"
//! tool_path = "tools"
//! package_cache = "packages"
//! log_path = "build/logs"   # optional
//! strict_patches = false    # optional
//!
//! [ci_env]                  # one table per host type
//! package_cache = "/srv/nyx/packages"
//! ```
//!
//! Archives are written to `<host_type>_env.package_cache`, falling back to
//! `build_env.package_cache` when no such table or key exists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

const DEFAULT_HOST_TYPE: &str = "build";

/// Directory layout and switches shared by every package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEnv {
    /// Root under which `local` and `local_copy` sources live.
    pub source_path: PathBuf,
    /// Root of the build tree (`src/`, `tmp/build/`, `tmp/install/`).
    pub build_path: PathBuf,
    /// Target system root packages install into.
    pub system_root: PathBuf,
    /// Root of the isolated host tool tree.
    pub tool_path: PathBuf,
    /// Directory packaging makes sure exists before archiving.
    pub package_cache: PathBuf,
    /// Directory for per-package step logs. Steps write to the terminal
    /// when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Treat a patch that fails to apply as a build failure.
    #[serde(default)]
    pub strict_patches: bool,
}

/// Per-host-type settings, the `[<host_type>_env]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostEnv {
    /// Where archives for this host type are stored.
    #[serde(default)]
    pub package_cache: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target architecture; steps see `$TARGET` as `<target>-umbra`.
    pub target: String,
    /// Selects the `[<host_type>_env]` table for archive lookup.
    #[serde(default = "default_host_type")]
    pub host_type: String,
    /// Build tree layout.
    pub build_env: BuildEnv,
    /// Remaining `*_env` tables keyed by their full name.
    #[serde(flatten)]
    pub host_envs: BTreeMap<String, HostEnv>,
}

fn default_host_type() -> String {
    DEFAULT_HOST_TYPE.to_string()
}

impl Config {
    /// Conventional layout with every directory under `root`.
    pub fn rooted(root: &Path, target: &str) -> Self {
        Self {
            target: target.to_string(),
            host_type: default_host_type(),
            build_env: BuildEnv {
                source_path: root.join("src"),
                build_path: root.join("build"),
                system_root: root.join("sysroot"),
                tool_path: root.join("tools"),
                package_cache: root.join("packages"),
                log_path: None,
                strict_patches: false,
            },
            host_envs: BTreeMap::new(),
        }
    }

    /// Parse a TOML configuration. Relative paths are kept as written and
    /// resolved against the working directory when used.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, BuildError> {
        toml::from_str(content).map_err(|e| BuildError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, BuildError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// `TARGET` as seen by step templates.
    pub fn target_triple(&self) -> String {
        format!("{}-umbra", self.target)
    }

    /// Archive directory for the configured host type.
    pub fn host_package_cache(&self) -> &Path {
        self.host_envs
            .get(&format!("{}_env", self.host_type))
            .and_then(|env| env.package_cache.as_deref())
            .unwrap_or(&self.build_env.package_cache)
    }
}
