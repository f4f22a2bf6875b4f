//! Package descriptors.
//!
//! A descriptor is loaded in two steps. [`PackageDescriptor::new`] builds a
//! descriptor from the package identifier alone, then
//! [`PackageDescriptor::load`] overlays a [`DescriptorPayload`] parsed from
//! the package's JSON file. Keys absent from the JSON take the payload
//! defaults, so a minimal descriptor only names the package.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ANY_ARCH;
use crate::state::{BuildState, StateError, Transition};
use crate::version::{PackageVersion, parse_version};

/// Errors that can occur when loading a package descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// The descriptor file could not be read.
    #[error("failed to read descriptor {path}: {source}")]
    Io {
        /// Descriptor file that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The JSON content does not match the descriptor schema.
    #[error("invalid descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where a package's build output ends up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    /// Installed into the target system root through `DESTDIR` staging.
    #[default]
    Sysroot,
    /// A host tool, built with the native toolchain into the tool root.
    Tool,
    /// Part of the initial ramdisk; staged like a sysroot package.
    Initrd,
}

impl InstallType {
    /// Lowercase name as written in descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sysroot => "sysroot",
            Self::Tool => "tool",
            Self::Initrd => "initrd",
        }
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a package's source code is obtained.
///
/// Unknown strategies are kept verbatim rather than rejected at load time;
/// acquisition refuses them when the build reaches that stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// Source already lives under the configured source root and is built
    /// out of tree.
    #[default]
    Local,
    /// Source under the source root is copied into the build tree first.
    LocalCopy,
    /// Source is shallow-cloned from a git remote.
    Git,
    /// Source is downloaded over HTTP.
    Http,
    /// Any strategy this builder does not know.
    Other(String),
}

impl SourceKind {
    /// Name as written in descriptors.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::LocalCopy => "local_copy",
            Self::Git => "git",
            Self::Http => "http",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for SourceKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "local" => Self::Local,
            "local_copy" => Self::LocalCopy,
            "git" => Self::Git,
            "http" => Self::Http,
            _ => Self::Other(s),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location for a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Acquisition strategy.
    pub kind: SourceKind,
    /// Path under the source root, or remote URI for git/http.
    pub path: String,
    /// Git branch to clone when no tag is given.
    pub branch: String,
    /// Git tag to clone; takes precedence over `branch` when non-empty.
    pub tag: String,
}

impl SourceSpec {
    /// The git ref to clone: the tag when set, the branch otherwise.
    pub fn git_ref(&self) -> &str {
        if self.tag.is_empty() {
            &self.branch
        } else {
            &self.tag
        }
    }
}

/// Command templates for the three step phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps {
    /// Run before building, typically `configure` or `cmake`.
    pub configure: Vec<String>,
    /// Compile steps.
    pub build: Vec<String>,
    /// Steps that install build output into the staging directory.
    pub package: Vec<String>,
}

/// On-disk descriptor shape. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorPayload {
    /// Package name; an empty name leaves the identifier-derived name.
    pub name: String,
    /// Supported architectures, `"*"` for all.
    pub architecture: Vec<String>,
    /// Short human-readable summary.
    pub description: String,
    /// Identifiers of packages this one depends on.
    pub depends_on: Vec<String>,
    /// Patch files, relative to the descriptor's directory, in apply order.
    pub patches: Vec<PathBuf>,
    /// Environment overrides for every step of this package.
    pub environment: BTreeMap<String, String>,
    /// Install target classification.
    pub install_type: InstallType,
    /// Configure command templates.
    pub configure_steps: Vec<String>,
    /// Build command templates.
    pub build_steps: Vec<String>,
    /// Package command templates.
    pub package_steps: Vec<String>,
    /// Path prefix under the target root.
    pub install_root: String,
    /// Source acquisition strategy.
    pub acquisition: SourceKind,
    /// Source path or URI.
    pub src_uri: String,
    /// Git branch.
    pub git_branch: String,
    /// Git tag.
    pub git_tag: String,
}

impl Default for DescriptorPayload {
    fn default() -> Self {
        Self {
            name: String::new(),
            architecture: vec![ANY_ARCH.to_string()],
            description: String::new(),
            depends_on: Vec::new(),
            patches: Vec::new(),
            environment: BTreeMap::new(),
            install_type: InstallType::Sysroot,
            configure_steps: Vec::new(),
            build_steps: Vec::new(),
            package_steps: Vec::new(),
            install_root: "/".to_string(),
            acquisition: SourceKind::Local,
            src_uri: String::new(),
            git_branch: "master".to_string(),
            git_tag: String::new(),
        }
    }
}

/// Everything the builder knows about one package.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: String,
    /// Version parsed from the identifier the package was created with.
    pub version: PackageVersion,
    /// Build progress.
    pub state: BuildState,
    /// Short human-readable summary.
    pub description: String,
    /// Supported architectures, `"*"` for all.
    pub architectures: Vec<String>,
    /// Install target classification.
    pub install_type: InstallType,
    /// Identifiers of packages this one depends on.
    pub dependencies: Vec<String>,
    /// Patch files relative to [`Self::descriptor_dir`], in apply order.
    pub patches: Vec<PathBuf>,
    /// Step command templates.
    pub steps: Steps,
    /// Path prefix under the target root.
    pub install_root: String,
    /// Source location.
    pub source: SourceSpec,
    /// Per-package environment overrides.
    pub environment: BTreeMap<String, String>,
    /// Directory holding the descriptor file; patches resolve against it.
    pub descriptor_dir: PathBuf,
}

impl PackageDescriptor {
    /// Create a descriptor with default settings for `identifier`.
    ///
    /// The version is taken from the identifier's suffix and is not changed
    /// by a later [`load`](Self::load).
    pub fn new(identifier: &str, descriptor_dir: impl Into<PathBuf>) -> Self {
        let mut descriptor = Self {
            name: identifier.to_string(),
            version: parse_version(identifier),
            state: BuildState::default(),
            description: String::new(),
            architectures: Vec::new(),
            install_type: InstallType::default(),
            dependencies: Vec::new(),
            patches: Vec::new(),
            steps: Steps::default(),
            install_root: String::new(),
            source: SourceSpec {
                kind: SourceKind::default(),
                path: String::new(),
                branch: String::new(),
                tag: String::new(),
            },
            environment: BTreeMap::new(),
            descriptor_dir: descriptor_dir.into(),
        };
        descriptor.load(DescriptorPayload::default());
        descriptor
    }

    /// Overwrite settings from a parsed payload.
    pub fn load(&mut self, payload: DescriptorPayload) {
        if !payload.name.is_empty() {
            self.name = payload.name;
        }
        self.architectures = payload.architecture;
        self.description = payload.description;
        self.dependencies = payload.depends_on;
        self.patches = payload.patches;
        self.environment = payload.environment;
        self.install_type = payload.install_type;
        self.steps = Steps {
            configure: payload.configure_steps,
            build: payload.build_steps,
            package: payload.package_steps,
        };
        self.install_root = payload.install_root;
        self.source = SourceSpec {
            kind: payload.acquisition,
            path: payload.src_uri,
            branch: payload.git_branch,
            tag: payload.git_tag,
        };
    }

    /// Create a descriptor for `identifier` from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] if the JSON does not match the
    /// descriptor schema.
    pub fn from_json_str(
        identifier: &str,
        descriptor_dir: impl Into<PathBuf>,
        content: &str,
    ) -> Result<Self, DescriptorError> {
        let payload: DescriptorPayload = serde_json::from_str(content)?;
        let mut descriptor = Self::new(identifier, descriptor_dir);
        descriptor.load(payload);
        Ok(descriptor)
    }

    /// Create a descriptor for `identifier` from a JSON file. Patches are
    /// resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Io`] if the file cannot be read, or
    /// [`DescriptorError::Parse`] if its content is invalid.
    pub fn from_json_file(identifier: &str, path: &Path) -> Result<Self, DescriptorError> {
        let content = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json_str(identifier, dir, &content)
    }

    /// `name-version`, or the bare name for an unversioned package.
    pub fn qualified_name(&self) -> String {
        self.version.qualify(&self.name)
    }

    /// Whether the package can be built for `arch`.
    pub fn supports(&self, arch: &str) -> bool {
        self.architectures
            .iter()
            .any(|a| a == ANY_ARCH || a == arch)
    }

    /// Whether any patches are declared.
    pub fn needs_patch(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Whether configure or build steps are declared.
    pub fn has_build_steps(&self) -> bool {
        !self.steps.configure.is_empty() || !self.steps.build.is_empty()
    }

    /// Record a transition in this package's build state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if an earlier stage has not completed.
    pub fn record(&mut self, transition: Transition) -> Result<(), StateError> {
        let needs_patch = self.needs_patch();
        self.state.record(transition, needs_patch)
    }

    /// Human-readable description lines, one setting per line.
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!(
                "Package {} for {}",
                self.qualified_name(),
                self.state.architecture
            ),
            format!("Install Type: {}", self.install_type),
            format!("install root: {}", self.install_root),
            format!("supports: {}", self.architectures.join(", ")),
            format!("depends on: {}", self.dependencies.join(", ")),
            format!("patches: {}", self.patches.len()),
            format!(
                "steps: configure={} build={} package={}",
                self.steps.configure.len(),
                self.steps.build.len(),
                self.steps.package.len()
            ),
            format!(
                "source: {} {} (ref {})",
                self.source.kind,
                self.source.path,
                self.source.git_ref()
            ),
            format!("environment: {} override(s)", self.environment.len()),
        ]
    }
}
