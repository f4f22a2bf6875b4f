//! Subcommands and the package loading they share.

pub mod build;
pub mod clean;
pub mod info;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nyx_core::{Config, StateStore};
use nyx_schema::PackageDescriptor;

use crate::PackageArgs;

/// Descriptor file looked for when a directory is given.
pub const DESCRIPTOR_FILE: &str = "package.json";

/// A loaded package and the configuration it is built under.
#[derive(Debug)]
pub struct Session {
    /// Build configuration.
    pub config: Config,
    /// The package, with its recorded progress applied.
    pub package: PackageDescriptor,
}

impl Session {
    /// Load the configuration, the descriptor and any recorded progress.
    pub fn open(config_path: &Path, args: &PackageArgs) -> Result<Self> {
        let config = Config::from_file(config_path).context("failed to load configuration")?;

        let descriptor = descriptor_path(&args.descriptor);
        let identifier = match &args.id {
            Some(id) => id.clone(),
            None => default_identifier(&descriptor)?,
        };
        let mut package = PackageDescriptor::from_json_file(&identifier, &descriptor)
            .with_context(|| format!("failed to load descriptor {}", descriptor.display()))?;

        if !package.supports(&config.target) {
            bail!(
                "{} does not support {} (supports: {})",
                package.qualified_name(),
                config.target,
                package.architectures.join(", ")
            );
        }

        let store = StateStore::new(&config);
        match store.load(&package.qualified_name())? {
            Some(state) => package.state = state,
            None => package.state.architecture.clone_from(&config.target),
        }

        Ok(Self { config, package })
    }

    /// Record the package's current progress.
    pub fn save(&self) -> Result<()> {
        let key = self.package.qualified_name();
        StateStore::new(&self.config)
            .save(&key, &self.package.state)
            .with_context(|| format!("failed to record progress for {key}"))
    }
}

/// `path` itself, or its `package.json` if it is a directory.
pub fn descriptor_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DESCRIPTOR_FILE)
    } else {
        path.to_path_buf()
    }
}

/// The name of the directory holding the descriptor.
pub fn default_identifier(descriptor: &Path) -> Result<String> {
    let dir = nyx_core::paths::absolute(descriptor)
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned());
    match dir {
        Some(name) if !name.is_empty() => Ok(name),
        _ => bail!(
            "cannot derive a package identifier from {}; pass --id",
            descriptor.display()
        ),
    }
}
