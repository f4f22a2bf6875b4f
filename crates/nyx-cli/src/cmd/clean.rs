//! Clean command

use std::path::Path;

use anyhow::{Context, Result};
use nyx_core::{BuildOrchestrator, Environment};

use super::Session;
use crate::PackageArgs;
use crate::actions::DefaultActions;

/// Uninstall a package, delete its archive and remove build leftovers.
pub fn clean(config_path: &Path, args: &PackageArgs) -> Result<()> {
    let mut session = Session::open(config_path, args)?;
    let base_env: Environment = std::env::vars().collect();
    let actions = DefaultActions;

    let result = BuildOrchestrator::new(&session.config, &base_env, &actions)
        .clean(&mut session.package);
    session.save()?;

    result.with_context(|| format!("failed to clean {}", session.package.qualified_name()))
}
