//! Build command

use std::path::Path;

use anyhow::{Context, Result};
use nyx_core::{BuildOptions, BuildOrchestrator, Environment};

use super::Session;
use crate::PackageArgs;
use crate::actions::DefaultActions;

/// Build, package and install a package, resuming recorded progress.
///
/// Progress is saved whether or not the build succeeds.
pub fn build(config_path: &Path, args: &PackageArgs, options: BuildOptions) -> Result<()> {
    let mut session = Session::open(config_path, args)?;
    let base_env: Environment = std::env::vars().collect();
    let actions = DefaultActions;

    let result = BuildOrchestrator::new(&session.config, &base_env, &actions)
        .with_options(options)
        .build(&mut session.package);
    session.save()?;

    result.with_context(|| format!("failed to build {}", session.package.qualified_name()))
}
