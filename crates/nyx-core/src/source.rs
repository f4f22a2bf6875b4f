//! Source acquisition.
//!
//! - `local`: nothing to do, the build runs out of tree against the source root.
//! - `local_copy`: the source is copied into the build tree, overwriting
//!   whatever a previous copy left there.
//! - `git`: a shallow single-branch clone of the tag, or of the branch when
//!   no tag is set. An existing source directory counts as already cloned,
//!   so changing the ref later needs the directory removed by hand.
//!
//! Other strategies are refused.

use std::path::Path;
use std::process::Command;

use nyx_schema::{PackageDescriptor, SourceKind};

use crate::config::Config;
use crate::environment::{self, Environment};
use crate::error::BuildError;
use crate::paths::{PackagePaths, absolute, join_relative};

/// Fetch or locate `pkg`'s source.
///
/// # Errors
///
/// Returns [`BuildError::Acquisition`] if the strategy is unsupported or the
/// copy or clone fails, and [`BuildError::Directory`] if the destination
/// cannot be created.
pub fn acquire(
    pkg: &PackageDescriptor,
    config: &Config,
    base_env: &Environment,
) -> Result<(), BuildError> {
    let dest = PackagePaths::resolve(pkg, config).source_dir;

    match &pkg.source.kind {
        SourceKind::Local => {
            tracing::debug!(package = %pkg.name, "building out of tree from {}", dest.display());
            Ok(())
        }
        SourceKind::LocalCopy => {
            let from = join_relative(&absolute(&config.build_env.source_path), &pkg.source.path);
            environment::ensure_dir(&dest)?;
            copy_dir_all(&from, &dest).map_err(|e| BuildError::acquisition(&pkg.name, e))
        }
        SourceKind::Git => {
            if dest.is_dir() {
                tracing::debug!(package = %pkg.name, "source already cloned at {}", dest.display());
                return Ok(());
            }
            let env = environment::compute(pkg, config, base_env)?;
            clone(pkg, &dest, &env)
        }
        SourceKind::Http | SourceKind::Other(_) => Err(BuildError::acquisition(
            &pkg.name,
            format!("unsupported acquisition strategy `{}`", pkg.source.kind),
        )),
    }
}

fn clone(pkg: &PackageDescriptor, dest: &Path, env: &Environment) -> Result<(), BuildError> {
    let git = which::which("git").map_err(|e| BuildError::acquisition(&pkg.name, format!("git: {e}")))?;
    let git_ref = pkg.source.git_ref();

    environment::ensure_dir(dest)?;
    tracing::info!(package = %pkg.name, "cloning {} at {git_ref}", pkg.source.path);

    let status = Command::new(git)
        .arg("clone")
        .arg(&pkg.source.path)
        .arg(format!("--branch={git_ref}"))
        .arg("--depth=1")
        .arg(".")
        .current_dir(dest)
        .env_clear()
        .envs(env)
        .status()
        .map_err(|e| BuildError::acquisition(&pkg.name, e))?;

    if status.success() {
        return Ok(());
    }

    // An empty directory left behind would pass for a finished clone next time.
    if let Err(e) = std::fs::remove_dir_all(dest) {
        tracing::warn!("failed to remove partial clone {}: {e}", dest.display());
    }
    Err(BuildError::acquisition(
        &pkg.name,
        format!("git clone exited with {status}"),
    ))
}

/// Recursively copy the contents of `src` into `dst`, overwriting files.
///
/// # Errors
///
/// Returns an error if any file or directory cannot be copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> anyhow::Result<()> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| anyhow::anyhow!("copy {} -> {} failed: {e}", src.display(), dst.display()))?;
    Ok(())
}
