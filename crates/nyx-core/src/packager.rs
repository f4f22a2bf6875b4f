//! Package archives.
//!
//! Packaging runs the package steps, which install build output into the
//! staging tree, then bundles that tree into `<name>-<version>.tar.gz` in the
//! host package cache. The archive's existence is what marks a package as
//! packaged, so it is written under a temporary name and renamed into place
//! only once complete.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use flate2::Compression;
use flate2::write::GzEncoder;
use nyx_schema::PackageDescriptor;

use crate::config::Config;
use crate::environment::{self, Environment};
use crate::error::BuildError;
use crate::paths::PackagePaths;
use crate::steps;

/// Whether `pkg`'s archive already exists.
pub fn has_package(pkg: &PackageDescriptor, config: &Config) -> bool {
    PackagePaths::resolve(pkg, config).archive.exists()
}

/// Run `pkg`'s package steps and archive its staging tree.
///
/// # Errors
///
/// Returns the step error if a package step fails, in which case no archive
/// is written, or [`BuildError::Packaging`] if the archive cannot be created.
pub fn package(
    pkg: &PackageDescriptor,
    config: &Config,
    base_env: &Environment,
) -> Result<(), BuildError> {
    let paths = PackagePaths::resolve(pkg, config);
    environment::ensure_dir(&paths.package_cache)?;
    if let Some(parent) = paths.archive.parent() {
        environment::ensure_dir(parent)?;
    }
    environment::ensure_dir(&paths.staging_dir)?;

    steps::run_steps(pkg, &pkg.steps.package, &paths.source_dir, config, base_env)?;

    tracing::debug!(
        package = %pkg.name,
        "archiving {} into {}",
        paths.staging_dir.display(),
        paths.archive.display()
    );
    bundle_directory(&paths.staging_dir, &paths.archive)
        .map_err(|e| BuildError::packaging(&pkg.name, format!("{e:#}")))
}

/// Bundle the contents of `src_dir` into a gzip-compressed tarball.
///
/// Entries are stored relative to `src_dir`, so the archive unpacks to the
/// tree's contents rather than a wrapping directory. Symlinks are stored as
/// links.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or the archive written. A
/// failed write leaves no file at `dest_archive`.
pub fn bundle_directory(src_dir: &Path, dest_archive: &Path) -> anyhow::Result<()> {
    let partial = dest_archive.with_extension("gz.partial");
    if let Err(e) = write_archive(src_dir, &partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, dest_archive)?;
    Ok(())
}

fn write_archive(src_dir: &Path, dest: &Path) -> anyhow::Result<()> {
    let file =
        File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut tar_builder = tar::Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    tar_builder
        .append_dir_all(".", src_dir)
        .with_context(|| format!("failed to archive {}", src_dir.display()))?;
    tar_builder.finish()?;
    tar_builder.into_inner()?.finish()?;
    Ok(())
}
