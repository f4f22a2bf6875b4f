//! Info command

use std::path::Path;

use anyhow::Result;
use nyx_core::PackagePaths;

use super::Session;
use crate::PackageArgs;

/// Print a package's descriptor summary, progress and archive location.
pub fn info(config_path: &Path, args: &PackageArgs) -> Result<()> {
    let session = Session::open(config_path, args)?;
    let pkg = &session.package;
    let paths = PackagePaths::resolve(pkg, &session.config);

    for line in pkg.summary() {
        println!("  {line}");
    }
    println!();

    let lw = 12;
    let state = &pkg.state;
    let mark = |done: bool| if done { "yes" } else { "no" };
    println!("  {:<lw$}{}", "source", mark(state.have_source()));
    if pkg.needs_patch() {
        println!("  {:<lw$}{}", "patched", mark(state.patched()));
    }
    println!("  {:<lw$}{}", "built", mark(state.built()));
    println!("  {:<lw$}{}", "installed", mark(state.installed()));
    let packaged = if paths.archive.exists() {
        paths.archive.display().to_string()
    } else {
        "no".to_string()
    };
    println!("  {:<lw$}{packaged}", "archive");

    Ok(())
}
