//! Default install and clean actions.
//!
//! Install unpacks the package archive over its target root: the system
//! root for `sysroot` and `initrd` packages, the tool prefix for `tool`
//! packages. Clean removes the package's out-of-tree build directory and
//! its install staging directory; the source tree is left alone.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use nyx_core::{Action, ActionContext, ActionProvider, PackagePaths};
use nyx_schema::InstallType;

/// Actions `nbuild` installs and cleans with.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActions;

impl ActionProvider for DefaultActions {
    fn install<'a>(&self, ctx: ActionContext<'a>) -> Box<dyn Action + 'a> {
        Box::new(UnpackArchive { ctx })
    }

    fn clean<'a>(&self, ctx: ActionContext<'a>) -> Box<dyn Action + 'a> {
        Box::new(RemoveBuildTree { ctx })
    }
}

struct UnpackArchive<'a> {
    ctx: ActionContext<'a>,
}

impl UnpackArchive<'_> {
    fn destination(&self, paths: &PackagePaths) -> PathBuf {
        match self.ctx.package.install_type {
            InstallType::Tool => paths.tool_prefix.clone(),
            InstallType::Sysroot | InstallType::Initrd => paths.sysroot.clone(),
        }
    }
}

impl Action for UnpackArchive<'_> {
    fn execute(&self) -> Result<()> {
        let paths = PackagePaths::resolve(self.ctx.package, self.ctx.config);
        let dest = self.destination(&paths);
        tracing::debug!(
            package = %self.ctx.package.name,
            "unpacking {} into {}",
            paths.archive.display(),
            dest.display()
        );
        unpack(&paths.archive, &dest)
    }
}

/// Unpack a gzip-compressed tarball over `dest`, replacing existing files.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;
    let file =
        File::open(archive).with_context(|| format!("failed to open {}", archive.display()))?;

    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);
    tar.unpack(dest)
        .with_context(|| format!("failed to unpack {}", archive.display()))
}

struct RemoveBuildTree<'a> {
    ctx: ActionContext<'a>,
}

impl Action for RemoveBuildTree<'_> {
    fn execute(&self) -> Result<()> {
        let paths = PackagePaths::resolve(self.ctx.package, self.ctx.config);
        for dir in [&paths.build_dir, &paths.install_dir] {
            if dir.exists() {
                tracing::debug!(package = %self.ctx.package.name, "removing {}", dir.display());
                std::fs::remove_dir_all(dir)
                    .with_context(|| format!("failed to remove {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
