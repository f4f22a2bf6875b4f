//! Build tree layout for a package.
//!
//! ```text
//! <build_path>/src/<name>-<version>     fetched or copied source
//! <build_path>/tmp/build/<name>         out-of-tree build directory
//! <build_path>/tmp/install/<name>       DESTDIR staging for sysroot packages
//! <build_path>/state/<name>-<version>.json  recorded progress
//! <tool_path>/host-tools/bin            prepended to PATH
//! <host cache>/<name>-<version>.tar.gz  package archive
//! ```

use std::path::{Path, PathBuf};

use nyx_schema::{InstallType, PackageDescriptor, SourceKind};

use crate::config::Config;

/// Resolved absolute paths for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePaths {
    /// Where the package's source lives.
    pub source_dir: PathBuf,
    /// Out-of-tree build directory.
    pub build_dir: PathBuf,
    /// Per-package `DESTDIR` staging directory.
    pub install_dir: PathBuf,
    /// Target system root.
    pub sysroot: PathBuf,
    /// Host tool root.
    pub tool_root: PathBuf,
    /// Tool root joined with the package's install root.
    pub tool_prefix: PathBuf,
    /// Tree that gets archived: the tool prefix for tools, the install
    /// directory otherwise.
    pub staging_dir: PathBuf,
    /// Directory packaging creates before archiving.
    pub package_cache: PathBuf,
    /// Archive location.
    pub archive: PathBuf,
}

impl PackagePaths {
    /// Resolve every path for `pkg` under `config`.
    pub fn resolve(pkg: &PackageDescriptor, config: &Config) -> Self {
        let env = &config.build_env;
        let build_root = absolute(&env.build_path);
        let tool_root = absolute(&env.tool_path);

        let source_dir = match pkg.source.kind {
            SourceKind::Local => join_relative(&absolute(&env.source_path), &pkg.source.path),
            _ => build_root.join("src").join(pkg.qualified_name()),
        };

        let install_dir = build_root.join("tmp").join("install").join(&pkg.name);
        let tool_prefix = join_relative(&tool_root, &pkg.install_root);
        let staging_dir = match pkg.install_type {
            InstallType::Tool => tool_prefix.clone(),
            InstallType::Sysroot | InstallType::Initrd => install_dir.clone(),
        };

        let archive = absolute(config.host_package_cache())
            .join(format!("{}.tar.gz", pkg.qualified_name()));

        Self {
            source_dir,
            build_dir: build_root.join("tmp").join("build").join(&pkg.name),
            install_dir,
            sysroot: absolute(&env.system_root),
            tool_root,
            tool_prefix,
            staging_dir,
            package_cache: absolute(&env.package_cache),
            archive,
        }
    }
}

/// Host tool binaries, searched before the inherited `PATH`.
pub fn host_tools_bin(config: &Config) -> PathBuf {
    absolute(&config.build_env.tool_path)
        .join("host-tools")
        .join("bin")
}

/// Location of a package's recorded progress; `name` is the qualified name.
pub fn state_file(config: &Config, name: &str) -> PathBuf {
    absolute(&config.build_env.build_path)
        .join("state")
        .join(format!("{name}.json"))
}

/// Make `path` absolute against the working directory without touching the
/// filesystem.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Join a descriptor-supplied path below `base`. Descriptors write these
/// as absolute-looking paths (`/host-tools`), which must not escape `base`.
pub fn join_relative(base: &Path, rel: &str) -> PathBuf {
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        base.to_path_buf()
    } else {
        base.join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::rooted(Path::new("/w"), "x86_64")
    }

    #[test]
    fn test_sysroot_layout() {
        let pkg = PackageDescriptor::from_json_str(
            "zlib-1.3",
            "/pkgs/zlib",
            r#"{"name": "zlib", "acquisition": "git"}"#,
        )
        .unwrap();
        let paths = PackagePaths::resolve(&pkg, &config());
        assert_eq!(paths.source_dir, Path::new("/w/build/src/zlib-1.3"));
        assert_eq!(paths.build_dir, Path::new("/w/build/tmp/build/zlib"));
        assert_eq!(paths.install_dir, Path::new("/w/build/tmp/install/zlib"));
        assert_eq!(paths.staging_dir, paths.install_dir);
        assert_eq!(paths.archive, Path::new("/w/packages/zlib-1.3.tar.gz"));
    }

    #[test]
    fn test_local_source_under_source_root() {
        let pkg = PackageDescriptor::from_json_str(
            "kernel-0.1",
            ".",
            r#"{"name": "kernel", "src_uri": "/sys/kernel"}"#,
        )
        .unwrap();
        let paths = PackagePaths::resolve(&pkg, &config());
        assert_eq!(paths.source_dir, Path::new("/w/src/sys/kernel"));
    }

    #[test]
    fn test_tool_staging_is_tool_prefix() {
        let pkg = PackageDescriptor::from_json_str(
            "nasm-2.16",
            ".",
            r#"{"name": "nasm", "install_type": "tool", "install_root": "/host-tools"}"#,
        )
        .unwrap();
        let paths = PackagePaths::resolve(&pkg, &config());
        assert_eq!(paths.staging_dir, Path::new("/w/tools/host-tools"));
        assert_eq!(paths.tool_prefix, paths.staging_dir);
    }

    #[test]
    fn test_unversioned_archive_name() {
        let pkg = PackageDescriptor::new("limine", ".");
        let paths = PackagePaths::resolve(&pkg, &config());
        assert_eq!(paths.archive, Path::new("/w/packages/limine.tar.gz"));
    }

    #[test]
    fn test_join_relative_root() {
        assert_eq!(join_relative(Path::new("/t"), "/"), Path::new("/t"));
        assert_eq!(join_relative(Path::new("/t"), "usr/lib"), Path::new("/t/usr/lib"));
    }
}
