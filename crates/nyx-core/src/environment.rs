//! Process environment for package steps.
//!
//! Every stage that runs a command recomputes the environment from scratch.
//! It is assembled from three layers, later layers winning on conflict:
//!
//! 1. the caller's base environment (usually the builder's own),
//! 2. computed build paths and toolchain selection,
//! 3. the package's `environment` overrides.
//!
//! ## Computed variables
//!
//! | Variable | Value |
//! |---|---|
//! | `INSTALL_DIR` | `<build_path>/tmp/install/<name>` |
//! | `SYSROOT` | Configured system root |
//! | `BUILD_DIR` | `<build_path>/tmp/build/<name>` |
//! | `DESTDIR` | Same as `INSTALL_DIR` (not set for tools) |
//! | `CC` / `CXX` / `AR` | `gcc` / `g++` / `ar` (tools only) |
//! | `PATH` | `<tool_path>/host-tools/bin` then the inherited `PATH` |

use std::collections::BTreeMap;
use std::path::Path;

use nyx_schema::{InstallType, PackageDescriptor};

use crate::config::Config;
use crate::error::BuildError;
use crate::paths::{PackagePaths, host_tools_bin};

/// Variable name to value.
pub type Environment = BTreeMap<String, String>;

/// Host-native toolchain for packages that run on the build machine.
const NATIVE_TOOLCHAIN: [(&str, &str); 3] = [("CC", "gcc"), ("CXX", "g++"), ("AR", "ar")];

/// Merge environment layers in order. A key set in a later layer replaces
/// the value from any earlier one.
pub fn merge(layers: &[&Environment]) -> Environment {
    let mut merged = Environment::new();
    for layer in layers {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Compute the environment for running `pkg`'s commands.
///
/// Creates the package's install staging directory, the system root and the
/// package's build directory if they do not exist yet.
///
/// # Errors
///
/// Returns [`BuildError::Directory`] if any of those directories cannot be
/// created.
pub fn compute(
    pkg: &PackageDescriptor,
    config: &Config,
    base: &Environment,
) -> Result<Environment, BuildError> {
    let paths = PackagePaths::resolve(pkg, config);
    ensure_dir(&paths.install_dir)?;
    ensure_dir(&paths.sysroot)?;
    ensure_dir(&paths.build_dir)?;

    let mut computed = Environment::new();
    computed.insert("INSTALL_DIR".into(), display(&paths.install_dir));
    computed.insert("SYSROOT".into(), display(&paths.sysroot));
    computed.insert("BUILD_DIR".into(), display(&paths.build_dir));

    match pkg.install_type {
        InstallType::Tool => {
            for (key, value) in NATIVE_TOOLCHAIN {
                computed.insert(key.into(), value.into());
            }
        }
        InstallType::Sysroot | InstallType::Initrd => {
            computed.insert("DESTDIR".into(), display(&paths.install_dir));
        }
    }

    let tools_bin = display(&host_tools_bin(config));
    let search_path = match base.get("PATH") {
        Some(inherited) if !inherited.is_empty() => format!("{tools_bin}:{inherited}"),
        _ => tools_bin,
    };
    computed.insert("PATH".into(), search_path);

    Ok(merge(&[base, &computed, &pkg.environment]))
}

/// Create `path` and its parents unless it already exists.
///
/// # Errors
///
/// Returns [`BuildError::Directory`] if creation fails.
pub fn ensure_dir(path: &Path) -> Result<(), BuildError> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|source| BuildError::Directory {
        path: path.to_path_buf(),
        source,
    })
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn package(json: &str) -> PackageDescriptor {
        PackageDescriptor::from_json_str("demo-1.0", ".", json).unwrap()
    }

    fn base() -> Environment {
        Environment::from([
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("HOME".to_string(), "/home/builder".to_string()),
        ])
    }

    #[test]
    fn test_sysroot_package_gets_destdir() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = package(r#"{"name": "demo"}"#);

        let env = compute(&pkg, &config, &base()).unwrap();
        let install_dir = tmp.path().join("build/tmp/install/demo");
        assert_eq!(env["DESTDIR"], install_dir.to_string_lossy());
        assert_eq!(env["INSTALL_DIR"], env["DESTDIR"]);
        assert!(!env.contains_key("CC"));
        assert_eq!(env["HOME"], "/home/builder");

        assert!(install_dir.is_dir());
        assert!(tmp.path().join("sysroot").is_dir());
        assert!(tmp.path().join("build/tmp/build/demo").is_dir());
    }

    #[test]
    fn test_tool_package_uses_native_toolchain() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = package(r#"{"name": "demo", "install_type": "tool"}"#);

        let env = compute(&pkg, &config, &base()).unwrap();
        assert!(!env.contains_key("DESTDIR"));
        assert_eq!(env["CC"], "gcc");
        assert_eq!(env["CXX"], "g++");
        assert_eq!(env["AR"], "ar");
    }

    #[test]
    fn test_path_prepends_host_tools() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = package(r#"{"name": "demo"}"#);

        let env = compute(&pkg, &config, &base()).unwrap();
        let expected = format!(
            "{}:/usr/bin:/bin",
            tmp.path().join("tools/host-tools/bin").display()
        );
        assert_eq!(env["PATH"], expected);
    }

    #[test]
    fn test_overrides_win() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = package(
            r#"{"name": "demo", "install_type": "tool", "environment": {"CC": "clang", "PATH": "/opt/bin"}}"#,
        );

        let env = compute(&pkg, &config, &base()).unwrap();
        assert_eq!(env["CC"], "clang");
        assert_eq!(env["PATH"], "/opt/bin");
    }

    #[test]
    fn test_merge_order() {
        let a = Environment::from([("K".to_string(), "a".to_string())]);
        let b = Environment::from([
            ("K".to_string(), "b".to_string()),
            ("L".to_string(), "b".to_string()),
        ]);
        let merged = merge(&[&a, &b]);
        assert_eq!(merged["K"], "b");
        assert_eq!(merged.len(), 2);
        assert_eq!(merge(&[&b, &a])["K"], "a");
    }

    #[test]
    fn test_directory_failure_is_fatal() {
        let tmp = tempdir().unwrap();
        // A regular file where the build root should be.
        let blocker = tmp.path().join("build");
        std::fs::write(&blocker, "").unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");

        let err = compute(&package("{}"), &config, &base()).unwrap_err();
        assert!(matches!(err, BuildError::Directory { .. }));
    }
}
