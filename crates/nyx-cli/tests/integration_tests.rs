//! Integration tests for the `nyx` CLI binary.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// A build tree with a config file and a `hello-1.0` port.
struct TestContext {
    temp_dir: TempDir,
    config: PathBuf,
    port: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path();

        let config = root.join("nyx.toml");
        std::fs::write(
            &config,
            format!(
                r#"target = "x86_64"

[build_env]
source_path = "{root}/src"
build_path = "{root}/build"
system_root = "{root}/sysroot"
tool_path = "{root}/tools"
package_cache = "{root}/packages"
"#,
                root = root.display()
            ),
        )
        .expect("failed to write config");

        std::fs::create_dir_all(root.join("src/hello")).expect("failed to create source");
        std::fs::write(root.join("src/hello/hello.txt"), "hello\n").expect("failed to write source");

        let port = root.join("ports/hello-1.0");
        std::fs::create_dir_all(&port).expect("failed to create port");
        std::fs::write(
            port.join("package.json"),
            r#"{
  "name": "hello",
  "description": "greets",
  "src_uri": "hello",
  "build_steps": ["cp hello.txt $$BUILD_DIR/"],
  "package_steps": ["mkdir -p $PREFIX/usr/share && cp hello.txt $PREFIX/usr/share/"]
}"#,
        )
        .expect("failed to write descriptor");

        Self {
            temp_dir,
            config,
            port,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_nbuild"))
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .arg(&self.port)
            .output()
            .expect("failed to run nbuild")
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp_dir.path().join(rel)
    }
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_nbuild"))
        .arg("--help")
        .output()
        .expect("failed to run nbuild");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_build_installs_and_records_progress() {
    let ctx = TestContext::new();
    let output = ctx.run(&["build"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(ctx.path("packages/hello-1.0.tar.gz").exists());
    assert!(ctx.path("sysroot/usr/share/hello.txt").exists());
    // Cleanup removed the build leftovers but not the source.
    assert!(!ctx.path("build/tmp/build/hello").exists());
    assert!(ctx.path("src/hello/hello.txt").exists());

    let state = std::fs::read_to_string(ctx.path("build/state/hello-1.0.json")).unwrap();
    assert!(state.contains(r#""installed": true"#), "{state}");
}

#[test]
fn test_info_shows_progress() {
    let ctx = TestContext::new();
    assert!(ctx.run(&["build", "--no-install"]).status.success());

    let output = ctx.run(&["info"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Package hello-1.0 for x86_64"), "{stdout}");
    assert!(stdout.contains("hello-1.0.tar.gz"), "{stdout}");
}

#[test]
fn test_clean_removes_archive() {
    let ctx = TestContext::new();
    assert!(ctx.run(&["build"]).status.success());
    assert!(ctx.run(&["clean"]).status.success());

    assert!(!ctx.path("packages/hello-1.0.tar.gz").exists());
    let state = std::fs::read_to_string(ctx.path("build/state/hello-1.0.json")).unwrap();
    assert!(state.contains(r#""installed": false"#), "{state}");
    assert!(state.contains(r#""built": true"#), "{state}");
}

#[test]
fn test_failed_build_exits_non_zero_and_keeps_progress() {
    let ctx = TestContext::new();
    std::fs::write(
        ctx.port.join("package.json"),
        r#"{"name": "hello", "src_uri": "hello", "build_steps": ["exit 1"]}"#,
    )
    .unwrap();

    let output = ctx.run(&["build"]);
    assert!(!output.status.success());
    let state = std::fs::read_to_string(ctx.path("build/state/hello-1.0.json")).unwrap();
    assert!(state.contains(r#""have_source": true"#), "{state}");
    assert!(state.contains(r#""built": false"#), "{state}");
}

#[test]
fn test_unsupported_architecture_is_rejected() {
    let ctx = TestContext::new();
    std::fs::write(
        ctx.port.join("package.json"),
        r#"{"name": "hello", "architecture": ["aarch64"]}"#,
    )
    .unwrap();

    let output = ctx.run(&["build"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not support x86_64"));
}
