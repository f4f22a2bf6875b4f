//! Patch application.
//!
//! Patches are applied in declared order with `patch --forward --batch -p1`,
//! fed on stdin. `--batch` keeps `patch` from ever prompting.
//!
//! Before applying, each patch is checked with a reverse dry run. One that
//! reverses cleanly is already in the tree and is skipped, so a patch stage
//! that failed halfway resumes at the patch that failed rather than tripping
//! over the ones before it.
//!
//! A patch that `patch` rejects is logged and skipped unless
//! `build_env.strict_patches` is set, in which case it fails the stage. A
//! patch file that cannot be read always fails the stage.

use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use nyx_schema::PackageDescriptor;

use crate::error::BuildError;

const APPLY: &[&str] = &["--forward", "--batch", "-p1", "-d", "."];
// Not `--batch`: under `--reverse` it takes an unapplied patch for an applied
// one and the dry run succeeds.
const REVERSE_CHECK: &[&str] = &["--reverse", "--dry-run", "--force", "--silent", "-p1", "-d", "."];

/// Apply every patch declared by `pkg` inside `source_dir`.
///
/// # Errors
///
/// Returns [`BuildError::Patch`] if a patch cannot be read, `patch` cannot
/// be run, or (with `strict`) a patch does not apply cleanly.
pub fn apply(pkg: &PackageDescriptor, source_dir: &Path, strict: bool) -> Result<(), BuildError> {
    if pkg.patches.is_empty() {
        return Ok(());
    }

    let tool = which::which("patch").map_err(|e| BuildError::Patch {
        package: pkg.name.clone(),
        patch: pkg.patches[0].clone(),
        reason: format!("patch: {e}"),
    })?;

    for rel in &pkg.patches {
        let patch_path = pkg.descriptor_dir.join(rel);
        let fail = |reason: String| BuildError::Patch {
            package: pkg.name.clone(),
            patch: patch_path.clone(),
            reason,
        };

        tracing::debug!("applying patch {} to {}", patch_path.display(), source_dir.display());
        let data = std::fs::read(&patch_path).map_err(|e| fail(e.to_string()))?;

        let applied = run_patch(&tool, REVERSE_CHECK, source_dir, &data, false)
            .map_err(|e| fail(e.to_string()))?;
        if applied.success() {
            tracing::debug!(package = %pkg.name, "patch {} already applied", patch_path.display());
            continue;
        }

        let status =
            run_patch(&tool, APPLY, source_dir, &data, true).map_err(|e| fail(e.to_string()))?;

        if !status.success() {
            if strict {
                return Err(fail(format!("patch exited with {status}")));
            }
            tracing::warn!(
                package = %pkg.name,
                "patch {} did not apply cleanly ({status}), continuing",
                patch_path.display()
            );
        }
    }
    Ok(())
}

/// Run `patch` with `args` in `dir`, feeding it `data`.
fn run_patch(
    tool: &Path,
    args: &[&str],
    dir: &Path,
    data: &[u8],
    show_output: bool,
) -> std::io::Result<ExitStatus> {
    let output = || if show_output { Stdio::inherit() } else { Stdio::null() };
    let mut child = Command::new(tool)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(output())
        .stderr(output())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(data)?;
    }
    child.wait()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn has_patch_tool() -> bool {
        which::which("patch").is_ok()
    }

    const ADD_LINE: &str = "\
--- a/hello.txt
+++ b/hello.txt
@@ -1 +1,2 @@
 hello
+patched
";

    #[test]
    fn test_applies_in_order() {
        if !has_patch_tool() {
            return;
        }
        let tmp = tempdir().unwrap();
        let pkg_dir = tmp.path().join("pkg");
        let src = tmp.path().join("src");
        std::fs::create_dir_all(pkg_dir.join("patches")).unwrap();
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("hello.txt"), "hello\n").unwrap();
        std::fs::write(pkg_dir.join("patches/0001.patch"), ADD_LINE).unwrap();

        let pkg = PackageDescriptor::from_json_str(
            "demo-1.0",
            &pkg_dir,
            r#"{"patches": ["patches/0001.patch"]}"#,
        )
        .unwrap();
        apply(&pkg, &src, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(src.join("hello.txt")).unwrap(),
            "hello\npatched\n"
        );
    }

    #[test]
    fn test_rejected_patch_only_fails_when_strict() {
        if !has_patch_tool() {
            return;
        }
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("hello.txt"), "something else\n").unwrap();
        std::fs::write(tmp.path().join("bad.patch"), ADD_LINE).unwrap();

        let pkg =
            PackageDescriptor::from_json_str("demo-1.0", tmp.path(), r#"{"patches": ["bad.patch"]}"#)
                .unwrap();
        assert!(apply(&pkg, &src, false).is_ok());
        assert!(matches!(apply(&pkg, &src, true), Err(BuildError::Patch { .. })));
    }

    const EDIT_OTHER: &str = "\
--- a/other.txt
+++ b/other.txt
@@ -1 +1 @@
-other
+edited
";

    #[test]
    fn test_strict_retry_skips_applied_patches() {
        if !has_patch_tool() {
            return;
        }
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("hello.txt"), "hello\n").unwrap();
        std::fs::write(src.join("other.txt"), "other\n").unwrap();
        std::fs::write(tmp.path().join("0001.patch"), ADD_LINE).unwrap();
        std::fs::write(tmp.path().join("0002.patch"), EDIT_OTHER.replace("-other", "-wrong")).unwrap();

        let pkg = PackageDescriptor::from_json_str(
            "demo-1.0",
            tmp.path(),
            r#"{"patches": ["0001.patch", "0002.patch"]}"#,
        )
        .unwrap();
        let err = apply(&pkg, &src, true).unwrap_err();
        assert!(err.to_string().contains("0002.patch"), "{err}");

        std::fs::write(tmp.path().join("0002.patch"), EDIT_OTHER).unwrap();
        apply(&pkg, &src, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(src.join("hello.txt")).unwrap(),
            "hello\npatched\n"
        );
        assert_eq!(std::fs::read_to_string(src.join("other.txt")).unwrap(), "edited\n");

        // A full re-run over the patched tree changes nothing.
        apply(&pkg, &src, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(src.join("hello.txt")).unwrap(),
            "hello\npatched\n"
        );
    }

    #[test]
    fn test_missing_patch_file_fails() {
        if !has_patch_tool() {
            return;
        }
        let tmp = tempdir().unwrap();
        let pkg = PackageDescriptor::from_json_str(
            "demo-1.0",
            tmp.path(),
            r#"{"patches": ["missing.patch"]}"#,
        )
        .unwrap();
        let err = apply(&pkg, tmp.path(), false).unwrap_err();
        assert!(err.to_string().contains("missing.patch"));
    }
}
