//! Step template expansion and execution.
//!
//! A step is one shell command line from a descriptor's `configure_steps`,
//! `build_steps` or `package_steps`. Before it runs, `$NAME` and `${NAME}`
//! placeholders are replaced with build values; `$$` produces a literal `$`,
//! which is how a step reaches a shell variable (`$$BUILD_DIR`). Any other
//! placeholder is an error rather than being passed through to the shell.
//!
//! | Placeholder | Value |
//! |---|---|
//! | `SYSROOT` | `SYSROOT` from the step environment |
//! | `INSTALL_DIR` | `INSTALL_DIR` from the step environment |
//! | `PREFIX` | Same as `INSTALL_DIR` |
//! | `TARGET` | `<target>-umbra` |
//! | `TOOLPREFIX` | Tool root joined with the package's install root |
//! | `THREADS` | Logical CPU count |

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::LazyLock;

use nyx_schema::PackageDescriptor;
use regex::{Captures, Regex};

use crate::config::Config;
use crate::environment::{self, Environment};
use crate::error::BuildError;
use crate::paths::PackagePaths;

/// Shell used for every step.
const SHELL: &str = "/bin/sh";

/// Lines of a step log shown when a step fails.
const LOG_TAIL_LINES: usize = 20;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))",
    )
    .expect("placeholder pattern is valid")
});

/// Placeholder name to substituted value.
pub type TemplateVars = BTreeMap<&'static str, String>;

/// Values available to `pkg`'s step templates, given its computed `env`.
pub fn template_vars(pkg: &PackageDescriptor, config: &Config, env: &Environment) -> TemplateVars {
    let paths = PackagePaths::resolve(pkg, config);
    let lookup = |key: &str, fallback: &Path| {
        env.get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string_lossy().into_owned())
    };
    let install_dir = lookup("INSTALL_DIR", &paths.install_dir);

    TemplateVars::from([
        ("SYSROOT", lookup("SYSROOT", &paths.sysroot)),
        ("INSTALL_DIR", install_dir.clone()),
        ("TARGET", config.target_triple()),
        ("PREFIX", install_dir),
        ("TOOLPREFIX", paths.tool_prefix.to_string_lossy().into_owned()),
        ("THREADS", num_cpus::get().to_string()),
    ])
}

/// Substitute placeholders in `template`.
///
/// # Errors
///
/// Returns [`BuildError::Template`] for a placeholder not in `vars` or a `$`
/// that does not start a placeholder.
pub fn expand(template: &str, vars: &TemplateVars) -> Result<String, BuildError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&template[last..whole.start]);
        out.push_str(&substitute(template, &caps, whole.start, vars)?);
        last = whole.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn substitute(
    template: &str,
    caps: &Captures<'_>,
    offset: usize,
    vars: &TemplateVars,
) -> Result<String, BuildError> {
    let error = |reason: String| BuildError::Template {
        template: template.to_string(),
        reason,
    };

    if caps.name("escaped").is_some() {
        return Ok("$".to_string());
    }
    if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
        return vars
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| error(format!("unknown placeholder `{}`", name.as_str())));
    }
    Err(error(format!("invalid placeholder at offset {offset}")))
}

/// Run one command line through the shell.
///
/// This is the only place package-supplied text reaches a shell. The child
/// sees exactly `env`, nothing inherited. Output goes to `log` when given,
/// otherwise to the builder's own stdout and stderr.
///
/// # Errors
///
/// Returns [`BuildError::Spawn`] if the shell cannot be started and
/// [`BuildError::Io`] if the log file cannot be written.
pub fn run_shell(
    command: &str,
    cwd: &Path,
    env: &Environment,
    log: Option<&Path>,
) -> Result<ExitStatus, BuildError> {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .env_clear()
        .envs(env);

    if let Some(log_path) = log {
        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        writeln!(log_file, "==> {command}")?;
        cmd.stdout(Stdio::from(log_file.try_clone()?))
            .stderr(Stdio::from(log_file));
    }

    cmd.status().map_err(|source| BuildError::Spawn {
        command: command.to_string(),
        source,
    })
}

/// Run `steps` in order inside `cwd`, stopping at the first failure.
///
/// The environment is computed once for the whole sequence. An empty list
/// succeeds without computing anything.
///
/// # Errors
///
/// Returns [`BuildError::Step`] for the first command exiting non-zero;
/// later commands are not run. Template, spawn and directory errors are
/// returned as they occur.
pub fn run_steps(
    pkg: &PackageDescriptor,
    steps: &[String],
    cwd: &Path,
    config: &Config,
    base_env: &Environment,
) -> Result<(), BuildError> {
    if steps.is_empty() {
        return Ok(());
    }

    let env = environment::compute(pkg, config, base_env)?;
    let vars = template_vars(pkg, config, &env);
    let log = step_log(pkg, config)?;

    for (index, template) in steps.iter().enumerate() {
        let command = expand(template, &vars)?;
        tracing::debug!(package = %pkg.name, cwd = %cwd.display(), "$ {command}");

        let status = run_shell(&command, cwd, &env, log.as_deref())?;
        if !status.success() {
            if let Some(log_path) = &log {
                if let Ok(tail) = read_last_lines(log_path, LOG_TAIL_LINES) {
                    tracing::error!("last {LOG_TAIL_LINES} lines of {}:\n{tail}", log_path.display());
                }
            }
            return Err(BuildError::Step {
                package: pkg.name.clone(),
                index: index + 1,
                command,
                code: status.code(),
            });
        }
    }
    Ok(())
}

/// Log file for `pkg`'s steps today, if step logging is configured.
fn step_log(pkg: &PackageDescriptor, config: &Config) -> Result<Option<PathBuf>, BuildError> {
    let Some(dir) = &config.build_env.log_path else {
        return Ok(None);
    };
    environment::ensure_dir(dir)?;
    let date = chrono::Local::now().format("%Y%m%d");
    Ok(Some(
        dir.join(format!("build-{}-{date}.log", pkg.qualified_name())),
    ))
}

/// Read the last `n` lines of a log without loading all of it.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<String> {
    use std::io::{Read, Seek, SeekFrom};

    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // Drop the partial first line after seeking mid-file.
    let content = if start > 0 {
        buffer.find('\n').map_or(&buffer[..], |idx| &buffer[idx + 1..])
    } else {
        &buffer[..]
    };

    let lines: Vec<&str> = content.lines().collect();
    let from = lines.len().saturating_sub(n);
    Ok(lines[from..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vars() -> TemplateVars {
        TemplateVars::from([
            ("PREFIX", "/stage/demo".to_string()),
            ("SYSROOT", "/sysroot".to_string()),
            ("THREADS", "8".to_string()),
        ])
    }

    fn base_env() -> Environment {
        std::env::vars().collect()
    }

    #[test]
    fn test_expand_named_and_braced() {
        let out = expand("./configure --prefix=$PREFIX --with-sysroot=${SYSROOT}", &vars()).unwrap();
        assert_eq!(out, "./configure --prefix=/stage/demo --with-sysroot=/sysroot");
    }

    #[test]
    fn test_expand_escape() {
        let out = expand("cd $$BUILD_DIR && make -j$THREADS", &vars()).unwrap();
        assert_eq!(out, "cd $BUILD_DIR && make -j8");
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let err = expand("echo $HOME", &vars()).unwrap_err();
        assert!(matches!(err, BuildError::Template { .. }));
        assert!(err.to_string().contains("HOME"));
    }

    #[test]
    fn test_bare_dollar_is_error() {
        assert!(expand("make -j$(nproc)", &vars()).is_err());
        assert!(expand("trailing $", &vars()).is_err());
    }

    #[test]
    fn test_template_vars_prefix_and_threads() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "i686");
        let pkg = PackageDescriptor::from_json_str("demo-1.0", ".", r#"{"name": "demo"}"#).unwrap();
        let env = environment::compute(&pkg, &config, &base_env()).unwrap();

        let vars = template_vars(&pkg, &config, &env);
        let out = expand("install --prefix=$PREFIX -j$THREADS --target=$TARGET", &vars).unwrap();

        let install_dir = tmp.path().join("build/tmp/install/demo");
        let threads: usize = vars["THREADS"].parse().unwrap();
        assert!(threads > 0);
        assert_eq!(
            out,
            format!(
                "install --prefix={} -j{threads} --target=i686-umbra",
                install_dir.display()
            )
        );
    }

    #[test]
    fn test_run_steps_stops_at_first_failure() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = PackageDescriptor::new("demo-1.0", ".");
        let trace = tmp.path().join("trace");
        let steps = vec![
            format!("echo one >> {}", trace.display()),
            "exit 7".to_string(),
            format!("echo three >> {}", trace.display()),
        ];

        let err = run_steps(&pkg, &steps, tmp.path(), &config, &base_env()).unwrap_err();
        match err {
            BuildError::Step { index, code, .. } => {
                assert_eq!(index, 2);
                assert_eq!(code, Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(&trace).unwrap(), "one\n");
    }

    #[test]
    fn test_run_steps_sees_computed_env() {
        let tmp = tempdir().unwrap();
        let config = Config::rooted(tmp.path(), "x86_64");
        let pkg = PackageDescriptor::new("demo-1.0", ".");
        let out = tmp.path().join("out");
        let steps = vec![format!("echo \"$$DESTDIR\" > {}", out.display())];

        run_steps(&pkg, &steps, tmp.path(), &config, &base_env()).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            written.trim(),
            tmp.path().join("build/tmp/install/demo-1.0").to_string_lossy()
        );
    }

    #[test]
    fn test_empty_steps_succeed() {
        let pkg = PackageDescriptor::new("demo", ".");
        let config = Config::rooted(Path::new("/nonexistent"), "x86_64");
        assert!(run_steps(&pkg, &[], Path::new("/"), &config, &Environment::new()).is_ok());
    }

    #[test]
    fn test_step_output_goes_to_log() {
        let tmp = tempdir().unwrap();
        let mut config = Config::rooted(tmp.path(), "x86_64");
        let log_dir = tmp.path().join("logs");
        config.build_env.log_path = Some(log_dir.clone());
        let pkg = PackageDescriptor::new("demo-1.0", ".");

        let steps = vec!["echo hello-from-step".to_string(), "exit 1".to_string()];
        assert!(run_steps(&pkg, &steps, tmp.path(), &config, &base_env()).is_err());

        let log = std::fs::read_dir(&log_dir).unwrap().next().unwrap().unwrap().path();
        let content = std::fs::read_to_string(log).unwrap();
        assert!(content.contains("==> echo hello-from-step"));
        assert!(content.contains("hello-from-step\n"));
    }

    #[test]
    fn test_read_last_lines() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("log");
        let body: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).unwrap();
        let tail = read_last_lines(&path, 3).unwrap();
        assert_eq!(tail, "line 48\nline 49\nline 50");
    }
}
