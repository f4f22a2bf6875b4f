//! The per-package build pipeline.
//!
//! ```text
//! source -> patch -> build -> package -> install -> cleanup
//! ```
//!
//! Each stage is skipped when its work is already done: the first three and
//! install consult the package's [`BuildState`](nyx_schema::BuildState),
//! packaging checks for the archive on disk. A failing stage aborts the
//! pipeline and leaves every flag recorded so far in place, so the next
//! build picks up at the stage that failed.
//!
//! A package declaring neither configure nor build steps is never marked
//! built; it goes straight to packaging.

use nyx_schema::{PackageDescriptor, Transition};

use crate::actions::{ActionContext, ActionProvider};
use crate::config::Config;
use crate::environment::{self, Environment};
use crate::error::BuildError;
use crate::paths::PackagePaths;
use crate::{packager, patch, source, steps};

/// Caller switches for a build.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Install the package once it is packaged.
    pub install: bool,
    /// Run the clean action after a successful build.
    pub clean: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            install: true,
            clean: true,
        }
    }
}

/// Drives packages through the pipeline.
pub struct BuildOrchestrator<'a> {
    config: &'a Config,
    base_env: &'a Environment,
    actions: &'a dyn ActionProvider,
    options: BuildOptions,
}

impl std::fmt::Debug for BuildOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("target", &self.config.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator running commands on top of `base_env`.
    pub fn new(config: &'a Config, base_env: &'a Environment, actions: &'a dyn ActionProvider) -> Self {
        Self {
            config,
            base_env,
            actions,
            options: BuildOptions::default(),
        }
    }

    /// Replace the build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Build `pkg`, resuming after whatever stages its state marks as done.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails. Stages after it do
    /// not run; progress recorded before it is kept.
    pub fn build(&self, pkg: &mut PackageDescriptor) -> Result<(), BuildError> {
        pkg.state.validate()?;
        pkg.record(Transition::StartedFromSource)?;

        if !pkg.state.have_source() {
            tracing::info!(package = %pkg.name, "obtaining source");
            abort(pkg, "obtaining source files", source::acquire(pkg, self.config, self.base_env))?;
            pkg.record(Transition::SourceAcquired)?;
        }

        let source_dir = PackagePaths::resolve(pkg, self.config).source_dir;

        if !pkg.state.patched() && pkg.needs_patch() {
            tracing::info!(package = %pkg.name, "patching");
            let strict = self.config.build_env.strict_patches;
            abort(pkg, "patching source files", patch::apply(pkg, &source_dir, strict))?;
            pkg.record(Transition::Patched)?;
        }

        if !pkg.state.built() && pkg.has_build_steps() {
            tracing::info!(package = %pkg.name, "building");
            let configure =
                steps::run_steps(pkg, &pkg.steps.configure, &source_dir, self.config, self.base_env);
            abort(pkg, "configuration", configure)?;
            let compile =
                steps::run_steps(pkg, &pkg.steps.build, &source_dir, self.config, self.base_env);
            abort(pkg, "compilation", compile)?;
            pkg.record(Transition::Built)?;
        }

        if !packager::has_package(pkg, self.config) {
            tracing::info!(package = %pkg.name, "packaging");
            abort(pkg, "packaging files", packager::package(pkg, self.config, self.base_env))?;
        }

        if !pkg.state.installed() && self.options.install {
            tracing::info!(package = %pkg.name, "installing");
            abort(pkg, "installing to the system root", self.install(pkg))?;
            pkg.record(Transition::Installed)?;
        }

        if self.options.clean {
            tracing::info!(package = %pkg.name, "cleaning up");
            if let Err(e) = self.run_clean(pkg) {
                tracing::warn!(package = %pkg.name, "clean up failed: {e}");
            }
        }

        tracing::info!(package = %pkg.name, "packaged successfully");
        Ok(())
    }

    /// Uninstall `pkg`, delete its archive and run the clean action.
    ///
    /// Source, patch and build progress are kept, so the next build starts
    /// again at packaging.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the archive cannot be removed and
    /// [`BuildError::Clean`] if the clean action fails.
    pub fn clean(&self, pkg: &mut PackageDescriptor) -> Result<(), BuildError> {
        pkg.record(Transition::Uninstalled)?;

        let archive = PackagePaths::resolve(pkg, self.config).archive;
        if archive.exists() {
            tracing::debug!(package = %pkg.name, "removing {}", archive.display());
            std::fs::remove_file(&archive)?;
        }
        self.run_clean(pkg)
    }

    fn install(&self, pkg: &PackageDescriptor) -> Result<(), BuildError> {
        let env = environment::compute(pkg, self.config, self.base_env)?;
        let ctx = ActionContext {
            config: self.config,
            env: &env,
            package: pkg,
        };
        self.actions
            .install(ctx)
            .execute()
            .map_err(|e| BuildError::Install {
                package: pkg.name.clone(),
                reason: format!("{e:#}"),
            })
    }

    fn run_clean(&self, pkg: &PackageDescriptor) -> Result<(), BuildError> {
        let env = environment::compute(pkg, self.config, self.base_env)?;
        let ctx = ActionContext {
            config: self.config,
            env: &env,
            package: pkg,
        };
        self.actions
            .clean(ctx)
            .execute()
            .map_err(|e| BuildError::Clean {
                package: pkg.name.clone(),
                reason: format!("{e:#}"),
            })
    }
}

/// Log a stage failure for `pkg` and pass the result through.
fn abort<T>(pkg: &PackageDescriptor, stage: &str, result: Result<T, BuildError>) -> Result<T, BuildError> {
    result.inspect_err(|e| tracing::error!(package = %pkg.name, "failed in {stage} for {}: {e}", pkg.name))
}
