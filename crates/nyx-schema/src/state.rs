//! Per-package build progress.
//!
//! Progress is a set of completion flags, but they are not independent: a
//! package cannot be patched before its source exists, and cannot be built
//! or installed before its declared patches are applied. [`BuildState`]
//! therefore only changes through [`Transition`]s, each of which checks its
//! preconditions, and [`BuildState::validate`] catches combinations that were
//! loaded from disk or edited by hand.
//!
//! A recorded `built` or `installed` without `patched` is accepted: it is
//! what a package that gained patches after it was built looks like, and the
//! next build repairs it by running the patch stage.
//!
//! Flags only move forward within a build. The single exception is
//! [`Transition::Uninstalled`], used by a clean, which clears `installed`
//! and leaves the rest untouched so the next build resumes at packaging.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Architecture recorded when a descriptor does not say otherwise.
pub const DEFAULT_ARCHITECTURE: &str = "x86_64";

/// A forward step in a package's build progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A build from source has started for this package.
    StartedFromSource,
    /// Source code is present in the package's source directory.
    SourceAcquired,
    /// All declared patches were applied.
    Patched,
    /// Configure and build steps completed.
    Built,
    /// The package archive was installed into its target root.
    Installed,
    /// The package was removed from its target root by a clean.
    Uninstalled,
}

/// Rejected transition or inconsistent flag combination.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    /// A transition was attempted before the stage it depends on completed.
    #[error("cannot record {transition:?}: {missing} has not completed")]
    Premature {
        /// Transition that was refused.
        transition: Transition,
        /// Name of the flag that is still unset.
        missing: &'static str,
    },

    /// The flags as a whole describe an impossible history.
    #[error("inconsistent build state: {flag} is set but {missing} is not")]
    Inconsistent {
        /// Flag that is set.
        flag: &'static str,
        /// Earlier flag it requires.
        missing: &'static str,
    },
}

/// Completion flags for one package, plus the architecture it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildState {
    /// Source has been acquired.
    pub(crate) have_source: bool,
    /// Declared patches have been applied.
    pub(crate) patched: bool,
    /// Configure and build steps have run to completion.
    pub(crate) built: bool,
    /// A from-source build has been started at least once.
    pub(crate) built_from_source: bool,
    /// The packaged archive has been installed into its target root.
    pub(crate) installed: bool,
    /// Target architecture.
    pub architecture: String,
}

impl Default for BuildState {
    fn default() -> Self {
        Self {
            have_source: false,
            patched: false,
            built: false,
            built_from_source: false,
            installed: false,
            architecture: DEFAULT_ARCHITECTURE.to_string(),
        }
    }
}

impl BuildState {
    /// Whether source has been acquired.
    pub fn have_source(&self) -> bool {
        self.have_source
    }

    /// Whether declared patches have been applied.
    pub fn patched(&self) -> bool {
        self.patched
    }

    /// Whether configure and build steps completed.
    pub fn built(&self) -> bool {
        self.built
    }

    /// Whether a from-source build was ever started.
    pub fn built_from_source(&self) -> bool {
        self.built_from_source
    }

    /// Whether the package is installed in its target root.
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Apply `transition`, refusing it if an earlier stage is incomplete.
    ///
    /// `needs_patch` is true when the package declares patches; only then is
    /// `patched` a precondition for building and installing.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Premature`] naming the first missing flag.
    pub fn record(&mut self, transition: Transition, needs_patch: bool) -> Result<(), StateError> {
        let premature = |missing| StateError::Premature {
            transition,
            missing,
        };

        match transition {
            Transition::StartedFromSource => self.built_from_source = true,
            Transition::SourceAcquired => self.have_source = true,
            Transition::Patched => {
                if !self.have_source {
                    return Err(premature("have_source"));
                }
                self.patched = true;
            }
            Transition::Built | Transition::Installed => {
                if !self.have_source {
                    return Err(premature("have_source"));
                }
                if needs_patch && !self.patched {
                    return Err(premature("patched"));
                }
                if transition == Transition::Built {
                    self.built = true;
                } else {
                    self.installed = true;
                }
            }
            Transition::Uninstalled => self.installed = false,
        }
        Ok(())
    }

    /// Check that no flag is set without the source it was recorded against.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Inconsistent`] for the first violation found.
    pub fn validate(&self) -> Result<(), StateError> {
        let later = [
            ("patched", self.patched),
            ("built", self.built),
            ("installed", self.installed),
        ];
        for (flag, set) in later {
            if set && !self.have_source {
                return Err(StateError::Inconsistent {
                    flag,
                    missing: "have_source",
                });
            }
        }
        Ok(())
    }
}
