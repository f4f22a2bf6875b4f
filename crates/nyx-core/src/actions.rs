//! Install and clean actions.
//!
//! Installing a package into its root and cleaning up after a build are
//! supplied by the caller. Each action is built for one package from the
//! build configuration and the package's computed environment, then run once.

use nyx_schema::PackageDescriptor;

use crate::config::Config;
use crate::environment::Environment;

/// What an action is constructed from.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Build configuration.
    pub config: &'a Config,
    /// The package's computed step environment.
    pub env: &'a Environment,
    /// The package being acted on.
    pub package: &'a PackageDescriptor,
}

/// A single runnable action.
pub trait Action {
    /// Run the action.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the action failed.
    fn execute(&self) -> anyhow::Result<()>;
}

/// Builds the install and clean actions for a package.
pub trait ActionProvider {
    /// Action that installs the packaged archive into its target root.
    fn install<'a>(&self, ctx: ActionContext<'a>) -> Box<dyn Action + 'a>;

    /// Action that removes build leftovers for the package.
    fn clean<'a>(&self, ctx: ActionContext<'a>) -> Box<dyn Action + 'a>;
}
