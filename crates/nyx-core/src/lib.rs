//! Build-and-install pipeline for nyx source packages.
//!
//! [`BuildOrchestrator`] takes a [`PackageDescriptor`](nyx_schema::PackageDescriptor)
//! from source to installed archive, skipping stages its recorded state
//! marks as done. The stages themselves live in [`source`], [`patch`],
//! [`steps`] and [`packager`]; [`environment`] computes the process
//! environment every shelled-out command runs in.

pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod packager;
pub mod patch;
pub mod paths;
pub mod source;
pub mod steps;
pub mod store;

pub use actions::{Action, ActionContext, ActionProvider};
pub use config::{BuildEnv, Config, HostEnv};
pub use environment::Environment;
pub use error::BuildError;
pub use orchestrator::{BuildOptions, BuildOrchestrator};
pub use paths::PackagePaths;
pub use store::StateStore;
