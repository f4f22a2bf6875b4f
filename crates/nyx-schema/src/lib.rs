//! Shared data model for the nyx package builder.
//!
//! Everything here is pure data: descriptors as loaded from disk, the
//! per-package completion state and version ordering. Nothing in this crate
//! touches the build tree or spawns processes.

pub mod descriptor;
pub mod state;
pub mod version;

// Re-exports
pub use descriptor::*;
pub use state::{BuildState, StateError, Transition};
pub use version::{PackageVersion, compare_identifiers, package_name, parse_version, sort_newest_first};

/// Architecture wildcard accepted in a descriptor's `architecture` list.
pub const ANY_ARCH: &str = "*";

/// Separator between a package name and its version suffix (`gcc-13.2.0`).
pub const VERSION_SEPARATOR: char = '-';
