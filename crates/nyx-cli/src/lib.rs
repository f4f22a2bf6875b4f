//! nbuild - builds nyx packages from source and installs them.
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! A package is described by a JSON descriptor (`package.json`) whose
//! directory is named after the package identifier (`gcc-13.2.0/`). The build
//! tree layout comes from a TOML configuration file, `nyx.toml` by default.
//!
//! Progress is recorded per package under `<build_path>/state/`, so running
//! `nbuild build` again after a failure resumes at the stage that failed.

pub mod actions;
pub mod cmd;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "nbuild")]
#[command(author, version, about = "nbuild - build nyx packages from source")]
pub struct Cli {
    /// Build configuration file
    #[arg(short, long, global = true, default_value = "nyx.toml")]
    pub config: PathBuf,

    /// Log commands and paths as they are used
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a package and install it
    Build {
        #[command(flatten)]
        package: PackageArgs,
        /// Stop after packaging
        #[arg(long)]
        no_install: bool,
        /// Keep build leftovers
        #[arg(long)]
        no_clean: bool,
    },
    /// Uninstall a package and delete its archive
    Clean {
        #[command(flatten)]
        package: PackageArgs,
    },
    /// Show a package's descriptor and recorded progress
    Info {
        #[command(flatten)]
        package: PackageArgs,
    },
}

/// Selects the package a subcommand acts on.
#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Descriptor file, or the directory containing `package.json`
    pub descriptor: PathBuf,

    /// Package identifier (`name-version`); defaults to the descriptor's
    /// directory name
    #[arg(long)]
    pub id: Option<String>,
}
