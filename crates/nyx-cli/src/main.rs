//! nbuild - build nyx packages from source

use anyhow::Result;
use clap::Parser;
use nyx_core::BuildOptions;
use tracing_subscriber::EnvFilter;

use nyx_cli::cmd;
use nyx_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Build {
            package,
            no_install,
            no_clean,
        } => {
            let options = BuildOptions {
                install: !no_install,
                clean: !no_clean,
            };
            cmd::build::build(&cli.config, &package, options)
        }
        Commands::Clean { package } => cmd::clean::clean(&cli.config, &package),
        Commands::Info { package } => cmd::info::info(&cli.config, &package),
    }
}
