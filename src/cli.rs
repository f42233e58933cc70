//! Command-line interface definitions.

use crate::config::CssMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pagekit multi-page site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Page template directory path (relative to project root)
    #[arg(short, long)]
    pub pages: Option<PathBuf>,

    /// Config file name (default: pagekit.toml)
    #[arg(short = 'C', long, default_value = "pagekit.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Clear the output directory before writing (default: true)
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub clean: Option<bool>,

    /// Stylesheet granularity: one shared stylesheet or one per page
    #[arg(long, value_enum)]
    pub css_mode: Option<CssMode>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover pages and build the site once
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, serve the output and rebuild on change
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Print the build graph without building
    Graph {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn build_args(&self) -> Option<&BuildArgs> {
        match &self.command {
            Commands::Build { build_args } | Commands::Serve { build_args, .. } => Some(build_args),
            Commands::Graph { .. } => None,
        }
    }
}
