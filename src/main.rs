//! pagekit - a multi-page static site builder.

mod build;
mod cli;
mod config;
mod graph;
mod inject;
mod logger;
mod pipeline;
mod serve;
mod watch;

use anyhow::Result;
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::{ConfigError, SiteConfig, cfg, init_config};
use graph::{DiskSource, GraphError};
use pipeline::{Dispatcher, StageError};
use serve::serve_site;
use std::process::ExitCode;

/// Process exit codes, one per failure class.
mod exit {
    pub const FAILURE: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const DISCOVERY: u8 = 3;
    pub const DUPLICATE_PAGE: u8 = 4;
    pub const MISSING_ENTRIES: u8 = 5;
    pub const STAGE: u8 = 6;
}

fn main() -> ExitCode {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    match SiteConfig::load(cli) {
        Ok(config) => init_config(config),
        Err(err) => {
            log!("error"; "{err:#}");
            return ExitCode::from(exit::CONFIG);
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log!("error"; "{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: &'static Cli) -> Result<()> {
    match &cli.command {
        Commands::Build { .. } => build_site(&cfg()).map(|_| ()),
        Commands::Serve { .. } => {
            if let Err(err) = build_site(&cfg()) {
                if !cfg().serve.watch {
                    return Err(err);
                }
                log!("error"; "{err:#}");
                log!("watch"; "initial build failed, waiting for changes");
            }
            serve_site()
        }
        Commands::Graph { json } => {
            let config = cfg();
            let graph = graph::discover(&config, &DiskSource)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else {
                print!("{}", graph::render_table(&graph, config.get_root()));
                let dispatcher = Dispatcher::from_config(&config.build.rules)?;
                let rules: Vec<_> = dispatcher
                    .rules()
                    .map(|chain| format!("{} [{}]", chain.name, chain.stages.join(", ")))
                    .collect();
                println!("rules, first match wins: {}", rules.join(" → "));
            }
            Ok(())
        }
    }
}

/// Exit code for the first recognized error in the cause chain.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(graph_err) = cause.downcast_ref::<GraphError>() {
            return match graph_err {
                GraphError::Discovery { .. } => exit::DISCOVERY,
                GraphError::DuplicatePage { .. } => exit::DUPLICATE_PAGE,
                GraphError::MissingEntries(_) => exit::MISSING_ENTRIES,
            };
        }
        if cause.is::<StageError>() {
            return exit::STAGE;
        }
        if cause.is::<ConfigError>() {
            return exit::CONFIG;
        }
    }
    exit::FAILURE
}
