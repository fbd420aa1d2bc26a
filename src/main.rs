mod cli;
mod commands;
mod docker;
mod getter;
mod kubectl;
mod paths;
mod progress;
mod runner;
mod settings;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use settings::Settings;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub settings: Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let settings = Settings::load(&paths::settings_file())?;
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings,
    };
    log::debug!("Data home is {}", paths::data_home().display());

    match cli.command {
        Commands::Check(args) => commands::check::run(&ctx, &args),
        Commands::Graph(args) => commands::graph::run(&ctx, &args),
        Commands::Cluster(cmd) => commands::cluster::run(&ctx, &cmd),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "berth", &mut io::stdout());
            Ok(())
        }
    }
}
