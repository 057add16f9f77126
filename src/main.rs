mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod snapshot;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use reconcile::RunResult;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<ExitCode> {
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

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Apply(args) => commands::apply::apply(&ctx, &args.run, args.dry_run, args.yes)?,
        Command::Plan(args) => commands::apply::apply(&ctx, &args, true, true)?,
        Command::Order { bundle } => {
            commands::catalog::order(bundle.as_deref())?;
            RunResult::Success
        }
        Command::Kinds { kinds } => {
            commands::catalog::kinds(&kinds)?;
            RunResult::Success
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "gwsync", &mut io::stdout());
            RunResult::Success
        }
    };

    // Partial runs are an expected outcome, reported through the exit status
    Ok(match result {
        RunResult::Success => ExitCode::SUCCESS,
        RunResult::Partial => ExitCode::from(2),
    })
}
