use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use kvfs_core::FsError;
use tracing::Level;

mod cli;
mod commands;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match commands::run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let name = err
                .downcast_ref::<FsError>()
                .map(FsError::errno_name)
                .unwrap_or("error");
            eprintln!("{} {}: {:#}", "✗".red().bold(), name.red(), err);
            ExitCode::FAILURE
        }
    }
}
