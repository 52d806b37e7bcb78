use std::env;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;

use kiro2pdf::cli::{self, Cli};
use kiro2pdf::interactive::{self, Outcome, StdinLines};
use kiro2pdf::{Config, SpecsConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let mut stdout = io::stdout();

    // Bare invocation offers to render whatever is in the spec directory
    if env::args_os().len() == 1 {
        let specs = SpecsConfig::default();
        match interactive::run(&specs, env!("CARGO_BIN_NAME"), &mut StdinLines, &mut stdout) {
            Ok(Outcome::NoSpecs) => {}
            Ok(Outcome::Declined | Outcome::Rendered { .. }) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    if let Err(e) = cli::run(&cli, &config.specs, &mut stdout) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
