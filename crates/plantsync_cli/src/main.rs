//! CLI entry point for inspecting a stored model.
//!
//! # Responsibility
//! - Report the stored model of an application home.
//! - Remove the stored model (with backup) on request.

use clap::{Parser, Subcommand};
use plantsync_core::{core_version, init_logging, ConfigError, CoreConfig, ModelService};
use std::path::PathBuf;
use std::process::ExitCode;

/// Inspect or remove the stored plant model
#[derive(Parser, Debug)]
#[command(name = "plantsync")]
#[command(version)]
struct Cli {
    /// Application home holding `data/` and `log/`; defaults to the working directory
    #[arg(long, env = "PLANTSYNC_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the data directory, model name and backup count
    Status,
    /// Back up and delete the stored model
    Remove,
}

impl Command {
    fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Remove => "remove",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Status);

    let config = match resolve_config(cli.home) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config) {
        eprintln!("logging disabled: {err}");
    }
    println!("plantsync_core version={}", core_version());

    match run(command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(
                "event=cli_command module=cli status=error command={} error={err}",
                command.as_str()
            );
            eprintln!("{} failed: {err}", command.as_str());
            ExitCode::FAILURE
        }
    }
}

/// Environment settings, with `--home` taking precedence for the home.
fn resolve_config(home: Option<PathBuf>) -> Result<CoreConfig, ConfigError> {
    let mut config = CoreConfig::from_env()?;
    if let Some(home) = home {
        config.application_home = home;
    }
    Ok(config)
}

fn run(command: Command, config: CoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = ModelService::new(config)?;
    match command {
        Command::Status => {
            println!("data_dir={}", service.store().data_dir().display());
            match service.get_model_name()? {
                Some(name) => println!("model={name}"),
                None => println!("model=<none>"),
            }
            println!("backups={}", service.store().backups()?.len());
        }
        Command::Remove => {
            service.remove_model()?;
            println!("model removed");
        }
    }
    Ok(())
}
