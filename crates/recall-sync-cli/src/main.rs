mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use recall_sync::{ChangeOutcome, FingerprintScope};

use crate::commands::check::CheckSettings;
use crate::commands::clean::CleanOverrides;
use crate::config::AppConfig;

/// Exit status when the download could not be compared with the record.
const EXIT_INDETERMINATE: u8 = 3;

#[derive(Parser)]
#[command(name = "recall-sync")]
#[command(about = "Keep a local copy of the recalls dataset up to date")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the archive and update local files if it changed
    Check(FetchArgs),
    /// Convert a tab-separated dataset into JSON exports
    Clean {
        /// Dataset to clean (defaults to the configured dataset in the destination)
        input: Option<PathBuf>,
        /// File listing column names, one per line
        #[arg(long)]
        names: Option<PathBuf>,
        /// File listing allowed category values, one per line
        #[arg(long)]
        filter: Option<PathBuf>,
        /// Column the category filter applies to
        #[arg(long)]
        filter_column: Option<String>,
        /// Column used to drop duplicate rows
        #[arg(long)]
        dedup_key: Option<String>,
        /// Destination directory holding the dataset
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Check for a new archive and clean the dataset when it changed
    Refresh(FetchArgs),
    /// Show the destination and the recorded fingerprint
    Status {
        /// Destination directory
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Archive URL
    #[arg(long)]
    url: Option<String>,
    /// Destination directory for extracted files and the fingerprint record
    #[arg(long)]
    dest: Option<PathBuf>,
    /// Which archive entries contribute to the fingerprint
    #[arg(long, value_parser = parse_scope)]
    scope: Option<FingerprintScope>,
    /// Download timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn parse_scope(s: &str) -> Result<FingerprintScope, String> {
    FingerprintScope::parse(s)
        .ok_or_else(|| format!("unknown scope '{s}' (expected first-entry or all-entries)"))
}

impl FetchArgs {
    /// Merge flags over the loaded config.
    fn settings(self, config: &AppConfig) -> Result<CheckSettings> {
        let destination = match self.dest {
            Some(dir) => dir,
            None => config.destination()?,
        };

        Ok(CheckSettings {
            url: self.url.unwrap_or_else(|| config.url.clone()),
            destination,
            scope: self.scope.unwrap_or(config.scope.into()),
            timeout: Duration::from_secs(self.timeout.unwrap_or(config.timeout_secs)),
        })
    }
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match explicit {
        Some(path) => config::load_config_from(path),
        None => Ok(config::load_config()),
    }
}

fn resolve_destination(dest: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match dest {
        Some(dir) => Ok(dir),
        None => config.destination(),
    }
}

fn exit_status(outcome: &ChangeOutcome) -> u8 {
    if outcome.is_indeterminate() {
        EXIT_INDETERMINATE
    } else {
        0
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let app_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Check(args) => {
            let settings = args.settings(&app_config)?;
            let outcome = commands::check::run(&settings).await?;
            Ok(ExitCode::from(exit_status(&outcome)))
        }
        Command::Clean {
            input,
            names,
            filter,
            filter_column,
            dedup_key,
            dest,
        } => {
            let destination = resolve_destination(dest, &app_config)?;
            let input = input.unwrap_or_else(|| app_config.dataset_path(&destination));
            let overrides = CleanOverrides {
                names,
                filter,
                filter_column,
                dedup_key,
            };
            let options = overrides.apply(app_config.clean.to_options(&destination)?)?;
            commands::clean::run(&input, &options)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Refresh(args) => {
            let settings = args.settings(&app_config)?;
            let outcome = commands::refresh::run(&settings, &app_config).await?;
            Ok(ExitCode::from(exit_status(&outcome)))
        }
        Command::Status { dest } => {
            let destination = resolve_destination(dest, &app_config)?;
            commands::status::run(&destination, &app_config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "recall-sync",
            "check",
            "--url",
            "https://example.test/a.zip",
            "--dest",
            "/tmp/recalls",
            "--scope",
            "all-entries",
            "--timeout",
            "5",
        ])
        .unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };

        let settings = args.settings(&AppConfig::default()).unwrap();
        assert_eq!(settings.url, "https://example.test/a.zip");
        assert_eq!(settings.destination, PathBuf::from("/tmp/recalls"));
        assert_eq!(settings.scope, FingerprintScope::AllEntries);
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_fills_missing_flags() {
        let cli = Cli::try_parse_from(["recall-sync", "refresh"]).unwrap();
        let Command::Refresh(args) = cli.command else {
            panic!("expected refresh");
        };
        let config = AppConfig {
            url: "https://mirror.test/FLAT_RCL.zip".into(),
            destination: Some("/srv/recalls".into()),
            timeout_secs: 42,
            ..AppConfig::default()
        };

        let settings = args.settings(&config).unwrap();
        assert_eq!(settings.url, "https://mirror.test/FLAT_RCL.zip");
        assert_eq!(settings.destination, PathBuf::from("/srv/recalls"));
        assert_eq!(settings.scope, FingerprintScope::FirstEntry);
        assert_eq!(settings.timeout, Duration::from_secs(42));
    }

    #[test]
    fn bad_scope_is_rejected() {
        assert!(Cli::try_parse_from(["recall-sync", "check", "--scope", "some"]).is_err());
    }

    #[test]
    fn verbosity_is_global_and_counted() {
        let cli = Cli::try_parse_from(["recall-sync", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn indeterminate_maps_to_exit_three() {
        let outcome = ChangeOutcome::Indeterminate {
            reason: "not an archive".into(),
        };
        assert_eq!(exit_status(&outcome), EXIT_INDETERMINATE);
        assert_eq!(
            exit_status(&ChangeOutcome::Unchanged {
                fingerprint: "x".into()
            }),
            0
        );
    }
}
