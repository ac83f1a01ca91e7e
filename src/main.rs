use std::io::Write;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::LevelFilter;

use dh_backup_lib::cli::Cli;
use dh_backup_lib::config::{Config, ConfigError, FileConfig};
use dh_backup_lib::dreamhost::Api;
use dh_backup_lib::job::{BackupJob, RunReport, SyncStatus};
use dh_backup_lib::util::command::SystemRunner;

const PROGRAM: &str = env!("CARGO_BIN_NAME");

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = FileConfig::discover(cli.config.as_deref())
        .and_then(|file| Config::from_sources(&cli, file));
    let config = match config {
        Ok(config) => config,
        Err(ConfigError::MissingKey) => Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "no API key provided (pass KEY, set DH_API_KEY or `key` in the config file)",
            )
            .exit(),
        Err(e) => {
            init_logger(cli.verbose.unwrap_or(LevelFilter::Warn));
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    init_logger(cli.verbose.unwrap_or_else(|| config.log_level()));
    log::debug!("Dumping to {} for users {:?}", config.mysql_dir.display(), config.users);

    if config.dry_run {
        log::warn!("Running in dry-run mode");
    }

    let api = match Api::with_url(config.key.as_str(), config.api_url.as_str(), config.timeout) {
        Ok(api) => api,
        Err(e) => {
            log::error!("Setting up the API client failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let runner = SystemRunner::with_timeout(config.timeout);

    match BackupJob::new(&config, api, runner).run() {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!(target: "job", "Backup of the MySQL databases resulted in a fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr as `<program>: <level>: <message>`.
fn init_logger(level: LevelFilter) {
    let mut env_logger = env_logger::Builder::new();
    env_logger
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{PROGRAM}: {}: {}",
                record.level().as_str().to_lowercase(),
                record.args()
            )
        });

    if let Err(e) = env_logger.try_init() {
        eprintln!("{PROGRAM}: logger setup failed: {e}");
    }
}

fn print_report(report: &RunReport) {
    for artifact in &report.dumped {
        println!(
            "{} was backed up successfully to {} ({} bytes).",
            artifact.database,
            artifact.display_path(),
            artifact.size
        );
    }

    if let SyncStatus::Done(sync) = &report.sync {
        print!("{}", sync.stdout);
    }
}
