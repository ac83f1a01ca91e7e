//! Configuration of a backup run.
//!
//! Settings are read from an optional TOML file and the command line, where
//! the command line wins:
//!
//! ```toml
//! key = "6SHU5P2HLDAYECUM"
//! verbose = false
//! mysql_dir = "~/backups/mysql"
//! skip_mysql = false
//! skip_mysql_dumps = false
//! skip_mysql_rsync = false
//! timeout = 3600
//!
//! [users]
//! alice = "s3cr3t"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_more::{Display, Error};
use log::LevelFilter;

use crate::backends::rsync::DEFAULT_REMOTE_DIR;
use crate::backends::Credentials;
use crate::cli::Cli;
use crate::dreamhost::DEFAULT_API_URL;
use crate::util::path::expand_home;

/// Local directory for database dumps unless configured otherwise.
pub const DEFAULT_MYSQL_DIR: &str = "backups/mysql";
/// Configuration file read when none is given explicitly, relative to home.
pub const DEFAULT_CONFIG_FILE: &str = ".dh-backup.toml";

/// Contents of the configuration file, every setting is optional.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub key: Option<String>,
    pub verbose: Option<bool>,
    pub mysql_dir: Option<PathBuf>,
    pub skip_mysql: Option<bool>,
    pub skip_mysql_dumps: Option<bool>,
    pub skip_mysql_rsync: Option<bool>,
    pub api_url: Option<String>,
    pub timeout: Option<u64>,
    pub remote_dir: Option<String>,
    pub users: Credentials,
}

impl FileConfig {
    /// Reads the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the file given with `--config`, or the default file if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE)) {
            Some(path) if path.is_file() => {
                log::debug!(target: "config", "Reading {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Display, Error)]
/// Errors on assembling the [Config].
pub enum ConfigError {
    /// The configuration file can't be read.
    #[display("Reading the config file {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The configuration file isn't valid.
    #[display("Parsing the config file {} failed: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Neither command line nor configuration file provide an API key.
    #[display("no API key provided")]
    MissingKey,
}

/// Settings of a backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Key of the DreamHost API. Required.
    pub key: String,
    /// More output. Default: `false`.
    pub verbose: bool,
    /// Local directory of the database dumps. Default: [DEFAULT_MYSQL_DIR].
    pub mysql_dir: PathBuf,
    /// Skip the whole MySQL backup. Default: `false`.
    pub skip_mysql: bool,
    /// Skip creating dumps, still syncing existing ones. Default: `false`.
    pub skip_mysql_dumps: bool,
    /// Skip syncing the dumps. Default: `false`.
    pub skip_mysql_rsync: bool,
    /// Passwords of the MySQL users.
    pub users: Credentials,
    /// Default: [DEFAULT_API_URL].
    pub api_url: String,
    /// Limit for API requests and external commands. Default: none.
    pub timeout: Option<Duration>,
    /// Directory on the backup user's host. Default: [DEFAULT_REMOTE_DIR].
    pub remote_dir: String,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

impl Config {
    /// Config made of command line values, falling back to `file`.
    pub fn from_sources(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let key = cli
            .key
            .clone()
            .or(file.key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingKey)?;

        let verbose = match cli.verbose {
            Some(level) => level >= LevelFilter::Info,
            None => file.verbose.unwrap_or(false),
        };

        let mysql_dir = cli
            .mysql_dir
            .clone()
            .or(file.mysql_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MYSQL_DIR));

        let mut users = file.users;
        users.merge(cli.mysql_users.iter().cloned().collect());

        Ok(Self {
            key,
            verbose,
            mysql_dir: expand_home(&mysql_dir),
            skip_mysql: cli.skip_mysql || file.skip_mysql.unwrap_or(false),
            skip_mysql_dumps: cli.skip_mysql_dumps || file.skip_mysql_dumps.unwrap_or(false),
            skip_mysql_rsync: cli.skip_mysql_rsync || file.skip_mysql_rsync.unwrap_or(false),
            users,
            api_url: cli
                .api_url
                .clone()
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: cli.timeout.or(file.timeout).map(Duration::from_secs),
            remote_dir: cli
                .remote_dir
                .clone()
                .or(file.remote_dir)
                .unwrap_or_else(|| DEFAULT_REMOTE_DIR.to_string()),
            dry_run: cli.dry_run,
        })
    }

    /// Log level unless overridden by `--verbose`.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}
