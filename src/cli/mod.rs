use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::backends::Credential;

#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// DreamHost API key with access to the `mysql-*` and `user-*` commands.
    #[arg(env = "DH_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Configuration file. [default: ~/.dh-backup.toml if it exists]
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Password of a MySQL user, may be given multiple times.
    #[arg(long = "mysql-user", short = 'u', value_name = "USER=PASSWORD")]
    pub mysql_users: Vec<Credential>,

    /// Local directory for the database dumps. [default: backups/mysql]
    #[arg(long, short = 'd', value_name = "DIR")]
    pub mysql_dir: Option<PathBuf>,

    /// Skip the MySQL backup altogether.
    #[arg(long)]
    pub skip_mysql: bool,

    /// Don't create new database dumps.
    #[arg(long)]
    pub skip_mysql_dumps: bool,

    /// Don't sync the database dumps to the backup user.
    #[arg(long)]
    pub skip_mysql_rsync: bool,

    /// Endpoint of the DreamHost API. [default: https://api.dreamhost.com/]
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Abort API requests and external commands after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory on the backup user's host receiving the dumps. [default: mysql/]
    #[arg(long, value_name = "DIR")]
    pub remote_dir: Option<String>,

    /// Simulative backup run.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_everything() {
        let cli = Cli::try_parse_from([
            "dh-backup",
            "APIKEY",
            "-u",
            "alice=secret",
            "--mysql-user",
            "bob=hunter2",
            "-d",
            "/srv/dumps",
            "--skip-mysql-rsync",
            "--timeout",
            "600",
            "--verbose",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.key.as_deref(), Some("APIKEY"));
        assert_eq!(cli.mysql_users.len(), 2);
        assert_eq!(cli.mysql_users[1].user, "bob");
        assert_eq!(cli.mysql_dir, Some(PathBuf::from("/srv/dumps")));
        assert!(cli.skip_mysql_rsync);
        assert!(!cli.skip_mysql_dumps);
        assert_eq!(cli.timeout, Some(600));
        assert_eq!(cli.verbose, Some(LevelFilter::Debug));
    }

    #[test]
    fn rejects_malformed_credentials() {
        assert!(Cli::try_parse_from(["dh-backup", "KEY", "-u", "alice"]).is_err());
    }
}
