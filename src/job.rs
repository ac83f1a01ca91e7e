//! The backup run: discovery, dumps and replication of the MySQL databases.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use derive_more::{Display, Error, From};

use crate::backends::{BackupAccount, Database, DumpArtifact, MySqlDump, RemoteSync, SyncError, SyncReport};
use crate::config::Config;
use crate::dreamhost::{Api, ApiError, Transport, CMD_LIST_USERS, CMD_MYSQL_LIST_USERS};
use crate::util::command::CommandRunner;

#[derive(Debug, Display, Error, From)]
/// Errors aborting a backup run.
pub enum JobError {
    /// Discovery through the API failed.
    #[from]
    Api(ApiError),
    /// The local dump directory can't be created.
    #[display("Creating the dump directory {} failed: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

/// Outcome of the sync phase.
#[derive(Debug, Default)]
pub enum SyncStatus {
    /// Skipped by configuration.
    #[default]
    Skipped,
    /// The account has no backup user to sync to.
    NoBackupAccount,
    Done(SyncReport),
    Failed(SyncError),
}

/// What a backup run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Dumps written, in order of creation.
    pub dumped: Vec<DumpArtifact>,
    /// Databases whose dump failed.
    pub failed: Vec<String>,
    /// Databases skipped because their user has no configured password.
    pub unauthenticated: Vec<String>,
    pub sync: SyncStatus,
}

/// A single backup run of an account.
///
/// Everything runs sequentially: one API request, one dump, one external
/// program at a time.
pub struct BackupJob<'c, T, R> {
    config: &'c Config,
    api: Api<T>,
    runner: R,
}

impl<'c, T: Transport, R: CommandRunner> BackupJob<'c, T, R> {
    pub fn new(config: &'c Config, api: Api<T>, runner: R) -> Self {
        Self { config, api, runner }
    }

    /// Runs every phase not skipped by the [Config].
    ///
    /// Failures of single dumps and of the sync are recorded in the
    /// [RunReport] and don't abort the run, failing API requests do.
    pub fn run(&mut self) -> Result<RunReport, JobError> {
        let mut report = RunReport::default();
        if self.config.skip_mysql {
            log::info!(target: "job", "Skipping MySQL backup");
            return Ok(report);
        }

        let account = if self.config.skip_mysql_rsync {
            None
        } else {
            Some(self.backup_account()?)
        };

        if self.config.skip_mysql_dumps {
            log::info!(target: "job", "Skipping MySQL dumps");
        } else {
            self.dump_databases(&mut report)?;
        }

        report.sync = match account {
            None => {
                log::info!(target: "job", "Skipping MySQL rsync");
                SyncStatus::Skipped
            }
            Some(None) => {
                log::warn!(target: "job", "No backup user found, not syncing the database dumps");
                SyncStatus::NoBackupAccount
            }
            Some(Some(account)) => self.sync(&account),
        };

        Ok(report)
    }

    /// The backup user of the account, if there is one.
    pub fn backup_account(&mut self) -> Result<Option<BackupAccount>, JobError> {
        let users = self.api.request(CMD_LIST_USERS, &[])?;
        let account = BackupAccount::find(users.ensure_success()?);
        if let Some(account) = &account {
            log::debug!(target: "job", "Backup user: {account}");
        }

        Ok(account)
    }

    /// Every database row of the listing, in listing order.
    ///
    /// A database shared by several MySQL users is listed once per user.
    pub fn databases(&mut self) -> Result<Vec<Database>, JobError> {
        let listing = self.api.request(CMD_MYSQL_LIST_USERS, &[])?;
        let listing = listing.ensure_success()?;

        let databases = listing
            .records()
            .iter()
            .filter_map(|record| match Database::try_from(record) {
                Ok(db) => Some(db),
                Err(e) => {
                    log::warn!(target: "job", "Ignoring database: {e}");
                    None
                }
            })
            .collect();

        Ok(databases)
    }

    /// Dumps every database once, using the first listed user with a password.
    fn dump_databases(&mut self, report: &mut RunReport) -> Result<(), JobError> {
        let databases = self.databases()?;

        let dump_dir = &self.config.mysql_dir;
        if !self.config.dry_run {
            fs::create_dir_all(dump_dir).map_err(|source| JobError::CreateDir {
                path: dump_dir.clone(),
                source,
            })?;
        }

        let dumper = MySqlDump::new(&self.runner, dump_dir, self.config.dry_run);
        let mut processed = BTreeSet::new();
        let mut unauthenticated = Vec::new();
        for db in databases {
            if processed.contains(&db.name) {
                continue;
            }
            let Some(password) = self.config.users.password_for(&db.user) else {
                if !unauthenticated.contains(&db.name) {
                    unauthenticated.push(db.name);
                }
                continue;
            };
            processed.insert(db.name.clone());

            match dumper.dump(&db, password) {
                Ok(artifact) => report.dumped.push(artifact),
                Err(e) => {
                    log::warn!(target: "job", "An error occurred while backing up {} to {}: {e}", db.name, dumper.dump_file(&db.name).display());
                    report.failed.push(db.name);
                }
            }
        }

        // a later row of another user may have provided the password
        report.unauthenticated = unauthenticated
            .into_iter()
            .filter(|name| !processed.contains(name))
            .collect();
        if !report.unauthenticated.is_empty() {
            log::warn!(
                target: "job",
                "No password configured for the users of these databases: {}",
                report.unauthenticated.join(", ")
            );
        }
        log::info!(target: "job", "Backed up {} of {} databases", report.dumped.len(), processed.len() + report.unauthenticated.len());

        Ok(())
    }

    fn sync(&self, account: &BackupAccount) -> SyncStatus {
        let remote = RemoteSync::new(&self.runner, self.config.remote_dir.as_str(), self.config.dry_run);
        match remote.sync(account, &self.config.mysql_dir) {
            Ok(report) => SyncStatus::Done(report),
            Err(e) => {
                log::warn!(target: "job", "Not syncing database dumps: {e}");
                SyncStatus::Failed(e)
            }
        }
    }
}
