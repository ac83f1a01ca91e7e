//! Replication of the local dumps to the backup user of the account using [RemoteSync].

use std::fmt;
use std::io;
use std::path::Path;

use derive_more::{Display, Error};

use crate::dreamhost::{Record, Response};
use crate::util::command::{CommandRunner, CommandSpec};

/// Value of the `type` field marking the backup user.
pub const BACKUP_USER_TYPE: &str = "backup";
/// Directory on the backup user's host receiving the dumps.
pub const DEFAULT_REMOTE_DIR: &str = "mysql/";

/// The user dedicated to receive backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupAccount {
    pub user: String,
    pub host: String,
}

impl BackupAccount {
    /// The first user of `users` (`user-list_users_no_pw`) with type `backup`.
    pub fn find(users: &Response) -> Option<Self> {
        users
            .list("type", BACKUP_USER_TYPE)
            .find_map(Self::from_record)
    }

    fn from_record(record: &Record) -> Option<Self> {
        let user = record.get("username").filter(|s| !s.is_empty())?;
        let host = record.get("home").filter(|s| !s.is_empty())?;

        Some(Self {
            user: user.to_string(),
            host: host.to_string(),
        })
    }

    /// `user@host` address of the account.
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BackupAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

#[derive(Debug, Display, Error)]
/// Errors on replicating the dumps.
pub enum SyncError {
    /// Logging in with a public key failed, there's no unattended way to sync.
    #[display("Public key authentication to {address} failed, add this host's key to the backup user's authorized_keys")]
    NotTrusted { address: String },
    /// `rsync` couldn't be executed.
    #[display("Running rsync failed: {_0}")]
    Spawn(io::Error),
    /// `rsync` exited unsuccessfully.
    #[display("rsync exited with {}: {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()), stderr.trim_end())]
    Failed { code: Option<i32>, stderr: String },
}

/// Output of a successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub stdout: String,
    pub stderr: String,
}

/// Mirrors a local directory to the backup user with `rsync` over `ssh`.
pub struct RemoteSync<R> {
    runner: R,
    remote_dir: String,
    dry_run: bool,
}

impl<R: CommandRunner> RemoteSync<R> {
    pub fn new(runner: R, remote_dir: impl Into<String>, dry_run: bool) -> Self {
        Self {
            runner,
            remote_dir: remote_dir.into(),
            dry_run,
        }
    }

    /// A no-op remote command that only succeeds with key based login.
    pub fn probe_command(account: &BackupAccount) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg(account.address())
            .arg("true")
    }

    pub fn sync_command(&self, account: &BackupAccount, local_dir: &Path) -> CommandSpec {
        // trailing slash: sync the content, not the directory itself
        let source = format!("{}/", local_dir.display().to_string().trim_end_matches('/'));
        let destination = format!("{}:{}", account.address(), self.remote_dir);

        let command = CommandSpec::new("rsync").args(["-avz", "-e", "ssh"]);
        let command = if self.dry_run {
            command.arg("--dry-run")
        } else {
            command
        };
        command.arg(source).arg(destination)
    }

    /// Whether `account` accepts our public key without asking for a password.
    pub fn is_trusted(&self, account: &BackupAccount) -> bool {
        match self.runner.run(&Self::probe_command(account)) {
            Ok(output) if output.success() => true,
            Ok(output) => {
                log::debug!(target: "backend::rsync", "ssh probe exited with {:?}: {}", output.code, output.stderr_lossy().trim_end());
                false
            }
            Err(e) => {
                log::debug!(target: "backend::rsync", "ssh probe couldn't be run: {e}");
                false
            }
        }
    }

    /// Mirrors `local_dir` into the remote directory of `account`.
    pub fn sync(&self, account: &BackupAccount, local_dir: &Path) -> Result<SyncReport, SyncError> {
        if !self.is_trusted(account) {
            return Err(SyncError::NotTrusted {
                address: account.address(),
            });
        }

        log::info!(target: "backend::rsync", "Sync {} to {account}:{}", local_dir.display(), self.remote_dir);
        let output = self
            .runner
            .run(&self.sync_command(account, local_dir))
            .map_err(SyncError::Spawn)?;

        if !output.success() {
            return Err(SyncError::Failed {
                code: output.code,
                stderr: output.stderr_lossy(),
            });
        }

        let report = SyncReport {
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        };
        if !report.stderr.trim().is_empty() {
            log::warn!(target: "backend::rsync", "{}", report.stderr.trim_end());
        }
        log::info!(target: "backend::rsync", "Finished sync to {account}");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::util::command::CommandOutput;

    /// Answers the ssh probe with `probe_code` and rsync with `rsync_code`.
    struct FakeRemote {
        probe_code: i32,
        rsync_code: i32,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl FakeRemote {
        fn new(probe_code: i32, rsync_code: i32) -> Self {
            Self {
                probe_code,
                rsync_code,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }
    }

    impl CommandRunner for FakeRemote {
        fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.borrow_mut().push(command.clone());
            let code = if command.program == "ssh" {
                self.probe_code
            } else {
                self.rsync_code
            };
            Ok(CommandOutput {
                code: Some(code),
                stdout: b"sending incremental file list\n".to_vec(),
                stderr: if code == 0 { Vec::new() } else { b"boom\n".to_vec() },
            })
        }
    }

    fn account() -> BackupAccount {
        BackupAccount {
            user: "b123456".into(),
            host: "backup.example.com".into(),
        }
    }

    #[test]
    fn finds_backup_user() {
        let users = Response::parse(
            "user-list_users_no_pw",
            "success\n\
             account_id\tusername\ttype\tshell\thome\n\
             1\talice\tshell\t/bin/bash\tserver.example.com\n\
             1\tb123456\tbackup\t\tbackup.example.com\n",
        )
        .unwrap();

        assert_eq!(BackupAccount::find(&users), Some(account()));
    }

    #[test]
    fn no_backup_user() {
        let users = Response::parse(
            "user-list_users_no_pw",
            "success\nusername\ttype\thome\nalice\tshell\tserver.example.com\n",
        )
        .unwrap();

        assert_eq!(BackupAccount::find(&users), None);
    }

    #[test]
    fn probe_uses_batch_mode() {
        let probe = RemoteSync::<FakeRemote>::probe_command(&account());
        assert_eq!(probe.to_string(), "ssh -o BatchMode=yes b123456@backup.example.com true");
    }

    #[test]
    fn sync_command_mirrors_directory_content() {
        let runner = FakeRemote::new(0, 0);
        let sync = RemoteSync::new(&runner, DEFAULT_REMOTE_DIR, false);

        let command = sync.sync_command(&account(), Path::new("/home/alice/backups/mysql/"));
        assert_eq!(
            command.to_string(),
            "rsync -avz -e ssh /home/alice/backups/mysql/ b123456@backup.example.com:mysql/"
        );

        let dry = RemoteSync::new(&runner, "dumps", true);
        let command = dry.sync_command(&account(), Path::new("backups/mysql"));
        assert_eq!(
            command.args,
            ["-avz", "-e", "ssh", "--dry-run", "backups/mysql/", "b123456@backup.example.com:dumps"]
        );
    }

    #[test]
    fn failed_probe_skips_rsync() {
        let runner = FakeRemote::new(1, 0);
        let sync = RemoteSync::new(&runner, DEFAULT_REMOTE_DIR, false);

        let err = sync.sync(&account(), Path::new("backups/mysql")).unwrap_err();

        assert!(matches!(err, SyncError::NotTrusted { .. }));
        assert_eq!(runner.programs(), ["ssh"]);
    }

    #[test]
    fn successful_sync_returns_output() {
        let runner = FakeRemote::new(0, 0);
        let sync = RemoteSync::new(&runner, DEFAULT_REMOTE_DIR, false);

        let report = sync.sync(&account(), Path::new("backups/mysql")).unwrap();

        assert_eq!(report.stdout, "sending incremental file list\n");
        assert_eq!(runner.programs(), ["ssh", "rsync"]);
    }

    #[test]
    fn failing_rsync_surfaces_stderr() {
        let runner = FakeRemote::new(0, 23);
        let sync = RemoteSync::new(&runner, DEFAULT_REMOTE_DIR, false);

        let err = sync.sync(&account(), Path::new("backups/mysql")).unwrap_err();
        assert_eq!(err.to_string(), "rsync exited with 23: boom");
    }
}
