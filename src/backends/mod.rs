//! Backend modules for performing individual backup tasks.
//!
//! Currently the following backends are implemented:
//!
//! - [MySqlDump]: Compressed dumps of the account's MySQL databases.
//! - [RemoteSync]: Replication of the dumps to the account's backup user.
//!
//! Passwords of the database users are looked up in [Credentials].

pub mod credentials;
pub mod mysql;
pub mod rsync;

pub use credentials::{Credential, Credentials};
pub use mysql::{Database, DumpArtifact, DumpError, MySqlDump};
pub use rsync::{BackupAccount, RemoteSync, SyncError, SyncReport};
