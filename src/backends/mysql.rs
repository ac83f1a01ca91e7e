//! Compressed dumps of the MySQL databases of the account using [MySqlDump].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use chrono::{Datelike, Local};
use derive_more::{Display, Error, From};

use crate::dreamhost::Record;
use crate::util::command::{CommandRunner, CommandSpec};
use crate::util::path::abbreviate_home;

const MYSQLDUMP: &str = "mysqldump";

/// A database as listed by `mysql-list_users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    /// Name of the database.
    pub name: String,
    /// Host serving the database.
    pub host: String,
    /// MySQL user with access to the database.
    pub user: String,
}

/// A `mysql-list_users` row lacks a field needed to dump its database.
#[derive(Debug, Display, Error)]
#[display("Database listing lacks field '{_0}'")]
pub struct MissingField(#[error(ignore)] &'static str);

impl TryFrom<&Record> for Database {
    type Error = MissingField;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let field = |name: &'static str| {
            record
                .get(name)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or(MissingField(name))
        };

        Ok(Self {
            name: field("db")?,
            host: field("home")?,
            user: field("username")?,
        })
    }
}

/// A compressed dump written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArtifact {
    pub database: String,
    pub path: PathBuf,
    /// Size of the compressed dump in bytes.
    pub size: u64,
}

impl DumpArtifact {
    /// The path with the home directory abbreviated to `~`.
    pub fn display_path(&self) -> String {
        abbreviate_home(&self.path)
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on dumping a single database.
pub enum DumpError {
    /// `mysqldump` couldn't be executed.
    #[display("Running mysqldump failed: {_0}")]
    #[from]
    Spawn(io::Error),
    /// `mysqldump` reported errors, its output was discarded.
    #[display("mysqldump reported: {}", _0.trim_end())]
    Stderr(#[error(ignore)] String),
    /// The compressed dump couldn't be written.
    #[display("Writing {} failed: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Dumps databases with `mysqldump` into bzip2 compressed files.
///
/// The files are named after the database and the day of the week
/// (`<db>.w<0-6>.sql.bz2`, Sunday being 0) so a week of dumps is kept and
/// each day overwrites the dump of the same weekday before.
pub struct MySqlDump<R> {
    runner: R,
    dump_dir: PathBuf,
    weekday: u32,
    dry_run: bool,
}

impl<R: CommandRunner> MySqlDump<R> {
    /// Create a new [MySqlDump] writing to `dump_dir`, named after today.
    pub fn new(runner: R, dump_dir: &Path, dry_run: bool) -> Self {
        let weekday = Local::now().weekday().num_days_from_sunday();
        Self::for_weekday(runner, dump_dir, weekday, dry_run)
    }

    /// Like [new](Self::new) but for the given day of the week (0-6, Sunday is 0).
    pub fn for_weekday(runner: R, dump_dir: &Path, weekday: u32, dry_run: bool) -> Self {
        if dump_dir.is_relative() {
            log::debug!(target: "backend::mysql", "dump_dir is relative: {}", dump_dir.display());
        }

        Self {
            runner,
            dump_dir: dump_dir.to_path_buf(),
            weekday,
            dry_run,
        }
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    /// Path of the dump of `database` for the configured weekday.
    pub fn dump_file(&self, database: &str) -> PathBuf {
        self.dump_dir
            .join(format!("{database}.w{}.sql.bz2", self.weekday))
    }

    /// The `mysqldump` invocation for `db`.
    ///
    /// The password is handed over through the environment so it neither
    /// shows up in the process list nor triggers mysqldump's warning about
    /// passwords on the command line.
    pub fn dump_command(db: &Database, password: &str) -> CommandSpec {
        CommandSpec::new(MYSQLDUMP)
            .arg("-c") // complete inserts
            .arg(format!("-h{}", db.host))
            .arg(format!("-u{}", db.user))
            .arg(&db.name)
            .env("MYSQL_PWD", password)
    }

    /// Dumps `db` and writes it compressed to [dump_file](Self::dump_file).
    ///
    /// Anything `mysqldump` writes to stderr fails the dump: the captured
    /// output is discarded and no file is written, so a broken dump never
    /// replaces the one of last week.
    pub fn dump(&self, db: &Database, password: &str) -> Result<DumpArtifact, DumpError> {
        log::info!(target: "backend::mysql", "Create database dump of {} on {}", db.name, db.host);
        log::trace!(target: "backend::mysql", "Using user '{}' for dump", db.user);

        let output = self.runner.run(&Self::dump_command(db, password))?;
        if !output.stderr.is_empty() {
            return Err(DumpError::Stderr(output.stderr_lossy()));
        }
        if !output.success() {
            log::warn!(target: "backend::mysql", "mysqldump exited with {:?} without reporting an error", output.code);
        }

        let path = self.dump_file(&db.name);
        let written = if self.dry_run {
            log::debug!(target: "backend::mysql", "Dry-run: not writing {}", path.display());
            compress(&output.stdout, io::sink())
        } else {
            self.write(&path, &output.stdout)
        };
        let size = written.map_err(|source| DumpError::Write {
            path: path.clone(),
            source,
        })?;

        log::debug!(target: "backend::mysql", "Finished dump of {} ({size} bytes)", db.name);

        Ok(DumpArtifact {
            database: db.name.clone(),
            path,
            size,
        })
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<u64> {
        fs::create_dir_all(&self.dump_dir)?;
        let file = File::create(path)?;
        compress(content, file)?;

        Ok(fs::metadata(path)?.len())
    }
}

/// Compresses `content` into `writer`, returns the compressed size.
fn compress<W: Write>(content: &[u8], writer: W) -> io::Result<u64> {
    let mut encoder = BzEncoder::new(CountingWriter::new(writer), Compression::default());
    encoder.write_all(content)?;
    let mut counter = encoder.finish()?;
    counter.flush()?;

    Ok(counter.written)
}

struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
