//! Execution of external programs.
//!
//! Backends never spawn processes themselves, they describe the invocation as
//! a [CommandSpec] and hand it to a [CommandRunner].

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Additional environment of the child. Values aren't shown on [Display](fmt::Display).
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, _) in &self.env {
            write!(f, "{key}=*** ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, [None] if the program was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Capability to run a program to completion and capture its output.
pub trait CommandRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        (**self).run(command)
    }
}

/// Runs programs as child processes of this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// Children running longer than `timeout` are killed.
    ///
    /// Without a timeout [run](CommandRunner::run) blocks until the child exits.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        log::trace!(target: "util::command", "Running: {spec}");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());

        let Some(timeout) = self.timeout else {
            let output = command.output()?;
            return Ok(CommandOutput {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        };

        let child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        wait_with_timeout(child, timeout, &spec.program)
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration, program: &str) -> io::Result<CommandOutput> {
    // drain both pipes concurrently, a full pipe would stall the child
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            log::warn!(target: "util::command", "{program} timed out after {}s, killing it", timeout.as_secs());
            child.kill()?;
            child.wait()?;
            // the pipes are closed now, don't leave the readers behind
            let _ = join(stdout);
            let _ = join(stderr);
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{program} did not finish within {}s", timeout.as_secs()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        code: status.code(),
        stdout: join(stdout)?,
        stderr: join(stderr)?,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("pipe reader panicked"))?,
    }
}
