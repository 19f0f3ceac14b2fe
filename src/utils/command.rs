//! Command execution primitives with live output and capture.
//!
//! Every external program is spawned with a discrete argument vector. While the
//! child runs, its stdout and stderr are drained concurrently on two scoped
//! threads; each chunk is forwarded to the caller's stream and appended to an
//! in-memory buffer. The child is reaped only after both drains finish.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::shell;

const CHUNK_SIZE: usize = 8 * 1024;

/// A program plus its ordered argument list. Never joined into a single string
/// for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Inspects state without changing it (safe to run during a dry run).
    pub read_only: bool,
}

impl Invocation {
    /// A command with side effects.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            read_only: false,
        }
    }

    /// A read-only inspection command.
    pub fn query<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            read_only: true,
            ..Self::new(program, args)
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell::quote_arg(&self.program))?;
        if !self.args.is_empty() {
            write!(f, " {}", shell::quote_args(&self.args))?;
        }
        Ok(())
    }
}

/// Exit status and byte-exact captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Seam between the deployment steps and the operating system.
pub trait CommandRunner {
    /// Run to completion. A non-zero exit is `Err` with `ErrorCode::CommandFailed`.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        (**self).run(invocation)
    }
}

/// Runs commands for real, echoing their output on this process's stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingRunner;

impl CommandRunner for StreamingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        log_status!("run", "{}", invocation);
        run_with_sinks(invocation, &mut io::stdout(), &mut io::stderr())
    }
}

/// Executes read-only invocations through the inner runner and only prints the
/// rest, reporting them as successful with empty output.
pub struct DryRunRunner<R> {
    inner: R,
}

impl<R: CommandRunner> DryRunRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: CommandRunner> CommandRunner for DryRunRunner<R> {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if invocation.read_only {
            return self.inner.run(invocation);
        }
        eprintln!("[dry-run] {}", invocation);
        Ok(CommandOutput::default())
    }
}

/// Spawn `invocation`, tee its stdout/stderr into the given sinks, and wait.
pub fn run_with_sinks<O, E>(
    invocation: &Invocation,
    stdout_sink: &mut O,
    stderr_sink: &mut E,
) -> Result<CommandOutput>
where
    O: Write + Send,
    E: Write + Send,
{
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::command_spawn_failed(
                invocation.program.clone(),
                invocation.args.clone(),
                e.to_string(),
            )
        })?;

    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::internal_unexpected("child stdout was not piped"))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::internal_unexpected("child stderr was not piped"))?;

    let (stdout, stderr) = thread::scope(|scope| {
        let out = scope.spawn(move || copy_and_capture(child_stdout, stdout_sink));
        let err = scope.spawn(move || copy_and_capture(child_stderr, stderr_sink));
        (join_drain(out), join_drain(err))
    });

    // Reap before reporting drain errors so no zombie is left behind.
    let status = child.wait().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("wait for {}", invocation.program)))
    })?;

    let stdout = stdout.map_err(|e| drain_error(invocation, "stdout", e))?;
    let stderr = stderr.map_err(|e| drain_error(invocation, "stderr", e))?;

    let output = CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    };

    if !status.success() {
        return Err(Error::command_failed(CommandFailedDetails {
            program: invocation.program.clone(),
            args: invocation.args.clone(),
            exit_code: output.exit_code,
            stdout: output.stdout_str(),
            stderr: output.stderr_str(),
        }));
    }

    Ok(output)
}

/// Read `reader` to EOF, forwarding each chunk to `sink` and buffering it.
///
/// A failed sink write stops forwarding but not reading, so the child never
/// blocks on a full pipe.
fn copy_and_capture<R: Read, W: Write>(mut reader: R, sink: &mut W) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; CHUNK_SIZE];
    let mut forwarding = true;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let chunk = &buf[..n];
        captured.extend_from_slice(chunk);

        if forwarding && sink.write_all(chunk).and_then(|_| sink.flush()).is_err() {
            forwarding = false;
        }
    }

    Ok(captured)
}

fn join_drain(handle: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output drain thread panicked")))
}

fn drain_error(invocation: &Invocation, stream: &str, e: io::Error) -> Error {
    Error::internal_io(
        e.to_string(),
        Some(format!("capture {} of {}", stream, invocation.program)),
    )
}
