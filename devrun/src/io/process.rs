//! Helpers for running one child process, optionally with a timeout and
//! bounded output capture.

use std::fmt;
use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Where child stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCapture {
    /// Child shares the runner's stdout/stderr.
    Inherit,
    /// Child output is piped and kept up to `limit_bytes` per stream.
    Capture { limit_bytes: usize },
}

/// Child process result. Output buffers are empty in inherit mode.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// The program could not be started at all.
#[derive(Debug)]
pub struct SpawnError {
    pub program: String,
    pub source: std::io::Error,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.program, self.source)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// How long to keep draining pipes after a timed-out child has been killed.
///
/// A process outside the killed group (e.g. one that called `setsid`) can keep
/// the pipes open indefinitely; whatever arrived by then is reported.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(500);

/// Run a command to completion.
///
/// stdin is always closed. In capture mode stdout/stderr are read concurrently
/// while the child runs so a chatty tool can never deadlock on a full pipe;
/// bytes beyond the limit are drained and counted but not stored.
///
/// `timeout` is a wall-clock limit. On unix a command with a timeout runs in
/// its own process group, and on expiry the whole group is killed so tools
/// that fork (`poetry run`, `sh -c`, pytest workers) cannot outlive it. The
/// call returns shortly after the deadline with `timed_out` set.
///
/// Spawn failures are returned as [`SpawnError`] so callers can tell "tool
/// missing" apart from other runner errors.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.map(|t| t.as_secs())))]
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    capture: OutputCapture,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    match capture {
        OutputCapture::Inherit => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputCapture::Capture { .. } => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if timeout.is_some() {
            cmd.process_group(0);
        }
    }

    debug!("spawning child process");
    let mut child = cmd.spawn().map_err(|source| SpawnError {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    let readers = match capture {
        OutputCapture::Inherit => None,
        OutputCapture::Capture { limit_bytes } => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("stdout was not piped"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("stderr was not piped"))?;
            Some(StreamReaders::spawn(stdout, stderr, limit_bytes))
        }
    };

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                kill_tree(&mut child)?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    let ((stdout, stdout_truncated), (stderr, stderr_truncated)) = match readers {
        None => ((Vec::new(), 0), (Vec::new(), 0)),
        Some(readers) => {
            let drain_limit = timed_out.then_some(DRAIN_AFTER_KILL);
            readers.finish(drain_limit)?
        }
    };

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Kill the child and, on unix, every process in its group.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let pgid = libc::pid_t::try_from(child.id()).context("child pid out of range")?;
    // SAFETY: kill(2) takes plain integers and touches no memory. The group id
    // is the child's pid because it was spawned with `process_group(0)`, and
    // the child has not been reaped yet so the id cannot have been reused.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        debug!(err = %err, "process group kill failed, killing child only");
        child.kill().context("kill command")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

/// Bytes kept from one stream plus the count of bytes dropped past the limit.
#[derive(Default)]
struct StreamBuffer {
    data: Vec<u8>,
    truncated: usize,
}

type SharedBuffer = Arc<Mutex<StreamBuffer>>;

/// Captured bytes and the number of bytes dropped past the limit.
type Captured = (Vec<u8>, usize);

/// Background readers draining a child's stdout and stderr.
struct StreamReaders {
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    done: mpsc::Receiver<Result<()>>,
}

impl StreamReaders {
    fn spawn(stdout: ChildStdout, stderr: ChildStderr, limit_bytes: usize) -> Self {
        let (tx, done) = mpsc::channel();
        let stdout_buf = SharedBuffer::default();
        let stderr_buf = SharedBuffer::default();
        spawn_reader(stdout, limit_bytes, Arc::clone(&stdout_buf), tx.clone());
        spawn_reader(stderr, limit_bytes, Arc::clone(&stderr_buf), tx);
        Self {
            stdout: stdout_buf,
            stderr: stderr_buf,
            done,
        }
    }

    /// Wait for both readers (at most `limit` if given) and take the output.
    fn finish(self, limit: Option<Duration>) -> Result<(Captured, Captured)> {
        let deadline = limit.map(|limit| Instant::now() + limit);
        for _ in 0..2 {
            let received = match deadline {
                None => self.done.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(deadline) => self
                    .done
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            };
            match received {
                Ok(result) => result?,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("output pipes still open after kill, reporting partial output");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("output reader thread panicked"));
                }
            }
        }
        Ok((take_buffer(&self.stdout), take_buffer(&self.stderr)))
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    buffer: SharedBuffer,
    done: mpsc::Sender<Result<()>>,
) {
    thread::spawn(move || {
        let result = read_stream_limited(reader, limit, &buffer);
        // The receiver is gone once the caller stopped waiting.
        let _ = done.send(result);
    });
}

fn take_buffer(buffer: &SharedBuffer) -> Captured {
    let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    let taken = std::mem::take(&mut *guard);
    (taken.data, taken.truncated)
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize, buffer: &SharedBuffer) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = limit.saturating_sub(guard.data.len());
        let keep = n.min(remaining);
        guard.data.extend_from_slice(&chunk[..keep]);
        guard.truncated += n - keep;
    }

    Ok(())
}
