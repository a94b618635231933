//! Subprocess execution with a deadline.
//!
//! Both pipes are drained on their own threads while the child runs, so a
//! chatty child cannot stall on a full pipe. When the deadline passes the
//! child is killed and reaped before returning.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

/// Cap on captured bytes per stream.
const MAX_CAPTURE: usize = 64 * 1024;

/// Failures running a child process.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        /// Program name.
        program: String,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// The child ran past its deadline and was killed.
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Program name.
        program: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

/// Captured result of a finished child.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Trimmed stdout text.
    pub stdout: String,
    /// Trimmed stderr text.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the child exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `command` to completion, killing it after `timeout`.
///
/// Stdin is closed; stdout and stderr are captured.
///
/// # Errors
///
/// Returns [`ExecError`] if the child cannot be spawned, waited on, or
/// exceeds `timeout`. A non-zero exit is *not* an error here; inspect
/// [`CommandOutput::status`].
pub fn run(mut command: Command, timeout: Duration) -> Result<CommandOutput, ExecError> {
    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = %program, timeout_secs = timeout.as_secs(), "spawning");
    let mut child = command.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let waited = child.wait_timeout(timeout);
    let status = match waited {
        Ok(Some(status)) => status,
        Ok(None) => {
            reap(&mut child);
            collect(stdout);
            collect(stderr);
            return Err(ExecError::Timeout { program, timeout });
        }
        Err(source) => {
            reap(&mut child);
            collect(stdout);
            collect(stderr);
            return Err(ExecError::Wait { program, source });
        }
    };

    let output = CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    debug!(program = %program, status = ?output.status.code(), "finished");
    Ok(output)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.by_ref().take(MAX_CAPTURE as u64).read_to_end(&mut buf);
        // Keep reading so the child never blocks on a full pipe.
        let _ = io::copy(&mut pipe, &mut io::sink());
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default()
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_trimmed_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo '  out  '; echo err 1>&2"]);
        let out = run(cmd, Duration::from_secs(10)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "out");
        assert_eq!(out.stderr, "err");
    }

    #[test]
    fn non_zero_exit_is_not_an_exec_error() {
        let out = run(Command::new("false"), Duration::from_secs(10)).unwrap();
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run(
            Command::new("/definitely/not/a/program"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[test]
    fn capture_is_capped_and_child_still_finishes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "head -c 200000 /dev/zero | tr '\\0' x"]);
        let out = run(cmd, Duration::from_secs(10)).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.len(), MAX_CAPTURE);
    }

    #[test]
    fn deadline_kills_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run(cmd, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }
}
