//! Timeout-bounded, cancellable subprocess execution

use crate::{Result, ToolError};
use std::ffi::OsStr;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared flag used to stop a long-running operation between steps
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Captured output of a finished process
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `program` with `args`, killing it after `timeout` or on cancellation
///
/// Output is captured through temporary files so a chatty child cannot
/// block on a full pipe. A non-zero exit is reported as [`ToolError::Failed`].
pub fn run_with_timeout<I, S>(
    program: &Path,
    args: I,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.display().to_string();
    let mut stdout_file = tempfile::tempfile()?;
    let mut stderr_file = tempfile::tempfile()?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!(program = %program_name, "Cancelling external tool");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Cancelled);
        }

        if start.elapsed() > timeout {
            warn!(program = %program_name, ?timeout, "External tool timed out, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program: program_name,
                timeout,
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = read_back(&mut stdout_file)?;
    let stderr = read_back(&mut stderr_file)?;
    let elapsed = start.elapsed();

    if !status.success() {
        return Err(ToolError::Failed {
            program: program_name,
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    debug!(program = %program_name, ?elapsed, "External tool finished");
    Ok(ToolOutput {
        stdout,
        stderr,
        elapsed,
    })
}

fn read_back(file: &mut std::fs::File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
