use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};
use tempfile::Builder;
use tracing::debug;

/// How an engine invocation ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    Code(u32),
    Signal(u8),
    Timeout,
    Unknown,
}

impl From<ExitStatus> for Exit {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Exited(code) => Exit::Code(code),
            ExitStatus::Signaled(signal) => Exit::Signal(signal),
            _ => Exit::Unknown,
        }
    }
}

/// Result of a program invocation.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit: Exit,
}

/// Run `engine` on `test_case` for at most `timeout`.
///
/// The test case is written to a temporary file whose path is the engine's
/// only argument. Both streams are captured; whatever was produced before a
/// timeout is kept and the engine is killed.
pub fn run(engine: &Path, test_case: &str, timeout: Duration) -> Result<RunResult> {
    let file = Builder::new()
        .suffix(".js")
        .tempfile()
        .context("creating test case file")?;
    fs::write(file.path(), test_case).context("writing test case")?;

    let mut p = Popen::create(
        &[engine.as_os_str(), file.path().as_os_str()],
        PopenConfig {
            stdout: Redirection::Pipe,
            stderr: Redirection::Pipe,
            ..Default::default()
        },
    )
    .with_context(|| format!("starting {}", engine.display()))?;

    let read = p.communicate_start(None).limit_time(timeout).read();
    let (timed_out, (stdout, stderr)) = match read {
        Ok(capture) => (false, capture),
        Err(err) => {
            debug!(engine = %engine.display(), %err, "output capture cut short");
            (err.error.kind() == io::ErrorKind::TimedOut, err.capture)
        }
    };

    let status = if timed_out {
        None
    } else {
        p.wait_timeout(timeout).context("waiting for engine")?
    };
    let exit = match status {
        Some(status) => Exit::from(status),
        None => {
            p.kill().context("killing hung engine")?;
            p.wait().context("reaping hung engine")?;
            Exit::Timeout
        }
    };

    let text = |bytes: Option<Vec<u8>>| {
        bytes
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    };
    Ok(RunResult {
        stdout: text(stdout),
        stderr: text(stderr),
        exit,
    })
}
