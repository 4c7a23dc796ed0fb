use crate::error::VantageError;
use crate::platform::ToolCommand;
use log::{debug, warn};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// How long to wait for output pipes to close once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Captured output of a tool that exited on its own.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout followed by stderr, skipping whichever is empty.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ToolRun {
    Exited(ToolOutput),
    /// The deadline passed; the process was killed and reaped.
    TimedOut {
        pid: Option<u32>,
        elapsed: Duration,
        partial_stdout: String,
    },
}

/// Spawns `cmd` and waits at most `deadline` for it to exit.
///
/// A spawn failure is an [`VantageError::Execution`]. On expiry the whole
/// process group is killed (Unix) and the child is reaped before this
/// returns, so nothing outlives the call.
pub async fn run_with_deadline(
    cmd: &ToolCommand,
    deadline: Duration,
) -> Result<ToolRun, VantageError> {
    debug!("Running `{}` with a {:?} deadline", cmd, deadline);

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let start = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|e| VantageError::Execution(format!("failed to start {}: {}", cmd.program, e)))?;
    let pid = child.id();

    let stdout_task = tokio::spawn(read_all(child.stdout.take()));
    let stderr_task = tokio::spawn(read_all(child.stderr.take()));

    match tokio::time::timeout(deadline, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = drain(stdout_task).await;
            let stderr = drain(stderr_task).await;
            let elapsed = start.elapsed();
            debug!("`{}` exited with {} after {:?}", cmd.program, status, elapsed);
            Ok(ToolRun::Exited(ToolOutput {
                status,
                stdout,
                stderr,
                elapsed,
            }))
        }
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            Err(VantageError::Execution(format!(
                "failed to wait for {}: {}",
                cmd.program, e
            )))
        }
        Err(_) => {
            warn!("`{}` exceeded its {:?} deadline, killing it", cmd.program, deadline);
            terminate(&mut child, pid).await;
            stderr_task.abort();
            let partial_stdout = drain(stdout_task).await;
            Ok(ToolRun::TimedOut {
                pid,
                elapsed: start.elapsed(),
                partial_stdout,
            })
        }
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // The child leads its own group, so this reaches anything it forked.
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            debug!("killpg({}) failed: {}", pid, std::io::Error::last_os_error());
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        debug!("kill after deadline failed: {}", e);
        let _ = child.wait().await;
    }
}

/// Collects a reader task's text, giving up if a stray holder keeps the pipe open.
async fn drain(mut task: JoinHandle<String>) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("reading tool output failed: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh", ["-c", script])
    }

    #[tokio::test]
    async fn test_captures_exit_and_streams() {
        let run = run_with_deadline(&sh("echo hop; echo oops >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap();
        match run {
            ToolRun::Exited(out) => {
                assert!(!out.success());
                assert_eq!(out.status.code(), Some(3));
                assert_eq!(out.stdout, "hop\n");
                assert_eq!(out.stderr, "oops\n");
                assert_eq!(out.combined(), "hop\noops\n");
            }
            other => panic!("expected exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_kills_process() {
        let start = Instant::now();
        let run = run_with_deadline(&sh("echo started; sleep 10"), Duration::from_millis(300))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        match run {
            ToolRun::TimedOut { pid, .. } => {
                let pid = pid.expect("child had a pid");
                #[cfg(target_os = "linux")]
                assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
                let alive = unsafe { libc::kill(pid as libc::pid_t, 0) } == 0;
                assert!(!alive, "process {} still running", pid);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let cmd = ToolCommand::new("vantage-no-such-tool", Vec::<String>::new());
        let err = run_with_deadline(&cmd, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, VantageError::Execution(_)));
    }
}
