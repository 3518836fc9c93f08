// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Metrics process supervision
//!
//! A single run of the metrics process is the whole contract: the child is
//! spawned once, awaited until it exits, and never restarted. When the shutdown
//! future resolves first, the child is asked to stop with SIGTERM and awaited
//! again. There is no forced kill and no stop timeout; a child ignoring SIGTERM
//! keeps the sidecar waiting.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::constants::runtime::TERMINATED_EXIT_CODE;
use crate::errors::{Result, SidecarError};
use crate::invocation::Invocation;

/// Terminal status handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The metrics process exited on its own with this code
    Exited(i32),
    /// The metrics process was stopped because the sidecar was interrupted
    Terminated,
}

impl ExitStatus {
    /// Exit code the sidecar itself should report
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Terminated => TERMINATED_EXIT_CODE,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with code {code}"),
            ExitStatus::Terminated => write!(f, "terminated on interrupt"),
        }
    }
}

/// Lifecycle of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
    Terminated,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessState::Running)
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        match self {
            ProcessState::Running => None,
            ProcessState::Exited(code) => Some(ExitStatus::Exited(*code)),
            ProcessState::Terminated => Some(ExitStatus::Terminated),
        }
    }
}

/// Launches the metrics process and blocks until it is gone.
#[derive(Debug, Default)]
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the invocation. Must be called from within a tokio runtime.
    ///
    /// stdout and stderr are inherited so the metrics process logs flow
    /// through the sidecar's own streams.
    pub fn spawn(&self, invocation: Invocation) -> Result<SupervisedProcess> {
        let (program, args) = invocation.into_parts();

        info!(
            program = %program.display(),
            args = ?args,
            "Starting metrics process"
        );

        let launch_error = |source: std::io::Error| {
            error!(
                program = %program.display(),
                error = %source,
                "Failed to launch metrics process"
            );
            SidecarError::ChildLaunch {
                program: program.clone(),
                source,
            }
        };

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(launch_error)?;

        let pid = child.id().ok_or_else(|| {
            launch_error(std::io::Error::other(
                "process exited before its pid could be read",
            ))
        })?;

        info!(pid = pid, "Metrics process started");

        Ok(SupervisedProcess {
            child,
            pid,
            program,
            state: ProcessState::Running,
        })
    }

    /// Spawn the invocation and supervise it until it exits or `shutdown` resolves.
    pub async fn run<F>(&self, invocation: Invocation, shutdown: F) -> Result<ExitStatus>
    where
        F: Future<Output = ()>,
    {
        let mut process = self.spawn(invocation)?;
        process.supervise(shutdown).await
    }
}

/// The live metrics process. Exclusively owned by its supervisor.
pub struct SupervisedProcess {
    child: Child,
    pid: u32,
    program: PathBuf,
    state: ProcessState,
}

impl fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("state", &self.state)
            .finish()
    }
}

impl SupervisedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Block until the process exits, or until `shutdown` resolves.
    ///
    /// On shutdown the process receives SIGTERM and is awaited again; the
    /// result is then [`ExitStatus::Terminated`] whatever code it exits with.
    /// The process is reaped on every path. Once a terminal state is reached,
    /// further calls return it without waiting.
    pub async fn supervise<F>(&mut self, shutdown: F) -> Result<ExitStatus>
    where
        F: Future<Output = ()>,
    {
        if let Some(status) = self.state.exit_status() {
            return Ok(status);
        }

        tokio::select! {
            biased;

            status = self.child.wait() => {
                let status = status.map_err(SidecarError::Wait)?;
                let code = exit_code(status);
                info!(pid = self.pid, exit_code = code, "Metrics process exited");
                self.transition(ProcessState::Exited(code));
                Ok(ExitStatus::Exited(code))
            }
            () = shutdown => {
                info!(pid = self.pid, "Interrupt received, stopping metrics process");
                self.request_termination();

                let status = self.child.wait().await.map_err(SidecarError::Wait)?;
                debug!(
                    pid = self.pid,
                    exit_code = exit_code(status),
                    "Metrics process stopped after termination request"
                );
                self.transition(ProcessState::Terminated);
                Ok(ExitStatus::Terminated)
            }
        }
    }

    fn transition(&mut self, next: ProcessState) {
        debug!(
            pid = self.pid,
            from = ?self.state,
            to = ?next,
            "Metrics process state change"
        );
        self.state = next;
    }

    #[cfg(unix)]
    fn request_termination(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Ok(raw_pid) = i32::try_from(self.pid) else {
            warn!(pid = self.pid, "Pid out of range, cannot send SIGTERM");
            return;
        };

        match kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
            Ok(()) => debug!(pid = self.pid, "Sent SIGTERM to metrics process"),
            // The process may already be on its way out; the wait that follows reaps it.
            Err(e) => warn!(pid = self.pid, error = %e, "Failed to send SIGTERM to metrics process"),
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(pid = self.pid, error = %e, "Failed to stop metrics process");
        }
    }
}

/// Exit code of a finished process. A process killed by a signal reports
/// `128 + signal`, the shell convention.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::wait::{WaitPidFlag, waitpid};
    use nix::unistd::Pid;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn shell(script: &str) -> Invocation {
        Invocation::from_parts(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    fn assert_reaped(pid: u32) {
        let pid = Pid::from_raw(i32::try_from(pid).unwrap());
        assert_eq!(
            waitpid(pid, Some(WaitPidFlag::WNOHANG)),
            Err(Errno::ECHILD),
            "child should already be reaped"
        );
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated_and_child_reaped() {
        let supervisor = ProcessSupervisor::new();
        let mut process = supervisor.spawn(shell("exit 3")).unwrap();
        let pid = process.pid();
        assert_eq!(process.state(), ProcessState::Running);

        let status = process.supervise(std::future::pending()).await.unwrap();

        assert_eq!(status, ExitStatus::Exited(3));
        assert_eq!(status.code(), 3);
        assert_eq!(process.state(), ProcessState::Exited(3));
        assert_reaped(pid);
    }

    #[tokio::test]
    async fn test_successful_exit() {
        let status = ProcessSupervisor::new()
            .run(shell("exit 0"), std::future::pending())
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::Exited(0));
    }

    #[tokio::test]
    async fn test_interrupt_terminates_child_gracefully() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("terminated");
        let script = format!(
            "trap 'echo graceful > {}; exit 7' TERM; while true; do sleep 0.1; done",
            marker.display()
        );

        let supervisor = ProcessSupervisor::new();
        let mut process = supervisor.spawn(shell(&script)).unwrap();
        let pid = process.pid();

        let started = Instant::now();
        let status = process
            .supervise(tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(status, ExitStatus::Terminated);
        assert_eq!(status.code(), 130);
        assert_eq!(process.state(), ProcessState::Terminated);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "graceful");
        assert_reaped(pid);
    }

    #[tokio::test]
    async fn test_immediate_interrupt_stops_long_running_child() {
        let status = ProcessSupervisor::new()
            .run(shell("exec sleep 30"), std::future::ready(()))
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::Terminated);
    }

    #[tokio::test]
    async fn test_child_killed_by_signal_reports_shell_code() {
        let status = ProcessSupervisor::new()
            .run(shell("kill -9 $$"), std::future::pending())
            .await
            .unwrap();
        assert_eq!(status, ExitStatus::Exited(137));
    }

    #[tokio::test]
    async fn test_terminal_state_is_sticky() {
        let mut process = ProcessSupervisor::new().spawn(shell("exit 5")).unwrap();

        let first = process.supervise(std::future::pending()).await.unwrap();
        let second = process.supervise(std::future::ready(())).await.unwrap();

        assert_eq!(first, ExitStatus::Exited(5));
        assert_eq!(second, ExitStatus::Exited(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_launch_error() {
        let invocation =
            Invocation::from_parts(PathBuf::from("/nonexistent/cli/bin/metrics"), Vec::new());

        match ProcessSupervisor::new().spawn(invocation) {
            Err(SidecarError::ChildLaunch { program, .. }) => {
                assert_eq!(program, PathBuf::from("/nonexistent/cli/bin/metrics"));
            }
            other => panic!("expected ChildLaunch, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_status_display() {
        assert_eq!(ExitStatus::Exited(2).to_string(), "exited with code 2");
        assert_eq!(ExitStatus::Terminated.to_string(), "terminated on interrupt");
        assert!(ProcessState::Terminated.is_terminal());
        assert!(!ProcessState::Running.is_terminal());
    }
}
