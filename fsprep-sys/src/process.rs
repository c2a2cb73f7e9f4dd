// SPDX-License-Identifier: GPL-3.0-only

//! Child process handling for external filesystem builders
//!
//! Builders run through a [`ProcessRunner`] so that tests can substitute a
//! scripted fake for the real tools. Waiting is bounded: a child that keeps
//! reporting as not yet exited (stopped, continued, interrupted wait) is
//! only retried a fixed number of times.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{info, warn};
use which::which;

use crate::error::BuildFailure;

/// State reported by a single wait on a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    Exited(i32),
    Signaled(i32),
    /// Not reaped yet; the payload says why the wait returned
    Running(String),
    /// The wait itself failed and cannot be retried
    Failed(String),
}

pub trait ChildProcess: Send {
    fn id(&self) -> u32;
    fn wait(&mut self) -> WaitState;
    /// Kill the child and reap it; once this returns it no longer runs
    fn kill(&mut self);
}

pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<Box<dyn ChildProcess>, BuildFailure>;
}

/// Runs programs as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn locate(program: &Path) -> Result<PathBuf, BuildFailure> {
        if program.components().count() > 1 {
            return Ok(program.to_path_buf());
        }
        which(program)
            .map_err(|e| BuildFailure::Spawn(format!("{}: {}", program.display(), e)))
    }
}

impl ProcessRunner for SystemRunner {
    fn spawn(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<Box<dyn ChildProcess>, BuildFailure> {
        let binary = Self::locate(program)?;
        let child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| BuildFailure::Spawn(format!("{}: {}", binary.display(), e)))?;

        Ok(Box::new(SystemChild {
            pid: Pid::from_raw(child.id() as i32),
        }))
    }
}

/// A spawned child reaped with `waitpid`
struct SystemChild {
    pid: Pid,
}

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn wait(&mut self) -> WaitState {
        match waitpid(self.pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(pid, code)) if pid == self.pid => WaitState::Exited(code),
            Ok(WaitStatus::Signaled(pid, signal, _)) if pid == self.pid => {
                WaitState::Signaled(signal as i32)
            }
            Ok(WaitStatus::Stopped(_, signal)) => {
                WaitState::Running(format!("stopped by {}", signal.as_str()))
            }
            Ok(WaitStatus::Continued(_)) => WaitState::Running("continued".to_string()),
            Ok(WaitStatus::StillAlive) => WaitState::Running("still alive".to_string()),
            Ok(other) => WaitState::Failed(format!("unexpected wait status {other:?}")),
            Err(Errno::EINTR) => WaitState::Running("wait interrupted".to_string()),
            Err(errno) => WaitState::Failed(errno.to_string()),
        }
    }

    fn kill(&mut self) {
        // SIGKILL also ends a stopped child
        if let Err(errno) = kill(self.pid, Signal::SIGKILL) {
            warn!("Failed to kill child process {}: {}", self.pid, errno);
            return;
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => break,
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(errno) => {
                    warn!("Failed to reap child process {}: {}", self.pid, errno);
                    break;
                }
            }
        }
    }
}

/// Wait until `child` exits, retrying at most `max_attempts` waits in total.
///
/// A child still running after the last attempt is killed and reaped before
/// the failure is returned.
pub fn wait_for_exit(
    child: &mut dyn ChildProcess,
    program: &str,
    max_attempts: u32,
) -> Result<i32, BuildFailure> {
    for attempt in 1..=max_attempts {
        match child.wait() {
            WaitState::Exited(code) => {
                info!("{} done, status {}", program, code);
                return Ok(code);
            }
            WaitState::Signaled(signal) => return Err(BuildFailure::Signaled(signal)),
            WaitState::Failed(reason) => {
                warn!("Error waiting for child process {}: {}", child.id(), reason);
                return Err(BuildFailure::Wait(reason));
            }
            WaitState::Running(reason) => {
                warn!(
                    "Still waiting for {} ({}, attempt {}/{})",
                    program, reason, attempt, max_attempts
                );
            }
        }
    }
    warn!(
        "Giving up on {} after {} waits, killing child process {}",
        program,
        max_attempts,
        child.id()
    );
    child.kill();
    Err(BuildFailure::WaitExhausted(max_attempts))
}

/// Spawn `program` and wait for its exit code
pub fn run_to_exit(
    runner: &dyn ProcessRunner,
    program: &Path,
    args: &[String],
    max_attempts: u32,
) -> Result<i32, BuildFailure> {
    info!("Running {}", CommandLine(program, args));
    let mut child = runner.spawn(program, args)?;
    wait_for_exit(child.as_mut(), &program.display().to_string(), max_attempts)
}

struct CommandLine<'a>(&'a Path, &'a [String]);

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())?;
        for arg in self.1 {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
