// SPDX-License-Identifier: GPL-3.0-only

//! ext4 builder capability
//!
//! The builder receives a fresh [`Ext4Params`] for every run, including the
//! exact length to format, so nothing is carried over between devices.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PrepError, Result};
use crate::process::{run_to_exit, ProcessRunner};

/// Everything one ext4 build needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ext4Params {
    /// Device written in place
    pub device: PathBuf,
    /// Bytes of the device the filesystem may use
    pub length: u64,
    /// Recorded as the last mounted directory
    pub mount_point: PathBuf,
    pub block_size: Option<u32>,
}

pub trait Ext4Builder: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Build the filesystem, returning the builder's status (0 = success).
    fn build(&self, params: &Ext4Params) -> Result<i32>;
}

/// e2fsprogs' `mke2fs`, run as a child process
pub struct Mke2fs {
    program: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    max_wait_attempts: u32,
}

impl Mke2fs {
    pub fn new(program: &Path, runner: Arc<dyn ProcessRunner>, max_wait_attempts: u32) -> Self {
        Self {
            program: program.to_path_buf(),
            runner,
            max_wait_attempts,
        }
    }

    pub fn args(params: &Ext4Params) -> Vec<String> {
        let mut args = vec![
            "-F".to_string(),
            "-q".to_string(),
            "-t".to_string(),
            "ext4".to_string(),
            // Footer and filesystem area were already prepared; don't discard them again.
            "-E".to_string(),
            "nodiscard".to_string(),
        ];

        if let Some(block_size) = params.block_size {
            args.push("-b".to_string());
            args.push(block_size.to_string());
        }

        args.push("-M".to_string());
        args.push(params.mount_point.to_string_lossy().into_owned());
        args.push(params.device.to_string_lossy().into_owned());
        args.push(format!("{}k", params.length / 1024));
        args
    }
}

impl Ext4Builder for Mke2fs {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("mke2fs")
    }

    fn build(&self, params: &Ext4Params) -> Result<i32> {
        run_to_exit(
            self.runner.as_ref(),
            &self.program,
            &Self::args(params),
            self.max_wait_attempts,
        )
        .map_err(|failure| PrepError::build(self.name(), failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildFailure;
    use crate::process::testing::FakeRunner;
    use crate::process::WaitState;

    fn params(block_size: Option<u32>) -> Ext4Params {
        Ext4Params {
            device: PathBuf::from("/dev/block/userdata"),
            length: 1_048_576 - 16_384,
            mount_point: PathBuf::from("/data"),
            block_size,
        }
    }

    #[test]
    fn args_target_device_with_length() {
        let args = Mke2fs::args(&params(None));
        assert_eq!(
            args,
            vec![
                "-F",
                "-q",
                "-t",
                "ext4",
                "-E",
                "nodiscard",
                "-M",
                "/data",
                "/dev/block/userdata",
                "1008k"
            ]
        );
    }

    #[test]
    fn block_size_is_passed_through() {
        let args = Mke2fs::args(&params(Some(4096)));
        let at = args.iter().position(|a| a == "-b").unwrap();
        assert_eq!(args[at + 1], "4096");
    }

    #[test]
    fn returns_exit_status() {
        let runner = FakeRunner::exiting(1);
        let builder = Mke2fs::new(Path::new("/sbin/mke2fs"), Arc::new(runner.clone()), 4);
        assert_eq!(builder.build(&params(None)).unwrap(), 1);
        assert_eq!(runner.invocations()[0].program, PathBuf::from("/sbin/mke2fs"));
    }

    #[test]
    fn abnormal_termination_is_build_error() {
        let runner = FakeRunner::scripted(vec![WaitState::Signaled(11)]);
        let builder = Mke2fs::new(Path::new("/sbin/mke2fs"), Arc::new(runner), 4);
        let err = builder.build(&params(None)).unwrap_err();
        assert!(matches!(
            err,
            PrepError::Build {
                failure: BuildFailure::Signaled(11),
                ..
            }
        ));
    }
}
