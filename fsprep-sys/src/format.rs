// SPDX-License-Identifier: GPL-3.0-only

//! Formatting a partition as the type its descriptor declares
//!
//! The declared type alone picks the builder. ext4 gets its crypt footer
//! wiped here and is built over the usable range only; f2fs is told to
//! leave the footer region alone through its own reserve flag.

use std::path::Path;
use std::sync::Arc;

use fsprep_types::{CRYPT_FOOTER_OFFSET, FormatOutcome, FsType, PartitionDescriptor};
use tracing::{error, info};

use crate::config::FormatConfig;
use crate::error::{BuildFailure, PrepError, Result};
use crate::footer::wipe_crypto_footer;
use crate::geometry::{Access, BlockDevice};
use crate::mkfs::{Ext4Builder, Ext4Params, F2fsParams, Mke2fs};
use crate::process::{run_to_exit, ProcessRunner, SystemRunner};

/// Drives the destructive path: footer wipe followed by the builder
pub struct Formatter {
    config: FormatConfig,
    runner: Arc<dyn ProcessRunner>,
    ext4: Box<dyn Ext4Builder>,
}

impl Formatter {
    pub fn new(config: FormatConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Route every builder through `runner`
    pub fn with_runner(config: FormatConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let ext4 = Mke2fs::new(&config.mke2fs, Arc::clone(&runner), config.max_wait_attempts);
        Self {
            config,
            runner,
            ext4: Box::new(ext4),
        }
    }

    pub fn with_ext4_builder(mut self, builder: Box<dyn Ext4Builder>) -> Self {
        self.ext4 = builder;
        self
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    pub fn format(&self, descriptor: &PartitionDescriptor) -> Result<()> {
        let needs_footer = descriptor.needs_footer();
        info!(
            "Formatting {} as '{}'{}",
            descriptor.block_device.display(),
            descriptor.fs_type,
            if needs_footer { ", with footer" } else { "" }
        );

        let result = match &descriptor.fs_type {
            FsType::F2fs => self.format_f2fs(&descriptor.block_device, needs_footer),
            FsType::Ext4 => self.format_ext4(
                &descriptor.block_device,
                &descriptor.mount_point,
                needs_footer,
            ),
            FsType::Unsupported(tag) => Err(PrepError::UnsupportedFilesystem(tag.clone())),
        };

        if let Err(e) = &result {
            error!("Formatting {} failed: {}", descriptor.block_device.display(), e);
        }
        result
    }

    /// [`Formatter::format`] folded into the single value callers consume
    pub fn format_outcome(&self, descriptor: &PartitionDescriptor) -> FormatOutcome {
        match self.format(descriptor) {
            Ok(()) => FormatOutcome::Success,
            Err(e) => FormatOutcome::Failure {
                reason: e.reason(),
                detail: e.to_string(),
            },
        }
    }

    fn format_ext4(
        &self,
        device_path: &Path,
        mount_point: &Path,
        needs_footer: bool,
    ) -> Result<()> {
        let geometry = {
            let mut device = BlockDevice::open(device_path, Access::ReadWrite)?;
            let geometry = device.geometry(needs_footer)?;
            if needs_footer {
                wipe_crypto_footer(&mut device, &geometry)?;
            }
            geometry
        };

        let params = Ext4Params {
            device: device_path.to_path_buf(),
            length: geometry.usable_bytes,
            mount_point: mount_point.to_path_buf(),
            block_size: self.config.ext4_block_size,
        };

        match self.ext4.build(&params)? {
            0 => Ok(()),
            code => {
                error!("{} returned {}", self.ext4.name(), code);
                Err(PrepError::build(self.ext4.name(), BuildFailure::Status(code)))
            }
        }
    }

    fn format_f2fs(&self, device_path: &Path, needs_footer: bool) -> Result<()> {
        let params = F2fsParams {
            device: device_path.to_path_buf(),
            reserved_bytes: if needs_footer { CRYPT_FOOTER_OFFSET } else { 0 },
        };
        let program = &self.config.mkfs_f2fs;
        let program_name = program.display().to_string();

        let code = run_to_exit(
            self.runner.as_ref(),
            program,
            &params.args(),
            self.config.max_wait_attempts,
        )
        .map_err(|failure| PrepError::build(program_name.clone(), failure))?;

        if code != 0 {
            return Err(PrepError::build(program_name, BuildFailure::Status(code)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::FakeRunner;
    use crate::process::WaitState;
    use fsprep_types::{FailureReason, FOOTER_SIZE};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingExt4 {
        status: i32,
        calls: Arc<Mutex<Vec<Ext4Params>>>,
    }

    impl Ext4Builder for RecordingExt4 {
        fn name(&self) -> &str {
            "fake-ext4"
        }

        fn build(&self, params: &Ext4Params) -> Result<i32> {
            self.calls.lock().unwrap().push(params.clone());
            Ok(self.status)
        }
    }

    fn test_config() -> FormatConfig {
        FormatConfig {
            mkfs_f2fs: PathBuf::from("/sbin/mkfs.f2fs"),
            mke2fs: PathBuf::from("/sbin/mke2fs"),
            ext4_block_size: None,
            max_wait_attempts: 4,
        }
    }

    fn formatter(runner: &FakeRunner, ext4: &RecordingExt4) -> Formatter {
        Formatter::with_runner(test_config(), Arc::new(runner.clone()))
            .with_ext4_builder(Box::new(ext4.clone()))
    }

    fn device(len: usize, fill: u8) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![fill; len]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn ext4_with_footer_wipes_and_builds_usable_range() {
        let img = device(2048 * 512, 0x5A);
        let runner = FakeRunner::exiting(0);
        let ext4 = RecordingExt4::default();
        let descriptor =
            PartitionDescriptor::new(img.path(), "ext4", "/data").with_key_location("footer");

        formatter(&runner, &ext4).format(&descriptor).unwrap();

        let calls = ext4.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].length, 1_048_576 - FOOTER_SIZE);
        assert_eq!(calls[0].device, img.path());
        assert_eq!(calls[0].mount_point, PathBuf::from("/data"));
        assert!(runner.invocations().is_empty());

        let data = std::fs::read(img.path()).unwrap();
        let start = (1_048_576 - CRYPT_FOOTER_OFFSET) as usize;
        assert!(data[start..start + FOOTER_SIZE as usize].iter().all(|&b| b == 0));
        assert!(data[..start].iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn ext4_without_footer_leaves_device_untouched() {
        let img = device(2048 * 512, 0x5A);
        let ext4 = RecordingExt4::default();
        let descriptor = PartitionDescriptor::new(img.path(), "ext4", "/cache");

        formatter(&FakeRunner::default(), &ext4).format(&descriptor).unwrap();

        assert_eq!(ext4.calls.lock().unwrap()[0].length, 1_048_576);
        let data = std::fs::read(img.path()).unwrap();
        assert!(data.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn ext4_builder_status_maps_to_failure() {
        let img = device(2048 * 512, 0);
        let ext4 = RecordingExt4 {
            status: 5,
            ..Default::default()
        };
        let descriptor =
            PartitionDescriptor::new(img.path(), "ext4", "/data").with_key_location("footer");

        let outcome = formatter(&FakeRunner::default(), &ext4).format_outcome(&descriptor);
        assert_eq!(outcome.status_code(), -1);
        assert!(matches!(
            outcome,
            FormatOutcome::Failure {
                reason: FailureReason::Build,
                ..
            }
        ));
    }

    #[test]
    fn ext4_on_missing_device_never_builds() {
        let ext4 = RecordingExt4::default();
        let descriptor = PartitionDescriptor::new("/nonexistent/fsprep", "ext4", "/data");
        let err = formatter(&FakeRunner::default(), &ext4)
            .format(&descriptor)
            .unwrap_err();
        assert!(matches!(err, PrepError::Open { .. }));
        assert!(ext4.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn ext4_on_device_smaller_than_footer_never_builds() {
        let img = device(16 * 512, 0x5A);
        let ext4 = RecordingExt4::default();
        let descriptor =
            PartitionDescriptor::new(img.path(), "ext4", "/data").with_key_location("footer");
        let err = formatter(&FakeRunner::default(), &ext4)
            .format(&descriptor)
            .unwrap_err();
        assert!(matches!(err, PrepError::DeviceTooSmall { .. }));
        assert!(ext4.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn f2fs_without_footer_reserves_nothing() {
        let runner = FakeRunner::exiting(0);
        let ext4 = RecordingExt4::default();
        let descriptor = PartitionDescriptor::new("/dev/block/userdata", "f2fs", "/data");

        let outcome = formatter(&runner, &ext4).format_outcome(&descriptor);

        assert_eq!(outcome, FormatOutcome::Success);
        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, PathBuf::from("/sbin/mkfs.f2fs"));
        assert_eq!(invocations[0].args, vec!["-r", "0", "/dev/block/userdata"]);
        assert!(ext4.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn f2fs_with_footer_reserves_crypt_offset() {
        let runner = FakeRunner::exiting(0);
        let descriptor = PartitionDescriptor::new("/dev/block/userdata", "f2fs", "/data")
            .with_key_location("footer");

        formatter(&runner, &RecordingExt4::default())
            .format(&descriptor)
            .unwrap();

        assert_eq!(
            runner.invocations()[0].args,
            vec!["-r", "16384", "/dev/block/userdata"]
        );
    }

    #[test]
    fn f2fs_non_zero_exit_is_failure() {
        let runner = FakeRunner::exiting(1);
        let descriptor = PartitionDescriptor::new("/dev/block/userdata", "f2fs", "/data");

        let outcome = formatter(&runner, &RecordingExt4::default()).format_outcome(&descriptor);

        assert_eq!(outcome.status_code(), -1);
        assert!(matches!(
            outcome,
            FormatOutcome::Failure {
                reason: FailureReason::Build,
                ..
            }
        ));
    }

    #[test]
    fn f2fs_stuck_child_gives_up_after_bounded_waits() {
        let runner = FakeRunner::scripted(vec![WaitState::Running("stopped by SIGSTOP".into())]);
        let descriptor = PartitionDescriptor::new("/dev/block/userdata", "f2fs", "/data");

        let err = formatter(&runner, &RecordingExt4::default())
            .format(&descriptor)
            .unwrap_err();

        assert!(matches!(
            err,
            PrepError::Build {
                failure: BuildFailure::WaitExhausted(4),
                ..
            }
        ));
        assert_eq!(runner.wait_count(), 4);
    }

    #[test]
    fn unsupported_type_does_no_io() {
        let runner = FakeRunner::exiting(0);
        let ext4 = RecordingExt4::default();
        let descriptor = PartitionDescriptor::new("/nonexistent/fsprep", "xfs", "/data")
            .with_key_location("footer");

        let outcome = formatter(&runner, &ext4).format_outcome(&descriptor);

        assert_eq!(outcome.status_code(), -libc::EINVAL);
        assert!(matches!(
            outcome,
            FormatOutcome::Failure {
                reason: FailureReason::UnsupportedFilesystem,
                ..
            }
        ));
        assert!(runner.invocations().is_empty());
        assert!(ext4.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn default_formatter_uses_mke2fs_through_runner() {
        let img = device(2048 * 512, 0);
        let runner = FakeRunner::exiting(0);
        let descriptor = PartitionDescriptor::new(img.path(), "ext4", "/data");

        Formatter::with_runner(test_config(), Arc::new(runner.clone()))
            .format(&descriptor)
            .unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, PathBuf::from("/sbin/mke2fs"));
        assert_eq!(invocations[0].args.last().map(String::as_str), Some("1024k"));
    }
}
