// SPDX-License-Identifier: GPL-3.0-only

//! Device size queries
//!
//! Block device nodes are sized with the `BLKGETSIZE` ioctl, which reports
//! 512-byte sectors. Regular files are accepted as well so that disk images
//! and loop backing files can be prepared the same way.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use fsprep_types::{DeviceGeometry, FOOTER_SIZE, SECTOR_SIZE};
use tracing::debug;

use crate::error::{PrepError, Result};

mod ioctl {
    nix::ioctl_read_bad!(blkgetsize, nix::request_code_none!(0x12, 96), libc::c_ulong);
}

/// How a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    /// Needed when the footer gets rewritten
    ReadWrite,
}

/// An open device node; closed when dropped
#[derive(Debug)]
pub struct BlockDevice {
    path: PathBuf,
    file: File,
}

impl BlockDevice {
    pub fn open(path: &Path, access: Access) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .open(path)
            .map_err(|source| PrepError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Number of 512-byte sectors on the device
    pub fn sector_count(&self) -> Result<u64> {
        let metadata = self.file.metadata().map_err(|e| self.geometry_error(e.to_string()))?;
        let file_type = metadata.file_type();

        if file_type.is_block_device() {
            let mut sectors: libc::c_ulong = 0;
            unsafe { ioctl::blkgetsize(self.file.as_raw_fd(), &mut sectors) }
                .map_err(|errno| self.geometry_error(format!("BLKGETSIZE failed: {errno}")))?;
            debug!("{} reports {} sectors", self.path.display(), sectors);
            Ok(sectors as u64)
        } else if file_type.is_file() {
            Ok(metadata.len() / SECTOR_SIZE)
        } else {
            Err(self.geometry_error("not a block device or regular file".to_string()))
        }
    }

    pub fn geometry(&self, footer_required: bool) -> Result<DeviceGeometry> {
        let sectors = self.sector_count()?;
        DeviceGeometry::from_sectors(sectors, footer_required).ok_or_else(|| {
            match sectors.checked_mul(SECTOR_SIZE) {
                Some(total_bytes) => PrepError::DeviceTooSmall {
                    path: self.path.clone(),
                    total_bytes,
                    reserved: FOOTER_SIZE,
                },
                None => self.geometry_error(format!("sector count {sectors} out of range")),
            }
        })
    }

    fn geometry_error(&self, reason: String) -> PrepError {
        PrepError::Geometry {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Measure a device without modifying it
pub fn resolve(path: &Path, footer_required: bool) -> Result<DeviceGeometry> {
    BlockDevice::open(path, Access::ReadOnly)?.geometry(footer_required)
}
