// SPDX-License-Identifier: GPL-3.0-only

//! Low-level operations for preparing partitions
//!
//! This crate talks to block devices and filesystem builders directly:
//! - Device geometry queries and footer-aware size calculation
//! - Signature checks of the on-disk filesystem and encryption footer
//! - Wiping stale encryption footers
//! - Running the ext4 and f2fs builders
//!
//! Formatting is destructive and needs write access to the device; callers
//! must not format the same device from two places at once.

pub mod config;
pub mod error;
pub mod footer;
pub mod format;
pub mod geometry;
pub mod mkfs;
pub mod process;
pub mod signature;

pub use config::FormatConfig;
pub use error::{BuildFailure, PrepError, Result};
pub use footer::wipe_crypto_footer;
pub use format::Formatter;
pub use geometry::{resolve, Access, BlockDevice};
pub use mkfs::{Ext4Builder, Ext4Params, F2fsParams, Mke2fs};
pub use process::{ChildProcess, ProcessRunner, SystemRunner, WaitState};
pub use signature::{
    identify, probe_encryption_marker, scan_encryption_marker, scan_filesystem, scan_signature,
};

// Re-export shared models
pub use fsprep_types::{
    DeviceGeometry, FailureReason, FormatOutcome, FsType, KeyLocation, PartitionDescriptor,
    SignatureRecord, CRYPT_FOOTER_OFFSET, FOOTER_SIZE, SECTOR_SIZE,
};
