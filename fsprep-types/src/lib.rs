// SPDX-License-Identifier: GPL-3.0-only

//! Domain models for block device identification and formatting
//!
//! These types describe what a partition table declares about a device
//! ([`PartitionDescriptor`]), what was measured on the device
//! ([`DeviceGeometry`], [`SignatureRecord`]) and what a format request
//! produced ([`FormatOutcome`]). They carry no I/O; `fsprep-sys` does the work.

pub mod descriptor;
pub mod filesystem;
pub mod geometry;
pub mod outcome;

pub use descriptor::{KeyLocation, PartitionDescriptor};
pub use filesystem::{FsType, SignatureRecord};
pub use geometry::{CRYPT_FOOTER_OFFSET, DeviceGeometry, FOOTER_SIZE, SECTOR_SIZE};
pub use outcome::{FailureReason, FormatOutcome};
