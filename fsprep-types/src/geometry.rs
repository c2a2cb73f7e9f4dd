// SPDX-License-Identifier: GPL-3.0-only

//! Device geometry and the layout of the reserved trailing region

use serde::{Deserialize, Serialize};

/// Unit of the kernel's sector count query
pub const SECTOR_SIZE: u64 = 512;

/// Distance from the end of the device to the encryption footer record
pub const CRYPT_FOOTER_OFFSET: u64 = 0x4000;

/// Bytes kept out of the filesystem and zeroed when the footer is wiped
///
/// Equal to [`CRYPT_FOOTER_OFFSET`] on purpose: the reserved tail then starts
/// exactly at the footer record, so the record is never inside the filesystem
/// and wiping the whole tail cannot touch filesystem blocks.
pub const FOOTER_SIZE: u64 = 0x4000;

/// Size of a device as measured for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub sector_count: u64,
    pub total_bytes: u64,
    /// Bytes the filesystem may occupy
    pub usable_bytes: u64,
}

impl DeviceGeometry {
    /// Returns `None` when the footer does not fit on the device.
    pub fn from_sectors(sector_count: u64, footer_required: bool) -> Option<Self> {
        let total_bytes = sector_count.checked_mul(SECTOR_SIZE)?;
        let usable_bytes = if footer_required {
            total_bytes.checked_sub(FOOTER_SIZE)?
        } else {
            total_bytes
        };

        Some(Self {
            sector_count,
            total_bytes,
            usable_bytes,
        })
    }

    /// Absolute offset of the encryption footer record
    pub fn crypt_footer_offset(&self) -> Option<u64> {
        self.total_bytes.checked_sub(CRYPT_FOOTER_OFFSET)
    }

    pub fn reserved_bytes(&self) -> u64 {
        self.total_bytes - self.usable_bytes
    }
}
