// SPDX-License-Identifier: GPL-3.0-only

//! Erasing stale encryption metadata before a reformat

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use fsprep_types::{DeviceGeometry, FOOTER_SIZE};
use tracing::info;

use crate::error::{PrepError, Result};
use crate::geometry::BlockDevice;

/// Overwrite the crypt footer record with zeros.
///
/// The device must be open for writing.
pub fn wipe_crypto_footer(device: &mut BlockDevice, geometry: &DeviceGeometry) -> Result<()> {
    let offset = geometry
        .crypt_footer_offset()
        .ok_or_else(|| PrepError::DeviceTooSmall {
            path: device.path().to_path_buf(),
            total_bytes: geometry.total_bytes,
            reserved: FOOTER_SIZE,
        })?;

    info!("Wiping old crypto info on {}", device.path().display());

    let path = device.path().to_path_buf();
    write_zeros(device.file_mut(), offset, FOOTER_SIZE as usize).map_err(|source| {
        PrepError::FooterWipe {
            path,
            offset,
            source,
        }
    })
}

fn write_zeros(file: &mut File, offset: u64, len: usize) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&vec![0u8; len])?;
    file.sync_data()
}
