// SPDX-License-Identifier: GPL-3.0-only

//! On-disk signature checks
//!
//! The declared type of a partition is verified against the magic numbers
//! actually present in the first 16 sectors of the device. The window covers
//! the ext4 superblock at byte 1024 plus its alignment slack, and the f2fs
//! backup superblock. None of this decides which builder runs.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use fsprep_types::{
    FsType, KeyLocation, PartitionDescriptor, SignatureRecord, CRYPT_FOOTER_OFFSET, SECTOR_SIZE,
};
use tracing::{debug, error};

use crate::error::{PrepError, Result};
use crate::geometry::{Access, BlockDevice};

const SCAN_SECTOR_SIZE: usize = 512;
const SCAN_SECTORS: usize = 16;

/// Bytes read from the start of a device for identification
pub const SCAN_WINDOW: usize = SCAN_SECTORS * SCAN_SECTOR_SIZE;

pub const F2FS_SUPER_MAGIC: u32 = 0xF2F5_2010;
pub const EXT4_SUPER_MAGIC: u16 = 0xEF53;
pub const CRYPT_MAGIC: u32 = 0xD0B5_B1C4;

/// `struct ext4_super_block` is 1024 bytes; `s_magic` sits at 0x38.
const EXT4_SUPERBLOCK_SIZE: usize = 1024;
const EXT4_MAGIC_OFFSET: usize = 0x38;

fn read_le32(bytes: &[u8]) -> Option<u32> {
    let word: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(word))
}

fn read_le16(bytes: &[u8]) -> Option<u16> {
    let word: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
    Some(u16::from_le_bytes(word))
}

fn is_f2fs(window: &[u8]) -> bool {
    window
        .chunks_exact(SCAN_SECTOR_SIZE)
        .take(SCAN_SECTORS)
        .any(|sector| read_le32(sector) == Some(F2FS_SUPER_MAGIC))
}

fn is_ext4(window: &[u8]) -> bool {
    window[..window.len().min(SCAN_WINDOW)]
        .chunks_exact(EXT4_SUPERBLOCK_SIZE)
        .any(|sb| read_le16(&sb[EXT4_MAGIC_OFFSET..]) == Some(EXT4_SUPER_MAGIC))
}

/// Does `window` (the first bytes of a device) carry the magic of `declared`?
pub fn scan_filesystem(window: &[u8], declared: &FsType) -> bool {
    match declared {
        FsType::F2fs => is_f2fs(window),
        FsType::Ext4 => is_ext4(window),
        FsType::Unsupported(_) => false,
    }
}

/// Read the identification window from the start of `path`
pub fn read_scan_window(path: &Path) -> Result<Vec<u8>> {
    let mut device = BlockDevice::open(path, Access::ReadOnly)?;
    let mut window = vec![0u8; SCAN_WINDOW];
    device
        .file_mut()
        .read_exact(&mut window)
        .map_err(|e| PrepError::ScanIo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(window)
}

/// Check that the device holds the filesystem its descriptor declares
pub fn identify(descriptor: &PartitionDescriptor) -> Result<bool> {
    let device = &descriptor.block_device;
    let matched = match read_scan_window(device) {
        Ok(window) => scan_filesystem(&window, &descriptor.fs_type),
        Err(e) => {
            error!(
                "Did not recognize file system type '{}' on {}: {}",
                descriptor.fs_type,
                device.display(),
                e
            );
            return Err(e);
        }
    };

    if !matched {
        error!(
            "Did not recognize file system type '{}' on {}",
            descriptor.fs_type,
            device.display()
        );
    }
    Ok(matched)
}

fn read_magic_at(file: &mut File, offset: u64) -> std::io::Result<u32> {
    file.seek(SeekFrom::Start(offset))?;
    let mut word = [0u8; 4];
    file.read_exact(&mut word)?;
    Ok(u32::from_le_bytes(word))
}

/// Byte offset of the crypt footer record on a device of `sectors` sectors
fn crypt_footer_position(path: &Path, sectors: u64) -> Result<u64> {
    let total_bytes = sectors
        .checked_mul(SECTOR_SIZE)
        .ok_or_else(|| PrepError::Geometry {
            path: path.to_path_buf(),
            reason: format!("{sectors} sectors overflow a byte count"),
        })?;
    total_bytes
        .checked_sub(CRYPT_FOOTER_OFFSET)
        .ok_or_else(|| PrepError::DeviceTooSmall {
            path: path.to_path_buf(),
            total_bytes,
            reserved: CRYPT_FOOTER_OFFSET,
        })
}

/// Look for the encryption footer magic, reporting I/O failures as errors
pub fn probe_encryption_marker(descriptor: &PartitionDescriptor) -> Result<bool> {
    if !descriptor.encryptable {
        return Ok(false);
    }

    let (mut device, offset) = match &descriptor.key_location {
        KeyLocation::File(path) => (BlockDevice::open(path, Access::ReadOnly)?, 0),
        KeyLocation::Footer => {
            let device = BlockDevice::open(&descriptor.block_device, Access::ReadOnly)?;
            let offset = crypt_footer_position(device.path(), device.sector_count()?)?;
            (device, offset)
        }
        KeyLocation::None | KeyLocation::Unrecognized(_) => return Ok(false),
    };

    let magic = read_magic_at(device.file_mut(), offset).map_err(|e| PrepError::ScanIo {
        path: device.path().to_path_buf(),
        reason: format!("crypt footer at offset {offset}: {e}"),
    })?;
    Ok(magic == CRYPT_MAGIC)
}

/// Legacy view of [`probe_encryption_marker`]: any failure reads as "not encrypted".
///
/// A `false` here is not proof of an unencrypted device.
pub fn scan_encryption_marker(descriptor: &PartitionDescriptor) -> bool {
    probe_encryption_marker(descriptor).unwrap_or_else(|e| {
        debug!("Treating {} as unencrypted: {}", descriptor.block_device.display(), e);
        false
    })
}

/// Identify the device and check for the encryption marker in one pass
pub fn scan_signature(descriptor: &PartitionDescriptor) -> Result<SignatureRecord> {
    let matched = identify(descriptor)?;
    Ok(SignatureRecord {
        matched_fs: matched.then(|| descriptor.fs_type.clone()),
        encrypted: scan_encryption_marker(descriptor),
    })
}
