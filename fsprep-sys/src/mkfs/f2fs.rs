// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

/// Arguments for one `mkfs.f2fs` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F2fsParams {
    pub device: PathBuf,
    /// Trailing bytes the tool leaves untouched
    pub reserved_bytes: u64,
}

impl F2fsParams {
    pub fn args(&self) -> Vec<String> {
        vec![
            "-r".to_string(),
            self.reserved_bytes.to_string(),
            self.device.to_string_lossy().into_owned(),
        ]
    }
}
