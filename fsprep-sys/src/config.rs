// SPDX-License-Identifier: GPL-3.0-only

//! Builder configuration
//!
//! Everything a format run needs to know about the host's tools, passed
//! explicitly instead of living in process-wide state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PrepError, Result};

/// ext4 only supports these block sizes
pub const EXT4_BLOCK_SIZES: [u32; 3] = [1024, 2048, 4096];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    /// f2fs builder executable
    pub mkfs_f2fs: PathBuf,

    /// ext4 builder executable; bare names are looked up on `PATH`
    pub mke2fs: PathBuf,

    /// Block size passed to the ext4 builder, if any
    pub ext4_block_size: Option<u32>,

    /// Upper bound on waits for a builder that has not exited yet
    pub max_wait_attempts: u32,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            mkfs_f2fs: PathBuf::from("/sbin/mkfs.f2fs"),
            mke2fs: PathBuf::from("mke2fs"),
            ext4_block_size: None,
            max_wait_attempts: 8,
        }
    }
}

impl FormatConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PrepError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PrepError::Config(format!("Failed to parse configuration: {e}")))?;
        config.validated()
    }

    /// Reject settings that cannot work and drop the ones that have a safe default.
    pub fn validated(mut self) -> Result<Self> {
        if self.max_wait_attempts == 0 {
            return Err(PrepError::Config(
                "max_wait_attempts must be at least 1".to_string(),
            ));
        }

        if let Some(block_size) = self.ext4_block_size {
            if !EXT4_BLOCK_SIZES.contains(&block_size) {
                warn!("Block size '{}' not supported; using default", block_size);
                self.ext4_block_size = None;
            }
        }

        Ok(self)
    }
}
