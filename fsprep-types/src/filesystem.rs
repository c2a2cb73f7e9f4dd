// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem type tags and signature scan results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filesystem type declared by a partition descriptor.
///
/// Tags are matched on their first four bytes, so `ext4dev` is still ext4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FsType {
    Ext4,
    F2fs,
    /// Any tag this crate cannot build or scan; the original text is kept for messages
    Unsupported(String),
}

impl FsType {
    pub fn parse(tag: &str) -> Self {
        let prefix = tag.as_bytes();
        if prefix.starts_with(b"ext4") {
            FsType::Ext4
        } else if prefix.starts_with(b"f2fs") {
            FsType::F2fs
        } else {
            FsType::Unsupported(tag.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FsType::Ext4 => "ext4",
            FsType::F2fs => "f2fs",
            FsType::Unsupported(tag) => tag.as_str(),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, FsType::Unsupported(_))
    }
}

impl From<String> for FsType {
    fn from(tag: String) -> Self {
        FsType::parse(&tag)
    }
}

impl From<&str> for FsType {
    fn from(tag: &str) -> Self {
        FsType::parse(tag)
    }
}

impl From<FsType> for String {
    fn from(fs_type: FsType) -> Self {
        fs_type.as_str().to_string()
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a scan of the raw device found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// The declared type, when its magic was found on disk
    pub matched_fs: Option<FsType>,

    /// Whether the encryption footer magic was found
    pub encrypted: bool,
}

impl SignatureRecord {
    pub fn matched(&self) -> bool {
        self.matched_fs.is_some()
    }
}
