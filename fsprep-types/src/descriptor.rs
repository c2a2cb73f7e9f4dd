// SPDX-License-Identifier: GPL-3.0-only

//! Partition descriptors as handed over by the partition table layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::filesystem::FsType;

const KEY_IN_FOOTER: &str = "footer";

/// Where the encryption metadata of a partition lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyLocation {
    #[default]
    None,
    /// In the reserved region at the end of the block device
    Footer,
    /// In a separate file or device, given by absolute path
    File(PathBuf),
    /// A value the table carried that is neither `footer` nor an absolute path
    Unrecognized(String),
}

impl KeyLocation {
    pub fn parse(value: &str) -> Self {
        if value.is_empty() {
            KeyLocation::None
        } else if value == KEY_IN_FOOTER {
            KeyLocation::Footer
        } else if value.starts_with('/') {
            KeyLocation::File(PathBuf::from(value))
        } else {
            KeyLocation::Unrecognized(value.to_string())
        }
    }

    pub fn is_footer(&self) -> bool {
        matches!(self, KeyLocation::Footer)
    }
}

impl From<String> for KeyLocation {
    fn from(value: String) -> Self {
        KeyLocation::parse(&value)
    }
}

impl From<&str> for KeyLocation {
    fn from(value: &str) -> Self {
        KeyLocation::parse(value)
    }
}

impl From<KeyLocation> for String {
    fn from(location: KeyLocation) -> Self {
        match location {
            KeyLocation::None => String::new(),
            KeyLocation::Footer => KEY_IN_FOOTER.to_string(),
            KeyLocation::File(path) => path.to_string_lossy().into_owned(),
            KeyLocation::Unrecognized(value) => value,
        }
    }
}

/// One entry of the partition table, read-only to this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Block device node holding the partition
    pub block_device: PathBuf,

    /// Filesystem the table says should be on the device
    pub fs_type: FsType,

    /// Where the partition gets mounted
    pub mount_point: PathBuf,

    /// Location of the encryption metadata
    #[serde(default)]
    pub key_location: KeyLocation,

    /// Whether the partition may carry encryption at all
    #[serde(default)]
    pub encryptable: bool,
}

impl PartitionDescriptor {
    pub fn new(
        block_device: impl Into<PathBuf>,
        fs_type: impl Into<FsType>,
        mount_point: impl Into<PathBuf>,
    ) -> Self {
        Self {
            block_device: block_device.into(),
            fs_type: fs_type.into(),
            mount_point: mount_point.into(),
            key_location: KeyLocation::None,
            encryptable: false,
        }
    }

    pub fn with_key_location(mut self, key_location: impl Into<KeyLocation>) -> Self {
        self.key_location = key_location.into();
        self
    }

    pub fn with_encryptable(mut self, encryptable: bool) -> Self {
        self.encryptable = encryptable;
        self
    }

    /// A trailing footer region is reserved only when keys live in the footer.
    pub fn needs_footer(&self) -> bool {
        self.key_location.is_footer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_location_parsing() {
        assert_eq!(KeyLocation::parse(""), KeyLocation::None);
        assert_eq!(KeyLocation::parse("footer"), KeyLocation::Footer);
        assert_eq!(
            KeyLocation::parse("/dev/block/metadata"),
            KeyLocation::File(PathBuf::from("/dev/block/metadata"))
        );
        assert_eq!(
            KeyLocation::parse("Footer"),
            KeyLocation::Unrecognized("Footer".into())
        );
    }

    #[test]
    fn footer_required_only_for_footer_key() {
        let base = PartitionDescriptor::new("/dev/block/userdata", "ext4", "/data");
        assert!(!base.needs_footer());
        assert!(base.clone().with_key_location("footer").needs_footer());
        assert!(!base.with_key_location("/dev/block/metadata").needs_footer());
    }

    #[test]
    fn deserializes_table_entry() {
        let entry = r#"
            block_device = "/dev/block/userdata"
            fs_type = "f2fs"
            mount_point = "/data"
            key_location = "footer"
            encryptable = true
        "#;
        let descriptor: PartitionDescriptor = toml::from_str(entry).unwrap();
        assert_eq!(descriptor.fs_type, FsType::F2fs);
        assert_eq!(descriptor.key_location, KeyLocation::Footer);
        assert!(descriptor.encryptable);
    }

    #[test]
    fn optional_fields_default() {
        let entry = r#"
            block_device = "/dev/block/cache"
            fs_type = "ext4"
            mount_point = "/cache"
        "#;
        let descriptor: PartitionDescriptor = toml::from_str(entry).unwrap();
        assert_eq!(descriptor.key_location, KeyLocation::None);
        assert!(!descriptor.encryptable);
    }
}
