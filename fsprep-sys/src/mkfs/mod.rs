// SPDX-License-Identifier: GPL-3.0-only

//! Invocation of the external filesystem builders

pub mod ext4;
pub mod f2fs;

pub use ext4::{Ext4Builder, Ext4Params, Mke2fs};
pub use f2fs::F2fsParams;
