// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::path::PathBuf;

use fsprep_types::FailureReason;
use thiserror::Error;

/// How an external filesystem builder failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildFailure {
    #[error("exited with status {0}")]
    Status(i32),

    #[error("terminated by signal {0}")]
    Signaled(i32),

    #[error("could not be started: {0}")]
    Spawn(String),

    #[error("could not be waited for: {0}")]
    Wait(String),

    #[error("still running after {0} wait attempts")]
    WaitExhausted(u32),
}

/// Error types for device probing and formatting
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot get size of {}: {reason}", path.display())]
    Geometry { path: PathBuf, reason: String },

    #[error(
        "{} is {total_bytes} bytes, too small to reserve a {reserved} byte footer",
        path.display()
    )]
    DeviceTooSmall {
        path: PathBuf,
        total_bytes: u64,
        reserved: u64,
    },

    #[error("Cannot wipe crypto footer of {} at offset {offset}: {source}", path.display())]
    FooterWipe {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("File system type '{0}' is not supported")]
    UnsupportedFilesystem(String),

    #[error("{program} {failure}")]
    Build {
        program: String,
        failure: BuildFailure,
    },

    #[error("Cannot read signature from {}: {reason}", path.display())]
    ScanIo { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PrepError {
    pub fn reason(&self) -> FailureReason {
        match self {
            PrepError::Open { .. } => FailureReason::Open,
            PrepError::Geometry { .. } => FailureReason::Geometry,
            PrepError::DeviceTooSmall { .. } => FailureReason::DeviceTooSmall,
            PrepError::FooterWipe { .. } => FailureReason::FooterWipe,
            PrepError::UnsupportedFilesystem(_) => FailureReason::UnsupportedFilesystem,
            PrepError::Build { .. } => FailureReason::Build,
            PrepError::ScanIo { .. } => FailureReason::ScanIo,
            PrepError::Config(_) => FailureReason::Config,
        }
    }

    pub fn status_code(&self) -> i32 {
        self.reason().status_code()
    }

    pub(crate) fn build(program: impl Into<String>, failure: BuildFailure) -> Self {
        PrepError::Build {
            program: program.into(),
            failure,
        }
    }
}

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, PrepError>;
