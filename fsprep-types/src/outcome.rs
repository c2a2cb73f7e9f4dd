// SPDX-License-Identifier: GPL-3.0-only

//! Result of a format request as reported to callers

use serde::{Deserialize, Serialize};

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Open,
    Geometry,
    DeviceTooSmall,
    FooterWipe,
    UnsupportedFilesystem,
    Build,
    ScanIo,
    Config,
}

impl FailureReason {
    /// Integer status for callers that speak the legacy convention
    pub fn status_code(self) -> i32 {
        match self {
            FailureReason::UnsupportedFilesystem => -libc::EINVAL,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FormatOutcome {
    Success,
    Failure { reason: FailureReason, detail: String },
}

impl FormatOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FormatOutcome::Success)
    }

    /// 0 on success, negative otherwise
    pub fn status_code(&self) -> i32 {
        match self {
            FormatOutcome::Success => 0,
            FormatOutcome::Failure { reason, .. } => reason.status_code(),
        }
    }
}
