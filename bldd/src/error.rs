// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {std::path::PathBuf, thiserror::Error};

/// Unified error type for backward dependency scanning.
#[derive(Debug, Error)]
pub enum BlddError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory '{0}' does not exist")]
    ScanRootMissing(PathBuf),

    #[error("{0} is not installed; please install it first")]
    ToolMissing(String),

    #[error("error running {program}: {source}")]
    ToolSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not finish within {seconds} seconds")]
    ToolTimeout { program: String, seconds: u64 },

    #[error("unsupported dependency tool: {0}")]
    UnknownBackend(String),

    #[error("unsupported report format: {0}")]
    UnknownReportFormat(String),

    #[error("unknown architecture label: {0}")]
    UnknownArchitecture(String),

    #[error("error building worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = BlddError> = std::result::Result<T, E>;
