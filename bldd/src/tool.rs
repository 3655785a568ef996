// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Invocation of external binary inspection tools. */

use {
    crate::error::{BlddError, Result},
    log::trace,
    std::{
        ffi::OsStr,
        path::{Path, PathBuf},
        process::Output,
        time::{Duration, Instant},
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of running an external tool.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ToolOutput {
    /// Whether the process exited with a success status.
    pub success: bool,
    /// Standard output, decoded lossily as UTF-8.
    pub stdout: String,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

impl From<&Output> for ToolOutput {
    fn from(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        }
    }
}

/// Something that can execute an external program and capture its output.
///
/// A non-zero exit status is not an error: it is reported through
/// [ToolOutput::success]. Errors are reserved for failing to run the program
/// at all.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[&OsStr]) -> Result<ToolOutput>;
}

/// Runs tools as child processes of the current process.
#[derive(Clone, Debug, Default)]
pub struct SystemToolRunner {
    timeout: Option<Duration>,
}

impl SystemToolRunner {
    /// Construct an instance that kills tools still running after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> Result<ToolOutput> {
        trace!("running {} {:?}", program.display(), args);

        // Passed as an OsStr so bare names are searched for on PATH. Parsers
        // expect the untranslated output grammar.
        let expression = duct::cmd(program.as_os_str(), args.iter().copied())
            .env("LC_ALL", "C")
            .stdout_capture()
            .stderr_capture()
            .unchecked();

        match self.timeout {
            None => {
                let output = expression
                    .run()
                    .map_err(|source| spawn_error(program, source))?;

                Ok(ToolOutput::from(&output))
            }
            Some(timeout) => {
                let handle = expression
                    .start()
                    .map_err(|source| spawn_error(program, source))?;
                let deadline = Instant::now() + timeout;

                loop {
                    if let Some(output) = handle.try_wait()? {
                        return Ok(ToolOutput::from(output));
                    }

                    if Instant::now() >= deadline {
                        handle.kill()?;

                        return Err(BlddError::ToolTimeout {
                            program: program.display().to_string(),
                            seconds: timeout.as_secs(),
                        });
                    }

                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }
}

fn spawn_error(program: &Path, source: std::io::Error) -> BlddError {
    BlddError::ToolSpawn {
        program: program.display().to_string(),
        source,
    }
}

/// Locations of the external programs used during a scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolPaths {
    /// ELF header and dynamic section dumper.
    pub readelf: PathBuf,
    /// Object file dumper.
    pub objdump: PathBuf,
    /// File type probe.
    pub file: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            readelf: PathBuf::from("readelf"),
            objdump: PathBuf::from("objdump"),
            file: PathBuf::from("file"),
        }
    }
}

/// Resolve a program on `PATH` (or verify an explicit path), failing if it is absent.
pub fn ensure_tool_available(program: &Path) -> Result<PathBuf> {
    which::which(program).map_err(|_| BlddError::ToolMissing(program.display().to_string()))
}
