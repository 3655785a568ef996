// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Determining the instruction set architecture of ELF files. */

use {
    crate::{
        classify::is_link_or_script,
        error::BlddError,
        tool::ToolRunner,
    },
    log::{debug, trace},
    std::{ffi::OsStr, fmt, path::Path, str::FromStr},
};

/// Instruction set architectures that binaries are bucketed by.
///
/// Variants are declared in the lexicographic order of their labels, so
/// ordering matches label ordering.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Architecture {
    Aarch64,
    Armv7,
    X86,
    X86_64,
}

impl Architecture {
    pub const ALL: [Architecture; 4] = [Self::Aarch64, Self::Armv7, Self::X86, Self::X86_64];

    /// The human readable label of this architecture.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aarch64 => "aarch64",
            Self::Armv7 => "armv7",
            Self::X86 => "x86",
            Self::X86_64 => "x86-64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = BlddError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| BlddError::UnknownArchitecture(s.to_string()))
    }
}

/// Map the output of `readelf -h` to an [Architecture].
///
/// Only the `Machine:` and `Class:` lines are consulted. Some tools report a
/// generic ARM machine regardless of word size, so the class disambiguates
/// 32-bit from 64-bit ARM.
pub fn parse_header_summary(output: &str) -> Option<Architecture> {
    let mut machine = None;
    let mut class = None;

    for line in output.lines() {
        if line.contains("Machine:") {
            machine = Some(line.trim());
        }
        if line.contains("Class:") {
            class = Some(line.trim());
        }
    }

    let machine = machine?;

    if machine.contains("Advanced Micro Devices X86-64") {
        Some(Architecture::X86_64)
    } else if machine.contains("Intel 80386") {
        Some(Architecture::X86)
    } else if machine.contains("AArch64") {
        Some(Architecture::Aarch64)
    } else if machine.contains("ARM") {
        if matches!(class, Some(class) if class.contains("ELF64")) {
            Some(Architecture::Aarch64)
        } else {
            Some(Architecture::Armv7)
        }
    } else {
        None
    }
}

/// Determines architectures by running a header dumping tool.
pub struct ArchitectureDetector<'a> {
    runner: &'a dyn ToolRunner,
    readelf: &'a Path,
}

impl<'a> ArchitectureDetector<'a> {
    pub fn new(runner: &'a dyn ToolRunner, readelf: &'a Path) -> Self {
        Self { runner, readelf }
    }

    /// Determine the architecture of a file.
    ///
    /// Symbolic links and scripts are rejected without running anything.
    /// Failures of any kind result in `None`.
    pub fn detect(&self, path: &Path) -> Option<Architecture> {
        if is_link_or_script(path) {
            trace!("{} is a symbolic link or script; skipping", path.display());
            return None;
        }

        let output = match self
            .runner
            .run(self.readelf, &[OsStr::new("-h"), path.as_os_str()])
        {
            Ok(output) if output.success => output,
            Ok(_) => {
                debug!("{} -h failed for {}", self.readelf.display(), path.display());
                return None;
            }
            Err(e) => {
                debug!("error determining architecture of {}: {}", path.display(), e);
                return None;
            }
        };

        let arch = parse_header_summary(&output.stdout);
        if arch.is_none() {
            debug!("unrecognized architecture for {}", path.display());
        }

        arch
    }
}
