// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Extraction of required shared libraries from ELF files.

Extraction is delegated to an external tool. Each supported tool is a
[DependencyBackend] which knows how to invoke the tool and how to recognize
a `NEEDED` record in its output.
*/

use {
    crate::{
        error::{BlddError, Result},
        tool::{ToolPaths, ToolRunner},
    },
    log::debug,
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        ffi::OsStr,
        fmt,
        path::{Path, PathBuf},
        str::FromStr,
    },
};

static OBJDUMP_NEEDED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"NEEDED\s+(.+)$").expect("regex should compile"));

static READELF_NEEDED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(NEEDED\)[^\[]*\[([^\]]+)\]").expect("regex should compile")
});

/// A tool capable of listing the shared libraries an ELF file requires.
pub trait DependencyBackend: Send + Sync {
    /// Short name of this backend.
    fn name(&self) -> &'static str;

    /// Program that is executed.
    fn program(&self) -> &Path;

    /// Arguments to pass to [Self::program()] to inspect `path`.
    fn args<'a>(&self, path: &'a Path) -> Vec<&'a OsStr>;

    /// Obtain the library name from a line of tool output, if it is a `NEEDED` record.
    fn parse_needed_line(&self, line: &str) -> Option<String>;

    /// Resolve the libraries required by a file, in the order the tool reports them.
    ///
    /// A tool failure yields an empty list: plenty of ELF files have no
    /// dynamic section.
    fn extract(&self, path: &Path, runner: &dyn ToolRunner) -> Vec<String> {
        let output = match runner.run(self.program(), &self.args(path)) {
            Ok(output) if output.success => output,
            Ok(_) => return vec![],
            Err(e) => {
                debug!(
                    "error getting dependencies for {} using {}: {}",
                    path.display(),
                    self.name(),
                    e
                );
                return vec![];
            }
        };

        self.parse_output(&output.stdout)
    }

    /// Obtain all library names from complete tool output.
    fn parse_output(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|line| self.parse_needed_line(line.trim()))
            .collect()
    }
}

/// Extracts dependencies via `objdump -x`.
#[derive(Clone, Debug)]
pub struct ObjdumpBackend {
    program: PathBuf,
}

impl ObjdumpBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ObjdumpBackend {
    fn default() -> Self {
        Self::new("objdump")
    }
}

impl DependencyBackend for ObjdumpBackend {
    fn name(&self) -> &'static str {
        "objdump"
    }

    fn program(&self) -> &Path {
        &self.program
    }

    fn args<'a>(&self, path: &'a Path) -> Vec<&'a OsStr> {
        vec![OsStr::new("-x"), path.as_os_str()]
    }

    fn parse_needed_line(&self, line: &str) -> Option<String> {
        OBJDUMP_NEEDED_RE
            .captures(line)
            .map(|caps| caps[1].trim().to_string())
    }
}

/// Extracts dependencies via `readelf -d`.
#[derive(Clone, Debug)]
pub struct ReadelfBackend {
    program: PathBuf,
}

impl ReadelfBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ReadelfBackend {
    fn default() -> Self {
        Self::new("readelf")
    }
}

impl DependencyBackend for ReadelfBackend {
    fn name(&self) -> &'static str {
        "readelf"
    }

    fn program(&self) -> &Path {
        &self.program
    }

    fn args<'a>(&self, path: &'a Path) -> Vec<&'a OsStr> {
        vec![OsStr::new("-d"), path.as_os_str()]
    }

    fn parse_needed_line(&self, line: &str) -> Option<String> {
        READELF_NEEDED_RE
            .captures(line)
            .map(|caps| caps[1].trim().to_string())
    }
}

/// Names the available dependency backends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BackendKind {
    #[default]
    Objdump,
    Readelf,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Objdump => "objdump",
            Self::Readelf => "readelf",
        }
    }

    /// Construct the backend, using the program locations in `tools`.
    pub fn backend(&self, tools: &ToolPaths) -> Box<dyn DependencyBackend> {
        match self {
            Self::Objdump => Box::new(ObjdumpBackend::new(&tools.objdump)),
            Self::Readelf => Box::new(ReadelfBackend::new(&tools.readelf)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BlddError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "objdump" => Ok(Self::Objdump),
            "readelf" => Ok(Self::Readelf),
            _ => Err(BlddError::UnknownBackend(s.to_string())),
        }
    }
}

/// Restricts dependencies to names containing one of a set of terms.
///
/// Matching is case-insensitive substring containment: `libc` matches both
/// `libc.so.6` and `libcurl.so.4`. A filter without terms matches everything.
#[derive(Clone, Debug, Default)]
pub struct LibraryFilter {
    terms: Vec<String>,
}

impl LibraryFilter {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|term| term.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, library: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }

        let library = library.to_lowercase();
        self.terms.iter().any(|term| library.contains(term.as_str()))
    }

    /// Retain only matching libraries, preserving order.
    pub fn apply(&self, libraries: Vec<String>) -> Vec<String> {
        if self.terms.is_empty() {
            return libraries;
        }

        libraries
            .into_iter()
            .filter(|library| self.matches(library))
            .collect()
    }
}
