// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Find the executables that use shared libraries.

`ldd` answers which shared libraries an executable needs. This crate answers
the reverse question: given a directory tree, which executables need a given
shared library, grouped by instruction set architecture.

Inspection of ELF files is delegated to the binutils tools `readelf` and
`objdump` (plus `file` for files without an executable bit), executed through
a [tool::ToolRunner]. A [scan::Scanner] walks a directory, classifies every
file, and accumulates a [index::DependencyIndex], which [report] renders as
text or PDF.
*/

pub mod arch;
pub mod classify;
pub mod deps;
pub mod error;
pub mod index;
mod pdf;
pub mod report;
pub mod scan;
pub mod tool;

#[cfg(test)]
mod testutil;

pub use {
    arch::Architecture,
    deps::{BackendKind, DependencyBackend, LibraryFilter},
    error::{BlddError, Result},
    index::DependencyIndex,
    report::ReportFormat,
    scan::{ScanOutcome, ScanSettings, ScanStats, Scanner},
    tool::{SystemToolRunner, ToolPaths, ToolRunner},
};
