// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Walking a directory tree and building the reverse dependency index. */

use {
    crate::{
        arch::{Architecture, ArchitectureDetector},
        classify::{is_candidate, is_link_or_script},
        deps::{DependencyBackend, LibraryFilter},
        error::{BlddError, Result},
        index::DependencyIndex,
        tool::{ToolPaths, ToolRunner},
    },
    log::{debug, warn},
    rayon::prelude::*,
    std::path::{Path, PathBuf},
};

/// How often progress is logged, in files.
const PROGRESS_INTERVAL: usize = 100;

/// Settings influencing a scan.
#[derive(Clone, Debug)]
pub struct ScanSettings {
    /// Only record libraries matching this filter.
    pub filter: LibraryFilter,
    /// Locations of external tools.
    pub tools: ToolPaths,
    /// Number of files to inspect concurrently.
    pub jobs: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            filter: LibraryFilter::default(),
            tools: ToolPaths::default(),
            jobs: 1,
        }
    }
}

/// Counters describing what happened during a scan.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanStats {
    /// Non-directory entries encountered.
    pub files_scanned: usize,
    /// Files recorded in the index.
    pub files_matched: usize,
    /// Files that aren't ELF executables.
    pub not_candidate: usize,
    /// Symbolic links and `#!` scripts.
    pub link_or_script: usize,
    /// Files of unrecognized architecture.
    pub unknown_architecture: usize,
    /// Files with no (matching) library dependencies.
    pub no_dependencies: usize,
    /// Directory entries that could not be read.
    pub walk_errors: usize,
}

/// Result of a successful scan.
#[derive(Clone, Debug)]
pub struct ScanOutcome {
    pub index: DependencyIndex,
    pub stats: ScanStats,
}

/// What was learned about a single file.
#[derive(Clone, Debug, Eq, PartialEq)]
enum FileVerdict {
    NotCandidate,
    LinkOrScript,
    UnknownArchitecture,
    NoDependencies,
    Matched(Architecture, Vec<String>),
}

/// Builds a [DependencyIndex] from the files under a directory.
pub struct Scanner<'a> {
    runner: &'a dyn ToolRunner,
    backend: Box<dyn DependencyBackend>,
    settings: ScanSettings,
}

impl<'a> Scanner<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        backend: Box<dyn DependencyBackend>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            runner,
            backend,
            settings,
        }
    }

    /// Scan every file under `root`.
    ///
    /// Directory symlinks are followed. Failures affecting individual files
    /// are counted in [ScanStats] and otherwise ignored.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        if !root.is_dir() {
            return Err(BlddError::ScanRootMissing(root.to_path_buf()));
        }

        let mut index = DependencyIndex::new();
        let mut stats = ScanStats::default();
        let mut walk_errors = 0;

        if self.settings.jobs > 1 {
            let paths = walk_files(root, &mut walk_errors).collect::<Vec<_>>();

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.jobs)
                .build()?;

            // collect() on an indexed parallel iterator retains input order.
            let verdicts = pool.install(|| {
                paths
                    .par_iter()
                    .map(|path| self.inspect(path))
                    .collect::<Vec<_>>()
            });

            for (path, verdict) in paths.iter().zip(verdicts) {
                tally(&mut index, &mut stats, path, verdict);
            }
        } else {
            for path in walk_files(root, &mut walk_errors) {
                let verdict = self.inspect(&path);
                tally(&mut index, &mut stats, &path, verdict);
            }
        }

        stats.walk_errors = walk_errors;

        debug!(
            "scanning completed; scanned {} files, found {} matching executables",
            stats.files_scanned, stats.files_matched
        );

        Ok(ScanOutcome { index, stats })
    }

    fn inspect(&self, path: &Path) -> FileVerdict {
        let tools = &self.settings.tools;

        if !is_candidate(path, self.runner, &tools.file) {
            return FileVerdict::NotCandidate;
        }

        if is_link_or_script(path) {
            return FileVerdict::LinkOrScript;
        }

        let arch = match ArchitectureDetector::new(self.runner, &tools.readelf).detect(path) {
            Some(arch) => arch,
            None => return FileVerdict::UnknownArchitecture,
        };

        let libraries = self
            .settings
            .filter
            .apply(self.backend.extract(path, self.runner));

        if libraries.is_empty() {
            FileVerdict::NoDependencies
        } else {
            FileVerdict::Matched(arch, libraries)
        }
    }
}

fn walk_files<'e>(root: &Path, errors: &'e mut usize) -> impl Iterator<Item = PathBuf> + 'e {
    walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_dir() => None,
            Ok(entry) => Some(entry.into_path()),
            // Dangling symlinks can't be followed. They are handed on like any
            // other file and rejected during classification.
            Err(e) if e.loop_ancestor().is_none() && e.path().map_or(false, is_symlink) => {
                let path = e.path()?;
                debug!("dangling symlink {}", path.display());
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("error walking directory (ignoring): {}", e);
                *errors += 1;
                None
            }
        })
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

fn tally(index: &mut DependencyIndex, stats: &mut ScanStats, path: &Path, verdict: FileVerdict) {
    stats.files_scanned += 1;
    if stats.files_scanned % PROGRESS_INTERVAL == 0 {
        debug!("scanned {} files...", stats.files_scanned);
    }

    match verdict {
        FileVerdict::NotCandidate => stats.not_candidate += 1,
        FileVerdict::LinkOrScript => stats.link_or_script += 1,
        FileVerdict::UnknownArchitecture => stats.unknown_architecture += 1,
        FileVerdict::NoDependencies => stats.no_dependencies += 1,
        FileVerdict::Matched(arch, libraries) => {
            stats.files_matched += 1;
            index.record(arch, path, &libraries);
        }
    }
}
