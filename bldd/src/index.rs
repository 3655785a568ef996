// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reverse dependency index. */

use {
    crate::arch::Architecture,
    linked_hash_map::LinkedHashMap,
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Files using each library, keyed by library name in first-seen order.
pub type LibraryUsers = LinkedHashMap<String, Vec<PathBuf>>;

/// Maps architectures to the libraries used by files of that architecture.
///
/// Only architectures that have been recorded are present. Paths are stored
/// in the order they were recorded and a path is stored at most once per
/// (architecture, library) pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DependencyIndex {
    architectures: BTreeMap<Architecture, LibraryUsers>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path`, of architecture `arch`, requires each of `libraries`.
    ///
    /// Returns the number of (library, path) associations that were added.
    pub fn record(&mut self, arch: Architecture, path: &Path, libraries: &[String]) -> usize {
        if libraries.is_empty() {
            return 0;
        }

        let users = self.architectures.entry(arch).or_default();
        let mut added = 0;

        for library in libraries {
            let paths = users.entry(library.clone()).or_insert_with(Vec::new);

            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_path_buf());
                added += 1;
            }
        }

        added
    }

    pub fn is_empty(&self) -> bool {
        self.architectures.is_empty()
    }

    /// Architectures present in the index, in label order.
    pub fn architectures(&self) -> impl Iterator<Item = Architecture> + '_ {
        self.architectures.keys().copied()
    }

    /// Libraries used by files of an architecture, in first-seen order.
    pub fn libraries(&self, arch: Architecture) -> Option<&LibraryUsers> {
        self.architectures.get(&arch)
    }

    /// Files of an architecture using a library.
    pub fn users(&self, arch: Architecture, library: &str) -> &[PathBuf] {
        self.architectures
            .get(&arch)
            .and_then(|users| users.get(library))
            .map(|paths| paths.as_slice())
            .unwrap_or_default()
    }

    /// Libraries of an architecture ordered by descending number of users.
    ///
    /// Libraries with equal counts keep their first-seen order.
    pub fn ranked_libraries(&self, arch: Architecture) -> Vec<(&str, &[PathBuf])> {
        let mut libraries = self
            .architectures
            .get(&arch)
            .map(|users| {
                users
                    .iter()
                    .map(|(library, paths)| (library.as_str(), paths.as_slice()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        // sort_by_key is stable.
        libraries.sort_by_key(|(_, paths)| std::cmp::Reverse(paths.len()));

        libraries
    }

    /// Number of distinct files present anywhere in the index.
    pub fn file_count(&self) -> usize {
        self.architectures
            .values()
            .flat_map(|users| users.iter().flat_map(|(_, paths)| paths.iter()))
            .collect::<std::collections::HashSet<_>>()
            .len()
    }
}
