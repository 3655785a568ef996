// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Deciding which filesystem entries are worth inspecting. */

use {
    crate::tool::ToolRunner,
    log::debug,
    std::{
        ffi::OsStr,
        fs::File,
        io::Read,
        path::Path,
    },
};

/// Leading bytes of every ELF file.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Leading bytes of an interpreted script.
const SHEBANG: [u8; 2] = *b"#!";

/// Read up to `count` leading bytes of a file.
fn read_prefix(path: &Path, count: u64) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(count as usize);
    File::open(path)?.take(count).read_to_end(&mut data)?;

    Ok(data)
}

/// Whether the current process may execute a file.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::{ffi::CString, os::unix::ffi::OsStrExt};

    match CString::new(path.as_os_str().as_bytes()) {
        // SAFETY: the pointer is a valid NUL-terminated string for the duration of the call.
        Ok(path) => unsafe { libc::access(path.as_ptr(), libc::X_OK) == 0 },
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Whether a path is an ELF file that should be inspected further.
///
/// The file must be a regular file (symlinks are followed for this check)
/// starting with [ELF_MAGIC]. Files the current process may execute are
/// accepted outright. Otherwise `file_tool` is consulted and the file is
/// accepted if its description mentions `executable`.
///
/// Any failure along the way means the file is not a candidate.
pub fn is_candidate(path: &Path, runner: &dyn ToolRunner, file_tool: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return false,
        Err(e) => {
            debug!("unable to stat {}: {}", path.display(), e);
            return false;
        }
    }

    match read_prefix(path, ELF_MAGIC.len() as u64) {
        Ok(header) if header == ELF_MAGIC => {}
        Ok(_) => return false,
        Err(e) => {
            debug!("unable to read {}: {}", path.display(), e);
            return false;
        }
    }

    if is_executable(path) {
        return true;
    }

    match runner.run(file_tool, &[OsStr::new("-b"), path.as_os_str()]) {
        Ok(output) => output.stdout.to_lowercase().contains("executable"),
        Err(e) => {
            debug!("error probing file type of {}: {}", path.display(), e);
            false
        }
    }
}

/// Whether a path is a symbolic link or a `#!` script.
///
/// Links are rejected so a binary reachable through several tree entries is
/// only counted once.
pub fn is_link_or_script(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => return true,
        Ok(_) => {}
        Err(_) => return false,
    }

    matches!(read_prefix(path, SHEBANG.len() as u64), Ok(prefix) if prefix == SHEBANG)
}
