// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        error::{BlddError, Result},
        tool::{ToolOutput, ToolRunner},
    },
    std::{
        collections::HashMap,
        ffi::OsStr,
        os::unix::fs::PermissionsExt,
        path::Path,
        sync::Mutex,
    },
};

pub const ELF_MAGIC_HEADER: &[u8] = b"\x7fELF\x02\x01\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00";

/// A [ToolRunner] answering from canned responses keyed by command line.
///
/// Command lines are formatted as `<program> <arg> <arg>...`. Unknown command
/// lines behave like a program that could not be spawned.
#[derive(Debug, Default)]
pub struct FakeToolRunner {
    responses: HashMap<String, ToolOutput>,
    calls: Mutex<Vec<String>>,
}

impl FakeToolRunner {
    pub fn respond(&mut self, command_line: impl Into<String>, output: ToolOutput) {
        self.responses.insert(command_line.into(), output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

impl ToolRunner for FakeToolRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> Result<ToolOutput> {
        let mut command_line = program.display().to_string();
        for arg in args {
            command_line.push(' ');
            command_line.push_str(&arg.to_string_lossy());
        }

        self.calls
            .lock()
            .expect("lock poisoned")
            .push(command_line.clone());

        self.responses
            .get(&command_line)
            .cloned()
            .ok_or_else(|| BlddError::ToolSpawn {
                program: program.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}

/// Write a file with the given content and unix permission bits.
pub fn write_file(path: &Path, data: &[u8], mode: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("unable to create parent directory");
    }
    std::fs::write(path, data).expect("unable to write file");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .expect("unable to set permissions");
}

/// `readelf -h` output for a binary of the given class and machine.
pub fn readelf_header(class: &str, machine: &str) -> String {
    format!(
        "ELF Header:\n  \
         Magic:   7f 45 4c 46 02 01 01 00 00 00 00 00 00 00 00 00\n  \
         Class:                             {}\n  \
         Data:                              2's complement, little endian\n  \
         Version:                           1 (current)\n  \
         OS/ABI:                            UNIX - System V\n  \
         Type:                              DYN (Position-Independent Executable file)\n  \
         Machine:                           {}\n  \
         Version:                           0x1\n",
        class, machine
    )
}

/// `objdump -x` dynamic section excerpt listing the given libraries.
pub fn objdump_dynamic_section(libraries: &[&str]) -> String {
    let mut s = String::from("\nDynamic Section:\n");
    for library in libraries {
        s.push_str(&format!("  NEEDED               {}\n", library));
    }
    s.push_str("  INIT                 0x0000000000001000\n");

    s
}
