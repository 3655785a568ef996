// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{Context, Result},
    bldd::{
        report::write_report, tool::ensure_tool_available, BackendKind, BlddError,
        LibraryFilter, ReportFormat, ScanSettings, Scanner, SystemToolRunner, ToolPaths,
    },
    clap::{value_parser, Arg, ArgAction, ArgMatches, Command},
    log::{debug, info, LevelFilter},
    std::{
        path::{Path, PathBuf},
        time::Duration,
    },
};

const ABOUT: &str = "\
bldd (backward ldd) shows all executable files using specified shared libraries.

`ldd` prints the shared libraries an executable requires. `bldd` answers the
opposite question: it scans a directory tree for ELF executables, determines
their architecture and required shared libraries, and reports, per
architecture, which executables use each library.

Libraries are ordered by the number of executables using them, most used
first. When `--libraries` is given, only libraries whose names contain one of
the values (case-insensitively) are reported.

ELF files are inspected with `readelf` and `objdump` from GNU binutils, which
must be installed. Files without an executable permission bit are checked
with `file`.
";

const EXAMPLES: &str = "\
Examples:
  bldd -d /usr/bin -l libc.so.6 -o report.txt
    Scans /usr/bin for executables using libc.so.6 and saves to report.txt

  bldd -d /usr/bin -l libc.so.6 libm.so.6 -f pdf -o report.pdf
    Scans /usr/bin for executables using libc.so.6 or libm.so.6 and saves as PDF

  bldd -d /usr/bin -v
    Scans /usr/bin for all shared libraries with verbose output

  bldd -d /usr/bin -t readelf
    Scans /usr/bin using readelf instead of objdump
";

fn command() -> Command {
    Command::new("bldd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Find executables using specified shared libraries (backward ldd)")
        .long_about(ABOUT)
        .after_help(EXAMPLES)
        .arg(
            Arg::new("directory")
                .short('d')
                .long("directory")
                .value_name("DIR")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory to scan for executables"),
        )
        .arg(
            Arg::new("libraries")
                .short('l')
                .long("libraries")
                .value_name("NAME")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Specific libraries to search for (e.g. libc.so.6)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .default_value("bldd_report")
                .value_parser(value_parser!(PathBuf))
                .help("Output file path; the format's extension is added if missing"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["txt", "pdf"])
                .default_value("txt")
                .help("Report format"),
        )
        .arg(
            Arg::new("tool")
                .short('t')
                .long("tool")
                .value_parser(["objdump", "readelf"])
                .default_value("objdump")
                .help("Tool for extracting dependencies"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("1")
                .help("Number of files to inspect concurrently"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64).range(1..))
                .help("Kill inspection tools running longer than this"),
        )
        .arg(
            Arg::new("readelf")
                .long("readelf")
                .value_name("PROGRAM")
                .default_value("readelf")
                .value_parser(value_parser!(PathBuf))
                .help("readelf program to run"),
        )
        .arg(
            Arg::new("objdump")
                .long("objdump")
                .value_name("PROGRAM")
                .default_value("objdump")
                .value_parser(value_parser!(PathBuf))
                .help("objdump program to run"),
        )
        .arg(
            Arg::new("file_tool")
                .long("file-tool")
                .value_name("PROGRAM")
                .default_value("file")
                .value_parser(value_parser!(PathBuf))
                .help("file program to run"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase logging verbosity; can be specified multiple times"),
        )
}

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .expect("argument has a default value")
}

fn locate(program: &Path) -> bldd::Result<PathBuf> {
    let resolved = ensure_tool_available(program)?;
    debug!("using {} at {}", program.display(), resolved.display());

    Ok(resolved)
}

/// Replace the programs a scan runs with their resolved locations.
///
/// The backend's program is checked first, then readelf, which always reads
/// headers. The file type probe is only a fallback and may be absent.
fn resolve_tools(tools: ToolPaths, backend: BackendKind) -> bldd::Result<ToolPaths> {
    let objdump = match backend {
        BackendKind::Objdump => locate(&tools.objdump)?,
        BackendKind::Readelf => tools.objdump,
    };
    let readelf = locate(&tools.readelf)?;
    let file = ensure_tool_available(&tools.file).unwrap_or_else(|_| {
        debug!("{} not found; non-executable ELF files will be skipped", tools.file.display());
        tools.file
    });

    Ok(ToolPaths {
        readelf,
        objdump,
        file,
    })
}

pub fn run() -> Result<i32> {
    let matches = command().get_matches();

    init_logging(&matches);

    let root = path_arg(&matches, "directory");
    if !root.is_dir() {
        return Err(BlddError::ScanRootMissing(root).into());
    }

    let backend_kind = matches
        .get_one::<String>("tool")
        .expect("tool has a default value")
        .parse::<BackendKind>()?;
    let format = matches
        .get_one::<String>("format")
        .expect("format has a default value")
        .parse::<ReportFormat>()?;

    let tools = resolve_tools(
        ToolPaths {
            readelf: path_arg(&matches, "readelf"),
            objdump: path_arg(&matches, "objdump"),
            file: path_arg(&matches, "file_tool"),
        },
        backend_kind,
    )?;
    let backend = backend_kind.backend(&tools);

    let filter = LibraryFilter::new(
        matches
            .get_many::<String>("libraries")
            .unwrap_or_default(),
    );
    let jobs = *matches.get_one::<u64>("jobs").expect("jobs has a default value") as usize;
    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|seconds| Duration::from_secs(*seconds));

    let runner = SystemToolRunner::with_timeout(timeout);
    let settings = ScanSettings {
        filter,
        tools,
        jobs,
    };

    info!("scanning directory: {}", root.display());
    let outcome = Scanner::new(&runner, backend, settings).scan(&root)?;
    let stats = &outcome.stats;

    info!(
        "scanned {} files, found {} matching executables",
        stats.files_scanned, stats.files_matched
    );
    debug!(
        "skipped {} non-executables, {} links or scripts, {} of unknown architecture, \
         {} without matching dependencies; {} unreadable directory entries",
        stats.not_candidate,
        stats.link_or_script,
        stats.unknown_architecture,
        stats.no_dependencies,
        stats.walk_errors
    );

    if outcome.index.is_empty() {
        info!("no executables found with matching dependencies");
        return Ok(0);
    }

    let output = path_arg(&matches, "output");
    let report_path = write_report(&outcome.index, &root, format, &output)
        .with_context(|| format!("writing report to {}", output.display()))?;

    info!("{} report generated: {}", format, report_path.display());

    Ok(0)
}
