// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Rendering of a [DependencyIndex] into documents. */

use {
    crate::{
        error::{BlddError, Result},
        index::DependencyIndex,
        pdf::{PdfBuilder, TextStyle},
    },
    chrono::{DateTime, Local},
    std::{
        ffi::OsString,
        fmt::{self, Write},
        path::{Path, PathBuf},
        str::FromStr,
    },
};

const TITLE: &str = "Report on dynamic used libraries by ELF executables";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Document formats a report can be written in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReportFormat {
    #[default]
    Text,
    Pdf,
}

impl ReportFormat {
    /// The selector value and file extension of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Pdf => "pdf",
        }
    }

    /// Render an index in this format.
    pub fn render(
        &self,
        index: &DependencyIndex,
        root: &Path,
        generated: &DateTime<Local>,
    ) -> Vec<u8> {
        match self {
            Self::Text => render_text_at(index, root, generated).into_bytes(),
            Self::Pdf => render_pdf_at(index, root, generated),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = BlddError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "txt" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            _ => Err(BlddError::UnknownReportFormat(s.to_string())),
        }
    }
}

/// The scanned directory as displayed in reports.
fn display_root(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Render an index as plain text, timestamped with the current time.
pub fn render_text(index: &DependencyIndex, root: &Path) -> String {
    render_text_at(index, root, &Local::now())
}

/// Render an index as plain text.
///
/// Architectures appear in label order. Within an architecture, libraries
/// used by more files come first.
pub fn render_text_at(
    index: &DependencyIndex,
    root: &Path,
    generated: &DateTime<Local>,
) -> String {
    let mut s = String::new();

    // Writing to a String is infallible.
    let _ = writeln!(s, "{} on {}", TITLE, display_root(root).display());
    let _ = writeln!(s, "Generated on: {}", generated.format(TIMESTAMP_FORMAT));
    s.push('\n');

    for arch in index.architectures() {
        let _ = writeln!(s, "{} {} {}", "-".repeat(10), arch, "-".repeat(10));

        for (library, paths) in index.ranked_libraries(arch) {
            let _ = writeln!(s, "{} ({} execs)", library, paths.len());
            for path in paths {
                let _ = writeln!(s, "-> {}", path.display());
            }
        }

        s.push('\n');
    }

    s
}

/// Render an index as a PDF document, timestamped with the current time.
pub fn render_pdf(index: &DependencyIndex, root: &Path) -> Vec<u8> {
    render_pdf_at(index, root, &Local::now())
}

/// Render an index as a PDF document with the same content and ordering as the text form.
pub fn render_pdf_at(
    index: &DependencyIndex,
    root: &Path,
    generated: &DateTime<Local>,
) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();

    pdf.line(TextStyle::Title, TITLE);
    pdf.line(
        TextStyle::Body,
        &format!("Scanned directory: {}", display_root(root).display()),
    );
    pdf.line(
        TextStyle::Body,
        &format!("Generated on: {}", generated.format(TIMESTAMP_FORMAT)),
    );
    pdf.space(12.0);

    for arch in index.architectures() {
        pdf.line(TextStyle::Heading, arch.as_str());
        pdf.space(6.0);

        for (library, paths) in index.ranked_libraries(arch) {
            pdf.line(
                TextStyle::Subheading,
                &format!("{} ({} execs)", library, paths.len()),
            );
            for path in paths {
                pdf.line(TextStyle::Monospace, &path.display().to_string());
            }
            pdf.space(12.0);
        }
    }

    pdf.finish()
}

/// Resolve the path a report is written to.
///
/// The format's extension is appended unless the path already ends with it.
pub fn report_path(output: &Path, format: ReportFormat) -> PathBuf {
    let suffix = format!(".{}", format.extension());

    if output.to_string_lossy().ends_with(&suffix) {
        output.to_path_buf()
    } else {
        let mut s = OsString::from(output.as_os_str());
        s.push(&suffix);
        PathBuf::from(s)
    }
}

/// Write a report for `index` to `output`, returning the path written.
pub fn write_report(
    index: &DependencyIndex,
    root: &Path,
    format: ReportFormat,
    output: &Path,
) -> Result<PathBuf> {
    let path = report_path(output, format);

    std::fs::write(&path, format.render(index, root, &Local::now()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{arch::Architecture, pdf::tests::assert_valid_structure},
        chrono::TimeZone,
        indoc::indoc,
    };

    fn libs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn timestamp() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous local time")
    }

    fn sample_index() -> DependencyIndex {
        let mut index = DependencyIndex::new();

        index.record(
            Architecture::X86_64,
            Path::new("/usr/bin/a"),
            &libs(&["libaaa.so", "libzzz.so"]),
        );
        for name in ["b", "c", "d", "e"] {
            index.record(
                Architecture::X86_64,
                Path::new(&format!("/usr/bin/{}", name)),
                &libs(&["libzzz.so"]),
            );
        }
        index.record(
            Architecture::X86_64,
            Path::new("/usr/bin/f"),
            &libs(&["libaaa.so"]),
        );
        index.record(
            Architecture::Armv7,
            Path::new("/opt/arm/app"),
            &libs(&["libc.so.6"]),
        );

        index
    }

    #[test]
    fn text_layout() {
        let text = render_text_at(&sample_index(), Path::new("/usr"), &timestamp());

        assert_eq!(
            text,
            indoc! {"
                Report on dynamic used libraries by ELF executables on /usr
                Generated on: 2024-03-09 14:05:07

                ---------- armv7 ----------
                libc.so.6 (1 execs)
                -> /opt/arm/app

                ---------- x86-64 ----------
                libzzz.so (5 execs)
                -> /usr/bin/a
                -> /usr/bin/b
                -> /usr/bin/c
                -> /usr/bin/d
                -> /usr/bin/e
                libaaa.so (2 execs)
                -> /usr/bin/a
                -> /usr/bin/f

            "}
        );
    }

    #[test]
    fn more_used_library_comes_first_regardless_of_name() {
        let text = render_text(&sample_index(), Path::new("/usr"));

        let zzz = text.find("libzzz.so (5 execs)").unwrap();
        let aaa = text.find("libaaa.so (2 execs)").unwrap();
        assert!(zzz < aaa);
    }

    #[test]
    fn empty_index_has_only_header() {
        let text = render_text_at(&DependencyIndex::new(), Path::new("/"), &timestamp());

        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("Report on dynamic used libraries by ELF executables on /\n"));
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let text = render_text_at(&DependencyIndex::new(), Path::new("bin"), &timestamp());
        let expected = std::env::current_dir().unwrap().join("bin");

        assert!(text
            .lines()
            .next()
            .unwrap()
            .ends_with(&format!(" on {}", expected.display())));
    }

    #[test]
    fn pdf_carries_same_content() {
        let data = render_pdf_at(&sample_index(), Path::new("/usr"), &timestamp());
        assert_valid_structure(&data);

        let text = String::from_utf8_lossy(&data);
        let armv7 = text.find("(armv7) Tj").unwrap();
        let x86_64 = text.find("(x86-64) Tj").unwrap();
        let zzz = text.find("(libzzz.so \\(5 execs\\)) Tj").unwrap();
        let aaa = text.find("(libaaa.so \\(2 execs\\)) Tj").unwrap();

        assert!(armv7 < x86_64);
        assert!(x86_64 < zzz);
        assert!(zzz < aaa);
        assert!(text.contains("(Generated on: 2024-03-09 14:05:07) Tj"));
        assert!(text.contains("(/opt/arm/app) Tj"));
    }

    #[test]
    fn format_selection() {
        assert_eq!("txt".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!("pdf".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert!(matches!(
            "html".parse::<ReportFormat>(),
            Err(BlddError::UnknownReportFormat(_))
        ));
    }

    #[test]
    fn extension_is_appended_when_missing() {
        assert_eq!(
            report_path(Path::new("bldd_report"), ReportFormat::Text),
            PathBuf::from("bldd_report.txt")
        );
        assert_eq!(
            report_path(Path::new("out/report.pdf"), ReportFormat::Pdf),
            PathBuf::from("out/report.pdf")
        );
        assert_eq!(
            report_path(Path::new("report.txt"), ReportFormat::Pdf),
            PathBuf::from("report.txt.pdf")
        );
    }

    #[test]
    fn write_report_creates_file() -> Result<()> {
        let td = tempfile::tempdir()?;

        let path = write_report(
            &sample_index(),
            Path::new("/usr"),
            ReportFormat::Text,
            &td.path().join("report"),
        )?;

        assert_eq!(path, td.path().join("report.txt"));
        let written = std::fs::read_to_string(&path)?;
        assert!(written.contains("libzzz.so (5 execs)"));

        Ok(())
    }
}
