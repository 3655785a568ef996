// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Minimal PDF document writer.

Documents consist of lines of text flowing top to bottom over US Letter
pages using the standard Type 1 fonts, which every PDF reader provides.
That is all a report needs.
*/

use std::fmt::Write;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 50.0;
const LEADING: f32 = 1.4;

/// Approximate advance of a Courier glyph relative to the font size.
const MONOSPACE_ADVANCE: f32 = 0.6;

/// (resource name, base font) pairs. Object numbers are assigned in this order.
const FONTS: [(&str, &str); 3] = [
    ("F1", "Helvetica"),
    ("F2", "Helvetica-Bold"),
    ("F3", "Courier"),
];

/// Object number of the first font. 1 is the catalog and 2 the page tree.
const FIRST_FONT_OBJECT: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextStyle {
    Title,
    Heading,
    Subheading,
    Body,
    Monospace,
}

impl TextStyle {
    fn font(&self) -> &'static str {
        match self {
            Self::Body => "F1",
            Self::Title | Self::Heading | Self::Subheading => "F2",
            Self::Monospace => "F3",
        }
    }

    fn size(&self) -> f32 {
        match self {
            Self::Title => 18.0,
            Self::Heading => 15.0,
            Self::Subheading => 11.0,
            Self::Body => 10.0,
            Self::Monospace => 8.0,
        }
    }
}

/// Escape text for use in a PDF literal string.
///
/// Anything outside printable ASCII is replaced with `?`.
fn escape(text: &str) -> String {
    let mut s = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                s.push('\\');
                s.push(c);
            }
            ' '..='~' => s.push(c),
            _ => s.push('?'),
        }
    }

    s
}

/// Accumulates lines of text and produces a PDF document.
#[derive(Clone, Debug)]
pub struct PdfBuilder {
    pages: Vec<String>,
    current: String,
    cursor: f32,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self {
            pages: vec![],
            current: String::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line of text, starting a new page if needed.
    ///
    /// Monospace text too wide for the page is wrapped.
    pub fn line(&mut self, style: TextStyle, text: &str) {
        if style == TextStyle::Monospace {
            let width =
                ((PAGE_WIDTH - 2.0 * MARGIN) / (style.size() * MONOSPACE_ADVANCE)) as usize;
            let chars = text.chars().collect::<Vec<_>>();

            if chars.len() > width {
                for chunk in chars.chunks(width) {
                    self.emit(style, &chunk.iter().collect::<String>());
                }
                return;
            }
        }

        self.emit(style, text);
    }

    /// Insert vertical whitespace.
    pub fn space(&mut self, points: f32) {
        self.cursor -= points;
    }

    /// Number of pages the document has so far.
    #[cfg(test)]
    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    fn emit(&mut self, style: TextStyle, text: &str) {
        let advance = style.size() * LEADING;

        if self.cursor - advance < MARGIN {
            self.pages.push(std::mem::take(&mut self.current));
            self.cursor = PAGE_HEIGHT - MARGIN;
        }

        self.cursor -= advance;

        // Writing to a String is infallible.
        let _ = writeln!(
            self.current,
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            style.font(),
            style.size(),
            MARGIN,
            self.cursor,
            escape(text)
        );
    }

    /// Serialize the document.
    pub fn finish(mut self) -> Vec<u8> {
        self.pages.push(std::mem::take(&mut self.current));

        let first_page_object = FIRST_FONT_OBJECT + FONTS.len();
        let page_object = |i: usize| first_page_object + 2 * i;

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..self.pages.len())
                    .map(|i| format!("{} 0 R", page_object(i)))
                    .collect::<Vec<_>>()
                    .join(" "),
                self.pages.len()
            ),
        ];

        for (_, base_font) in FONTS {
            objects.push(format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                base_font
            ));
        }

        let font_resources = FONTS
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("/{} {} 0 R", name, FIRST_FONT_OBJECT + i))
            .collect::<Vec<_>>()
            .join(" ");

        for (i, content) in self.pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << {} >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                font_resources,
                page_object(i) + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut data = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());

        for (i, object) in objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
        }

        let xref_offset = data.len();
        let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(trailer, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            trailer,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        data.extend_from_slice(trailer.as_bytes());

        data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Verify the cross-reference table points at the objects it claims to.
    pub(crate) fn assert_valid_structure(data: &[u8]) {
        assert!(data.starts_with(b"%PDF-1.4\n"));
        assert!(data.ends_with(b"%%EOF\n"));

        let text = String::from_utf8_lossy(data);
        let startxref = text
            .rsplit("startxref\n")
            .next()
            .and_then(|s| s.lines().next())
            .and_then(|s| s.parse::<usize>().ok())
            .expect("startxref offset");
        assert!(data[startxref..].starts_with(b"xref\n"));

        let xref = &data[startxref..];
        let xref = String::from_utf8_lossy(xref);
        let mut lines = xref.lines().skip(1);
        let count = lines
            .next()
            .and_then(|l| l.strip_prefix("0 "))
            .and_then(|l| l.parse::<usize>().ok())
            .expect("xref count");
        assert_eq!(lines.next(), Some("0000000000 65535 f "));

        for number in 1..count {
            let entry = lines.next().expect("xref entry");
            assert_eq!(entry.len(), 19);
            let offset = entry[0..10].parse::<usize>().expect("xref offset");
            let header = format!("{} 0 obj\n", number);
            assert!(
                data[offset..].starts_with(header.as_bytes()),
                "object {} not at {}",
                number,
                offset
            );
        }

        assert!(find(data, format!("/Size {}", count).as_bytes()).is_some());
    }

    #[test]
    fn escaping() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(escape("caf\u{e9}\t"), "caf??");
    }

    #[test]
    fn empty_document_has_one_page() {
        let data = PdfBuilder::new().finish();

        assert_valid_structure(&data);
        assert!(find(&data, b"/Count 1").is_some());
    }

    #[test]
    fn text_lands_in_content_stream() {
        let mut builder = PdfBuilder::new();
        builder.line(TextStyle::Title, "Hello (world)");
        builder.space(12.0);
        builder.line(TextStyle::Monospace, "/usr/bin/ls");

        let data = builder.finish();
        assert_valid_structure(&data);
        assert!(find(&data, b"/F2 18.0 Tf").is_some());
        assert!(find(&data, br"(Hello \(world\)) Tj").is_some());
        assert!(find(&data, b"(/usr/bin/ls) Tj").is_some());
        assert!(find(&data, b"/BaseFont /Courier").is_some());
    }

    #[test]
    fn long_documents_span_pages() {
        let mut builder = PdfBuilder::new();
        for i in 0..200 {
            builder.line(TextStyle::Body, &format!("line {}", i));
        }
        assert!(builder.page_count() > 1);
        let pages = builder.page_count();

        let data = builder.finish();
        assert_valid_structure(&data);
        assert!(find(&data, format!("/Count {}", pages).as_bytes()).is_some());
        assert!(find(&data, b"(line 199) Tj").is_some());
    }

    #[test]
    fn long_monospace_lines_wrap() {
        let mut builder = PdfBuilder::new();
        let path = format!("/{}", "a".repeat(250));
        builder.line(TextStyle::Monospace, &path);

        let data = builder.finish();
        let text = String::from_utf8_lossy(&data);
        assert_eq!(text.matches("/F3 8.0 Tf").count(), 3);
    }
}
