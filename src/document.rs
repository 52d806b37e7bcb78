//! The combined document: ordered sections plus render settings.

use std::fs;
use std::path::{Path, PathBuf};

use crate::block::{Block, List, Span};
use crate::css::Stylesheet;
use crate::error::{Error, Result};
use crate::loader::{self, Section, SectionOutcome};
use crate::parser;
use crate::typst::MarkupWriter;

pub const DOCUMENT_TITLE: &str = "Combined Markdown Document";
pub const DOCUMENT_AUTHOR: &str = "Markdown to PDF CLI";

/// Deepest heading level that gets an outline entry, between 1 and 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TocLevel(u8);

impl TocLevel {
    pub const MIN: TocLevel = TocLevel(1);
    pub const MAX: TocLevel = TocLevel(6);

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&level)
            .then_some(TocLevel(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for TocLevel {
    fn default() -> Self {
        Self::MAX
    }
}

/// Settings shared by every section of one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub toc_level: TocLevel,
    /// Trade PDF structure tags for a smaller file.
    pub optimize: bool,
    pub css: Option<PathBuf>,
}

/// Outline entry produced by a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    sections: Vec<Section>,
    toc_level: TocLevel,
    optimize: bool,
    stylesheet: Option<Stylesheet>,
}

impl Document {
    /// Empty document. `css` is applied uniformly to every section.
    pub fn new(toc_level: TocLevel, optimize: bool, css: Option<&str>) -> Self {
        Self {
            sections: Vec::new(),
            toc_level,
            optimize,
            stylesheet: css.map(Stylesheet::parse),
        }
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn title(&self) -> &str {
        DOCUMENT_TITLE
    }

    pub fn author(&self) -> &str {
        DOCUMENT_AUTHOR
    }

    pub fn stylesheet(&self) -> Option<&Stylesheet> {
        self.stylesheet.as_ref()
    }

    /// Headings that end up in the PDF outline, in document order.
    pub fn toc_entries(&self) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        for section in &self.sections {
            collect_headings(&parser::parse(&section.content), self.toc_level, &mut entries);
        }
        entries
    }

    /// Typst source for the whole document.
    pub fn to_typst(&self) -> String {
        let mut writer = MarkupWriter::new(self.toc_level.get());
        writer.preamble(self.title(), self.author(), self.stylesheet.as_ref());
        for section in &self.sections {
            writer.section(&parser::parse(&section.content));
        }
        writer.finish()
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        crate::compile_pdf(self.to_typst(), self.optimize)
    }

    /// Render and write to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.render()?;
        fs::write(path, bytes).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn collect_headings(blocks: &[Block], toc_level: TocLevel, entries: &mut Vec<TocEntry>) {
    for block in blocks {
        match block {
            Block::Heading { level, content } if *level <= toc_level.get() => {
                entries.push(TocEntry {
                    level: *level,
                    title: Span::plain_text(content),
                });
            }
            Block::Quote(inner) => collect_headings(inner, toc_level, entries),
            Block::List(list) => collect_list_headings(list, toc_level, entries),
            _ => {}
        }
    }
}

fn collect_list_headings(list: &List, toc_level: TocLevel, entries: &mut Vec<TocEntry>) {
    for item in &list.items {
        collect_headings(&item.blocks, toc_level, entries);
        if let Some(nested) = &item.nested {
            collect_list_headings(nested, toc_level, entries);
        }
    }
}

/// A document together with what happened to each input file.
#[derive(Debug)]
pub struct Assembly {
    pub document: Document,
    pub outcomes: Vec<SectionOutcome>,
}

impl Assembly {
    pub fn skipped(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SectionOutcome::Skipped { path, .. } => Some(path.as_path()),
            SectionOutcome::Added(_) => None,
        })
    }
}

/// Build a document from `inputs` in order. Unreadable inputs are skipped.
pub fn assemble(inputs: &[PathBuf], options: &RenderOptions) -> Assembly {
    let css = loader::load_css(options.css.as_deref());
    let mut document = Document::new(options.toc_level, options.optimize, css.as_deref());
    if document.stylesheet().is_some_and(Stylesheet::is_empty) {
        log::warn!("Custom CSS has no rules that apply to the PDF; rendering with default styles.");
    }

    log::info!("Processing {} Markdown files...", inputs.len());

    let outcomes: Vec<SectionOutcome> = inputs.iter().map(|path| loader::build_section(path)).collect();
    for outcome in &outcomes {
        if let Some(section) = outcome.section() {
            document.push(section.clone());
        }
    }

    Assembly { document, outcomes }
}

/// Summary of a finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub output: PathBuf,
    pub sections: usize,
    pub skipped: Vec<PathBuf>,
}

/// Assemble `inputs` and write the PDF to `output`.
///
/// Even when every input was skipped the (empty) document is still written.
pub fn create_pdf(inputs: &[PathBuf], output: &Path, options: &RenderOptions) -> Result<Report> {
    let assembly = assemble(inputs, options);
    if assembly.document.sections().is_empty() {
        log::warn!("No readable Markdown files; writing a document without sections.");
    }

    assembly.document.save(output)?;

    Ok(Report {
        output: output.to_path_buf(),
        sections: assembly.document.sections().len(),
        skipped: assembly.skipped().map(Path::to_path_buf).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn toc_level_bounds() {
        assert_eq!(TocLevel::new(0), None);
        assert_eq!(TocLevel::new(7), None);
        assert_eq!(TocLevel::new(3).map(TocLevel::get), Some(3));
        assert_eq!(TocLevel::default().get(), 6);
    }

    #[test]
    fn sections_follow_input_order() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            write(&dir, "b.md", "bee"),
            write(&dir, "a.md", "ay"),
            write(&dir, "c.md", "sea"),
        ];

        let assembly = assemble(&inputs, &RenderOptions::default());
        let titles: Vec<_> = assembly
            .document
            .sections()
            .iter()
            .map(|section| section.title.as_str())
            .collect();
        assert_eq!(titles, ["b", "a", "c"]);
        assert_eq!(assembly.outcomes.len(), 3);
    }

    #[test]
    fn missing_input_is_skipped() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.md");
        let real = write(&dir, "real.md", "content");

        let assembly = assemble(&[missing.clone(), real], &RenderOptions::default());
        assert_eq!(assembly.document.sections().len(), 1);
        assert_eq!(assembly.document.sections()[0].title, "real");
        assert_eq!(assembly.skipped().collect::<Vec<_>>(), [missing.as_path()]);
    }

    #[test]
    fn missing_css_leaves_document_unstyled() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "a.md", "text");
        let options = RenderOptions {
            css: Some(dir.path().join("missing.css")),
            ..RenderOptions::default()
        };

        let assembly = assemble(&[input], &options);
        assert!(assembly.document.stylesheet().is_none());
        assert_eq!(assembly.document.sections().len(), 1);
    }

    #[test]
    fn toc_entries_respect_level() {
        let mut document = Document::new(TocLevel::new(2).unwrap(), false, None);
        document.push(Section::new("design", "## Overview\n\n### Detail\n"));
        document.push(Section::new("tasks", "- [ ] one\n"));

        let entries = document.toc_entries();
        let titles: Vec<_> = entries
            .iter()
            .map(|entry| (entry.level, entry.title.as_str()))
            .collect();
        assert_eq!(titles, [(1, "design"), (2, "Overview"), (1, "tasks")]);
    }

    #[test]
    fn markup_carries_metadata_and_css() {
        let mut document = Document::new(TocLevel::default(), false, Some("h1 { color: #c00 }"));
        document.push(Section::new("a", "text"));

        let typst = document.to_typst();
        assert!(typst.contains(
            "#set document(title: \"Combined Markdown Document\", author: \"Markdown to PDF CLI\")"
        ));
        assert!(typst.contains("#show heading.where(level: 1): set text(fill: rgb(\"#c00\"))"));
        assert!(typst.contains("= a\n"));
    }

    #[test]
    fn stylesheet_without_usable_rules_is_empty() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "a.md", "text");
        let css = write(&dir, "style.css", "div.note { color: red }");
        let options = RenderOptions {
            css: Some(css),
            ..RenderOptions::default()
        };

        let assembly = assemble(&[input], &options);
        assert!(assembly.document.stylesheet().is_some_and(Stylesheet::is_empty));
    }

    fn render_one(markdown: &str, css: Option<&str>) -> Result<Vec<u8>> {
        let mut document = Document::new(TocLevel::default(), false, css);
        document.push(Section::new("notes", markdown));
        document.render()
    }

    #[test]
    fn emphasis_next_to_letters_renders() {
        for markdown in [
            "**API**s are listed",
            "*foo*bar",
            "foo**bar**",
            "un**believe**able",
            "| **Key**s | Value |\n|---|---|\n| a_b | *x*y |",
        ] {
            let pdf = render_one(markdown, None);
            assert!(pdf.is_ok(), "{markdown:?}: {:?}", pdf.err());
        }
    }

    #[test]
    fn nested_blocks_in_task_list_render() {
        let markdown = "- [ ] Build\n\n  ```sh\n  cargo build\n  ```\n\n  > note  \n  > second line\n- [x] Ship\n  - sub *task*s\n";
        let pdf = render_one(markdown, None);
        assert!(pdf.is_ok(), "{:?}", pdf.err());
    }

    #[test]
    fn uppercase_css_units_render() {
        let css = "body { font-size: 12PT; line-height: 18PX } @page { margin: 2CM }";
        let document = Document::new(TocLevel::default(), false, Some(css));
        let typst = document.to_typst();
        assert!(typst.contains("size: 12pt"), "{typst}");
        assert!(typst.contains("margin: 2cm"), "{typst}");

        let pdf = render_one("Body text", Some(css));
        assert!(pdf.is_ok(), "{:?}", pdf.err());
    }

    #[test]
    fn invalid_css_values_are_dropped_not_fatal() {
        let css = "body { font-size: -4pt; color: #zzz } h1 { font-size: 0 } @page { margin: -1in }";
        let pdf = render_one("# Title\n\ntext", Some(css));
        assert!(pdf.is_ok(), "{:?}", pdf.err());
    }

    #[test]
    fn create_pdf_writes_file() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            write(&dir, "a.md", "# Alpha\n\nFirst."),
            write(&dir, "b.md", "Second with `code`."),
        ];
        let output = dir.path().join("out.pdf");

        let report = create_pdf(&inputs, &output, &RenderOptions::default()).unwrap();
        assert_eq!(report.sections, 2);
        assert!(report.skipped.is_empty());
        assert!(fs::read(&output).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn create_pdf_with_no_sections_still_writes() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("empty.pdf");

        let report = create_pdf(
            &[dir.path().join("gone.md")],
            &output,
            &RenderOptions::default(),
        )
        .unwrap();
        assert_eq!(report.sections, 0);
        assert_eq!(report.skipped.len(), 1);
        assert!(output.exists());
    }

    #[test]
    fn create_pdf_overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "a.md", "text");
        let output = write(&dir, "out.pdf", "stale");

        create_pdf(&[input], &output, &RenderOptions::default()).unwrap();
        assert!(fs::read(&output).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn save_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "a.md", "text");
        let output = dir.path().join("no_such_dir").join("out.pdf");

        let err = create_pdf(&[input], &output, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }

    #[test]
    fn optimized_output_is_still_a_pdf() {
        let dir = TempDir::new().unwrap();
        let input = write(&dir, "a.md", "# Head\n\nBody");
        let output = dir.path().join("small.pdf");
        let options = RenderOptions {
            optimize: true,
            ..RenderOptions::default()
        };

        create_pdf(&[input], &output, &options).unwrap();
        assert!(fs::read(&output).unwrap().starts_with(b"%PDF"));
    }
}
