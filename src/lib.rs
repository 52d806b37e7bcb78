//! Combine Markdown files into one PDF, one outline entry per file.
//!
//! Each file becomes a [`Section`] headed by its file name. Sections are
//! gathered into a [`Document`], translated to Typst markup and compiled to
//! PDF with the fonts embedded in Typst.

mod block;
pub mod cli;
pub mod config;
mod css;
mod document;
mod error;
pub mod interactive;
mod loader;
mod parser;
mod typst;

pub use block::{Block, List, ListItem, Span};
pub use config::{Config, SpecFile, SpecsConfig};
pub use css::Stylesheet;
pub use document::{
    Assembly, DOCUMENT_AUTHOR, DOCUMENT_TITLE, Document, RenderOptions, Report, TocEntry, TocLevel,
    assemble, create_pdf,
};
pub use error::{Error, Result};
pub use loader::{Section, SectionOutcome, build_section, load_css, section_title};

use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Compile Typst markup to PDF bytes.
fn compile_pdf(markup: String, optimize: bool) -> Result<Vec<u8>> {
    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(false);

    let engine = TypstEngine::builder()
        .main_file(markup)
        .search_fonts_with(font_options)
        .build();

    let compiled = engine.compile();
    let doc: PagedDocument = compiled
        .output
        .map_err(|e| Error::Compilation(format!("{e:?}")))?;
    for warning in &compiled.warnings {
        log::debug!("typst: {}", warning.message);
    }

    // Structure tags are what optimization drops
    let options = PdfOptions {
        tagged: !optimize,
        ..PdfOptions::default()
    };
    typst_pdf::pdf(&doc, &options).map_err(|e| Error::Pdf(format!("{e:?}")))
}
