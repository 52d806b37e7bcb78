//! Reading stylesheets and Markdown sections from disk.
//!
//! Both loaders are lenient: a file that cannot be read is reported and
//! left out, and the caller carries on with whatever did load.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One Markdown file turned into a titled chunk of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    /// Prefix `markdown` with a top-level heading carrying `title`.
    ///
    /// The heading is always added, even when the text already starts with one.
    pub fn new(title: impl Into<String>, markdown: &str) -> Self {
        let title = title.into();
        let content = format!("# {title}\n\n{markdown}");
        Self { title, content }
    }
}

/// What happened to a single input file.
#[derive(Debug)]
pub enum SectionOutcome {
    Added(Section),
    Skipped {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl SectionOutcome {
    pub fn section(&self) -> Option<&Section> {
        match self {
            SectionOutcome::Added(section) => Some(section),
            SectionOutcome::Skipped { .. } => None,
        }
    }
}

/// Title derived from a file name: the base name minus its last extension.
pub fn section_title(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Read one Markdown file into a section, or explain why it was skipped.
pub fn build_section(path: &Path) -> SectionOutcome {
    match fs::read_to_string(path) {
        Ok(markdown) => {
            let section = Section::new(section_title(path), &markdown);
            log::info!("Added '{}' as a section.", path.display());
            SectionOutcome::Added(section)
        }
        Err(error) => {
            if error.kind() == ErrorKind::NotFound {
                log::warn!(
                    "Markdown file '{}' not found. Skipping this file.",
                    path.display()
                );
            } else {
                log::warn!(
                    "Error processing '{}': {error}. Skipping this file.",
                    path.display()
                );
            }
            SectionOutcome::Skipped {
                path: path.to_path_buf(),
                error,
            }
        }
    }
}

/// Read the custom stylesheet, if one was requested and it can be read.
pub fn load_css(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match fs::read_to_string(path) {
        Ok(css) => {
            log::info!("Using custom CSS from: {}", path.display());
            Some(css)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {
            log::warn!(
                "Custom CSS file '{}' not found. Proceeding without custom CSS.",
                path.display()
            );
            None
        }
        Err(error) => {
            log::warn!(
                "Error reading CSS file '{}': {error}. Proceeding without custom CSS.",
                path.display()
            );
            None
        }
    }
}
