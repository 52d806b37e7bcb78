//! Zero-argument mode: offer to render every spec file found on disk.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::cli::{Job, absolute, render_job};
use crate::config::SpecsConfig;
use crate::document::RenderOptions;

const PROMPT: &str = "Create PDF from these files? (y/n): ";

/// Source of answers to interactive questions.
pub trait LineSource {
    /// Show `prompt` and return the next line of input, empty at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// Reads answers from the terminal.
pub struct StdinLines;

impl LineSource for StdinLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Canned answers, handed out in order.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// No spec directory or no Markdown in it; fall back to argument parsing.
    NoSpecs,
    /// The user declined; the manual command was printed.
    Declined,
    /// The user confirmed; `written` tells whether the PDF was saved.
    Rendered { written: bool },
}

/// Markdown files directly inside `dir`, sorted, hidden files excluded.
pub fn discover_specs(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy())).join("*.md");
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let entries = match glob::glob_with(&pattern.to_string_lossy(), options) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot search {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Could not read {}", e.path().display());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

/// Only a lone `y` or `Y` confirms.
pub fn is_confirmation(answer: &str) -> bool {
    answer
        .trim_end_matches(['\n', '\r'])
        .eq_ignore_ascii_case("y")
}

/// Command line equivalent to confirming the prompt.
pub fn manual_command(program: &str, files: &[PathBuf], output: &Path) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(files.iter().map(|file| shell_word(&file.display().to_string())));
    parts.push("-o".to_string());
    parts.push(shell_word(&output.display().to_string()));
    parts.join(" ")
}

fn shell_word(word: &str) -> String {
    if word.is_empty() || word.chars().any(|c| c.is_whitespace() || "'\"$`\\".contains(c)) {
        format!("'{}'", word.replace('\'', "'\\''"))
    } else {
        word.to_string()
    }
}

/// List the spec files, ask for confirmation, then render or print the manual command.
pub fn run(
    specs: &SpecsConfig,
    program: &str,
    input: &mut impl LineSource,
    out: &mut impl Write,
) -> io::Result<Outcome> {
    let found = discover_specs(&specs.dir);
    if found.is_empty() {
        return Ok(Outcome::NoSpecs);
    }

    writeln!(out, "Found the following spec files:")?;
    for file in &found {
        writeln!(out, "  - {}", file.display())?;
    }
    out.flush()?;

    let answer = input.read_line(PROMPT)?;
    let files: Vec<PathBuf> = found.iter().map(|file| absolute(file)).collect();

    if !is_confirmation(&answer) {
        writeln!(out, "To generate the PDF manually, run the following command:")?;
        writeln!(
            out,
            "{}",
            manual_command(program, &files, &specs.interactive_output)
        )?;
        return Ok(Outcome::Declined);
    }

    writeln!(out, "Generating {}...", specs.interactive_output.display())?;
    let job = Job {
        inputs: files,
        output: specs.interactive_output.clone(),
    };
    let written = render_job(&job, &RenderOptions::default(), out)?;
    if written {
        writeln!(out, "Done.")?;
    }
    Ok(Outcome::Rendered { written })
}
