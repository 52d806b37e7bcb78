//! Command-line surface: argument definitions and the explicit modes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};

use crate::config::{SpecFile, SpecsConfig};
use crate::document::{RenderOptions, TocLevel, create_pdf};

#[derive(Parser, Debug)]
#[command(name = "kiro2pdf")]
#[command(
    about = "Convert one or more Markdown files to a single PDF, with each input file appearing as a separate section in the PDF's Table of Contents."
)]
pub struct Cli {
    /// One or more paths to input Markdown files (.md)
    pub input_files: Vec<PathBuf>,

    /// Generate PDF for the 'tasks.md' spec file
    #[arg(long)]
    pub todo: bool,

    /// Generate PDF for the 'requirements.md' spec file
    #[arg(long)]
    pub requirements: bool,

    /// Generate PDF for the 'design.md' spec file
    #[arg(long)]
    pub design: bool,

    /// The path for the output PDF file (e.g., output.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum heading level to include in the Table of Contents (1=H1 only, 6=H1-H6)
    #[arg(
        short,
        long,
        default_value_t = 6,
        value_name = "1-6",
        value_parser = clap::value_parser!(u8).range(1..=6)
    )]
    pub toc_level: u8,

    /// Optimize the PDF file size for smaller output
    #[arg(short = 'z', long)]
    pub optimize: bool,

    /// Optional path to a CSS file for custom styling of the PDF content
    #[arg(short, long)]
    pub css: Option<PathBuf>,

    /// TOML file overriding the spec directory and output file names
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// One PDF to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// What an explicit invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Named spec flags; positional files are ignored.
    Specs(Vec<Job>),
    Files(Job),
    Help,
    MissingOutput,
}

impl Cli {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            toc_level: TocLevel::new(self.toc_level).unwrap_or_default(),
            optimize: self.optimize,
            css: self.css.clone(),
        }
    }

    pub fn invocation(&self, specs: &SpecsConfig) -> Invocation {
        let requested = [
            (self.todo, &specs.todo),
            (self.requirements, &specs.requirements),
            (self.design, &specs.design),
        ];
        let jobs: Vec<Job> = requested
            .into_iter()
            .filter(|(set, _)| *set)
            .map(|(_, spec)| spec_job(specs, spec))
            .collect();

        if !jobs.is_empty() {
            if !self.input_files.is_empty() {
                log::debug!("named spec flags given, ignoring positional input files");
            }
            return Invocation::Specs(jobs);
        }

        if self.input_files.is_empty() {
            return Invocation::Help;
        }
        match &self.output {
            Some(output) => Invocation::Files(Job {
                inputs: self.input_files.clone(),
                output: output.clone(),
            }),
            None => Invocation::MissingOutput,
        }
    }
}

fn spec_job(specs: &SpecsConfig, spec: &SpecFile) -> Job {
    Job {
        inputs: vec![absolute(&specs.source_path(spec))],
        output: spec.output.clone(),
    }
}

/// Absolute form of `path`, or `path` itself if the working directory is unknown.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Run an explicit (non-interactive) invocation.
pub fn run(cli: &Cli, specs: &SpecsConfig, out: &mut impl Write) -> io::Result<()> {
    let options = cli.render_options();

    match cli.invocation(specs) {
        Invocation::Specs(jobs) => {
            for job in &jobs {
                let sources: Vec<_> = job.inputs.iter().map(|p| p.display().to_string()).collect();
                writeln!(
                    out,
                    "Generating {} from {}...",
                    job.output.display(),
                    sources.join(", ")
                )?;
                render_job(job, &options, out)?;
            }
        }
        Invocation::Files(job) => {
            render_job(&job, &options, out)?;
        }
        Invocation::Help => write_help(out)?,
        Invocation::MissingOutput => {
            eprintln!("Error: The --output argument is required when providing input files.");
            write_help(out)?;
        }
    }

    Ok(())
}

/// Render one job, reporting the result. Returns whether the PDF was written.
pub fn render_job(job: &Job, options: &RenderOptions, out: &mut impl Write) -> io::Result<bool> {
    match create_pdf(&job.inputs, &job.output, options) {
        Ok(report) => {
            writeln!(out, "\nSuccessfully created PDF: {}", report.output.display())?;
            Ok(true)
        }
        Err(e) => {
            log::error!("Error saving PDF to '{}': {e}", job.output.display());
            Ok(false)
        }
    }
}

pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    write!(out, "{}", Cli::command().render_help())
}
