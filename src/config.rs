use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub specs: SpecsConfig,
}

/// Where the spec files live and where their PDFs go.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(from = "SpecsOverrides")]
pub struct SpecsConfig {
    /// Directory searched by the named flags and by interactive discovery.
    pub dir: PathBuf,
    /// Output written when the interactive prompt is confirmed.
    pub interactive_output: PathBuf,
    pub todo: SpecFile,
    pub requirements: SpecFile,
    pub design: SpecFile,
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".kiro").join("specs"),
            interactive_output: PathBuf::from("theplan.pdf"),
            todo: SpecFile::new("tasks.md", "kiro_todo.pdf"),
            requirements: SpecFile::new("requirements.md", "kiro_requirements.pdf"),
            design: SpecFile::new("design.md", "kiro_design.pdf"),
        }
    }
}

/// A single well-known spec file and the PDF it renders to.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    pub file: String,
    pub output: PathBuf,
}

// On-disk shape of `[specs]`; every key is optional and falls back to the
// default of the entry it belongs to.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SpecsOverrides {
    dir: Option<PathBuf>,
    interactive_output: Option<PathBuf>,
    todo: SpecFileOverrides,
    requirements: SpecFileOverrides,
    design: SpecFileOverrides,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SpecFileOverrides {
    file: Option<String>,
    output: Option<PathBuf>,
}

impl SpecFileOverrides {
    fn apply(self, spec: &mut SpecFile) {
        if let Some(file) = self.file {
            spec.file = file;
        }
        if let Some(output) = self.output {
            spec.output = output;
        }
    }
}

impl From<SpecsOverrides> for SpecsConfig {
    fn from(overrides: SpecsOverrides) -> Self {
        let mut specs = SpecsConfig::default();
        if let Some(dir) = overrides.dir {
            specs.dir = dir;
        }
        if let Some(output) = overrides.interactive_output {
            specs.interactive_output = output;
        }
        overrides.todo.apply(&mut specs.todo);
        overrides.requirements.apply(&mut specs.requirements);
        overrides.design.apply(&mut specs.design);
        specs
    }
}

impl SpecFile {
    pub fn new(file: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            output: output.into(),
        }
    }
}

impl SpecsConfig {
    /// Path of a spec file inside the spec directory.
    pub fn source_path(&self, spec: &SpecFile) -> PathBuf {
        self.dir.join(&spec.file)
    }
}

impl Config {
    /// Load config from a TOML file. Missing tables and keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
