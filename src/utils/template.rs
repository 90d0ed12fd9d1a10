// src/utils/template.rs: per-run configuration documents for the organelle assembler

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::debug;
use tempfile::NamedTempFile;

use crate::config::defs::{AssemblyTarget, NovoplastyParams};
use crate::utils::discovery::Sample;

const KEY_WIDTH: usize = 22;

pub const PROJECT_NAME_KEY: &str = "Project name";
pub const TYPE_KEY: &str = "Type";
pub const GENOME_RANGE_KEY: &str = "Genome Range";
pub const KMER_KEY: &str = "K-mer";
pub const SEED_INPUT_KEY: &str = "Seed Input";
pub const READ_LENGTH_KEY: &str = "Read Length";
pub const FORWARD_READS_KEY: &str = "Forward reads";
pub const REVERSE_READS_KEY: &str = "Reverse reads";
pub const OUTPUT_PATH_KEY: &str = "Output path";

/// Keys emptied on every render so values from a previous target never leak into the next.
pub const CLEARED_KEYS: &[&str] = &["Reference sequence", "Chloroplast sequence", "Insert size"];


/// Materialized settings for one (sample, target) assembler run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProfile {
    pub project_name: String,
    pub target: AssemblyTarget,
    pub genome_range: String,
    pub kmer: u32,
    pub seed_file: PathBuf,
    pub read_length: u32,
    pub forward: PathBuf,
    pub reverse: PathBuf,
    pub output_path: PathBuf,
}

impl ConfigProfile {
    pub fn new(sample: &Sample, target: AssemblyTarget, params: &NovoplastyParams, output_path: &Path) -> Self {
        Self {
            project_name: format!("{}{}", sample.id, target.project_suffix()),
            target,
            genome_range: target.genome_range().to_string(),
            kmer: params.kmer,
            seed_file: params.seed_file(target).clone(),
            read_length: params.read_length,
            forward: sample.forward.clone(),
            reverse: sample.reverse.clone(),
            output_path: output_path.to_path_buf(),
        }
    }

    fn value_for(&self, key: &str) -> Option<String> {
        let value = match key {
            PROJECT_NAME_KEY => self.project_name.clone(),
            TYPE_KEY => self.target.assembler_type().to_string(),
            GENOME_RANGE_KEY => self.genome_range.clone(),
            KMER_KEY => self.kmer.to_string(),
            SEED_INPUT_KEY => self.seed_file.to_string_lossy().into_owned(),
            READ_LENGTH_KEY => self.read_length.to_string(),
            FORWARD_READS_KEY => self.forward.to_string_lossy().into_owned(),
            REVERSE_READS_KEY => self.reverse.to_string_lossy().into_owned(),
            // The assembler concatenates this with file names, so keep the trailing separator.
            OUTPUT_PATH_KEY => format!("{}/", self.output_path.to_string_lossy().trim_end_matches('/')),
            _ => return None,
        };
        Some(value)
    }
}

/// Key of a `key = value` line, trimmed. None for lines without `=`.
fn line_key(line: &str) -> Option<&str> {
    line.split_once('=').map(|(key, _)| key.trim())
}

/// Rewrites a template document for `profile`. Recognized keys get a fixed-width
/// `key = value` line, cleared keys become `key =`, everything else is copied as is.
///
/// # Arguments
///
/// * `template` - Full text of the current document.
/// * `profile` - Values for this (sample, target).
///
/// # Returns
/// The new document.
pub fn render(template: &str, profile: &ConfigProfile) -> String {
    let mut out = String::with_capacity(template.len());
    for line in template.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };

        match line_key(body) {
            Some(key) if CLEARED_KEYS.contains(&key) => {
                out.push_str(key);
                out.push_str(" =");
                out.push_str(ending);
            }
            Some(key) => match profile.value_for(key) {
                Some(value) => {
                    out.push_str(&format!("{:<width$}= {}", key, value, width = KEY_WIDTH));
                    out.push_str(ending);
                }
                None => out.push_str(line),
            },
            None => out.push_str(line),
        }
    }
    out
}

/// Reads the whole document at `path`, renders it and atomically replaces the file.
/// Callers must not render the same path concurrently.
pub fn render_to_path(path: &Path, profile: &ConfigProfile) -> Result<()> {
    let current = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
    let rendered = render(&current, profile);

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| anyhow!("Failed to replace config {}: {}", path.display(), e))?;

    debug!("Rendered {} for project {}", path.display(), profile.project_name);
    Ok(())
}
