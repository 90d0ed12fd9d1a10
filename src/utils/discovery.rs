// src/utils/discovery.rs: pairs forward/reverse read files into samples

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fxhash::FxHashSet;
use log::debug;

use crate::config::defs::{RAW_R1_SUFFIX, RAW_R2_SUFFIX, TRIMMED_R1_SUFFIX, TRIMMED_R2_SUFFIX};


/// Logical paired-end sample. Identity is the (forward, reverse) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sample {
    pub id: String,
    pub forward: PathBuf,
    pub reverse: PathBuf,
}

/// File name convention of a read set: the suffix marking read 1 and its read 2 counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadNaming {
    pub forward_suffix: String,
    pub reverse_suffix: String,
}

impl ReadNaming {
    pub fn new(forward_suffix: &str, reverse_suffix: &str) -> Self {
        Self {
            forward_suffix: forward_suffix.to_string(),
            reverse_suffix: reverse_suffix.to_string(),
        }
    }

    /// Sequencer output, e.g. `S1_L001_R1_001.fastq.gz`.
    pub fn raw() -> Self {
        Self::new(RAW_R1_SUFFIX, RAW_R2_SUFFIX)
    }

    /// Trimmer output, e.g. `S1_L001_paired_R1.fastq.gz`.
    pub fn trimmed() -> Self {
        Self::new(TRIMMED_R1_SUFFIX, TRIMMED_R2_SUFFIX)
    }
}

/// Scans `dir` for forward read files and pairs each with its expected reverse file.
/// The reverse file is constructed, not checked for existence.
///
/// # Arguments
///
/// * `dir` - Directory holding the read files.
/// * `naming` - Forward/reverse suffix convention.
///
/// # Returns
/// Samples sorted by id, each (forward, reverse) pair at most once.
pub fn discover(dir: &Path, naming: &ReadNaming) -> io::Result<Vec<Sample>> {
    let mut seen: FxHashSet<(PathBuf, PathBuf)> = FxHashSet::default();
    let mut samples = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        let Some(id) = name.strip_suffix(naming.forward_suffix.as_str()) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }

        let forward = dir.join(name.as_ref());
        let reverse = dir.join(format!("{}{}", id, naming.reverse_suffix));
        if seen.insert((forward.clone(), reverse.clone())) {
            samples.push(Sample {
                id: id.to_string(),
                forward,
                reverse,
            });
        }
    }

    samples.sort();
    debug!("Discovered {} samples in {}", samples.len(), dir.display());
    Ok(samples)
}
