// src/utils/selection.rs: picks the best organelle assembler output per sample and target

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use glob::Pattern;
use log::{debug, info};

use crate::config::defs::{AssemblyTarget, Provenance, RESULT_PATTERNS};
use crate::utils::file::{list_matching, list_subdirs};


/// An assembler output file tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResultFile {
    pub path: PathBuf,
    pub sample: String,
    pub target: AssemblyTarget,
    pub provenance: Provenance,
}

/// (sample, target) -> chosen files. Every sample directory has an entry for every target.
pub type Selection = BTreeMap<(String, AssemblyTarget), Vec<ResultFile>>;

/// Compiled glob for a (target, provenance) entry of the result pattern table.
pub fn result_pattern(target: AssemblyTarget, provenance: Provenance) -> Result<Pattern> {
    let glob = RESULT_PATTERNS
        .get(&(target, provenance))
        .ok_or_else(|| anyhow!("No result pattern for {:?}/{:?}", target, provenance))?;
    Ok(Pattern::new(glob)?)
}

/// Applies the two-tier fallback inside one sample directory for one target:
/// circularized files if any exist, otherwise raw contigs (possibly none).
pub fn select_for_target(sample_dir: &Path, sample: &str, target: AssemblyTarget) -> Result<Vec<ResultFile>> {
    for provenance in [Provenance::Circularized, Provenance::RawContig] {
        let pattern = result_pattern(target, provenance)?;
        let files = list_matching(sample_dir, &[&pattern])?;
        if !files.is_empty() {
            return Ok(files
                .into_iter()
                .map(|path| ResultFile {
                    path,
                    sample: sample.to_string(),
                    target,
                    provenance,
                })
                .collect());
        }
    }
    Ok(Vec::new())
}

/// Walks every per-sample subdirectory of an organelle assembler output tree.
///
/// # Arguments
///
/// * `output_tree` - Directory with one subdirectory per sample.
///
/// # Returns
/// Selection with an entry for each (sample, target), independent per target.
pub fn select(output_tree: &Path) -> Result<Selection> {
    let mut selection = Selection::new();
    for sample_dir in list_subdirs(output_tree)? {
        let sample = sample_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Invalid sample directory {}", sample_dir.display()))?;

        for target in AssemblyTarget::ALL {
            let files = select_for_target(&sample_dir, &sample, target)?;
            match files.first().map(|f| f.provenance) {
                Some(provenance) => debug!("{} {}: {} {:?} file(s)", sample, target, files.len(), provenance),
                None => info!("{} {}: no circularized or contig files", sample, target),
            }
            selection.insert((sample.clone(), target), files);
        }
    }
    Ok(selection)
}

/// All selected files of one target, in sample order.
pub fn files_for_target(selection: &Selection, target: AssemblyTarget) -> Vec<ResultFile> {
    selection
        .iter()
        .filter(|((_, t), _)| *t == target)
        .flat_map(|(_, files)| files.iter().cloned())
        .collect()
}
