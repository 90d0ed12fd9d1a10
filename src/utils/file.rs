use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::config::defs::PipelineError;


/// Makes `path` absolute relative to `cwd`. Absolute paths are returned untouched.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Creates a directory and its parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Fails with MissingInput when a stage's input directory does not exist.
pub fn require_dir(path: &Path) -> Result<(), PipelineError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput(format!("directory {} not found", path.display())))
    }
}

/// Immediate subdirectories of `dir`, sorted by path. Symlinks are followed.
pub fn list_subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Files directly inside `dir` whose file name matches any of `patterns`,
/// sorted by path. Symlinks to files count (ABySS links `<name>-contigs.fa`).
pub fn list_matching(dir: &Path, patterns: &[&Pattern]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !patterns.iter().any(|p| p.matches(&name)) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Recursively finds files under `dir` whose file name matches `file_pattern`.
///
/// # Arguments
///
/// * `dir` - Root of the search.
/// * `file_pattern` - Glob applied to the file name only, e.g. `short_summary.*.txt`.
///
/// # Returns
/// Matching paths, sorted.
pub fn find_recursive(dir: &Path, file_pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let root = Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/**/{}", root, file_pattern);
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut found = Vec::new();
    for entry in glob::glob_with(&full, options)? {
        let path = entry?;
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Last extension of a file name, without the dot. `Contigs_1_x.fasta` -> `fasta`.
pub fn last_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned())
}

/// File name of the directory holding `path`, i.e. the sample folder of an assembler output.
pub fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
}

/// Builds `<stem>.<ext>` (or just `<stem>` when there is no extension) inside `dir`.
pub fn staged_name(dir: &Path, stem: &str, ext: Option<&str>) -> PathBuf {
    match ext {
        Some(ext) => dir.join(format!("{}.{}", stem, ext)),
        None => dir.join(stem),
    }
}
