// src/utils/sanitize.rs: makes assembler FASTA output acceptable to the assessment tools

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use fxhash::{FxHashMap, FxHashSet};

use crate::config::defs::{HEADER_MARKER, PLACEHOLDER_BASE, REPLACEMENT_BASE};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Placeholder bases only.
    Simple,
    /// Placeholder bases plus `(N)` suffixes on repeated headers.
    Disambiguate,
}

/// Splits off the line terminator so suffixes can go before it.
fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Sanitizes the text of one sequence file. Header counts start fresh for every call.
/// In Disambiguate mode no header line is emitted twice: a repeat takes the next
/// `(N)` not already present, so `>A`, `>A(2)`, `>A` becomes `>A`, `>A(2)`, `>A(3)`.
///
/// # Arguments
///
/// * `content` - Whole file content.
/// * `mode` - Simple or Disambiguate.
///
/// # Returns
/// The sanitized text, same line order and terminators.
pub fn sanitize(content: &str, mode: SanitizeMode) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut emitted: FxHashSet<String> = FxHashSet::default();

    for line in content.split_inclusive('\n') {
        let line = line.replace(PLACEHOLDER_BASE, &REPLACEMENT_BASE.to_string());
        if mode == SanitizeMode::Disambiguate && line.starts_with(HEADER_MARKER) {
            let (header, ending) = split_ending(&line);
            let count = seen.entry(header.to_string()).or_insert(0);
            *count += 1;
            let mut name = if *count == 1 {
                header.to_string()
            } else {
                format!("{}({})", header, count)
            };
            while emitted.contains(&name) {
                *count += 1;
                name = format!("{}({})", header, count);
            }
            out.push_str(&name);
            out.push_str(ending);
            emitted.insert(name);
        } else {
            out.push_str(&line);
        }
    }
    out
}

/// Writes a sanitized copy of `src` to `dst`.
pub fn sanitize_file(src: &Path, dst: &Path, mode: SanitizeMode) -> Result<()> {
    let content = fs::read_to_string(src)
        .map_err(|e| anyhow!("Failed to read {}: {}", src.display(), e))?;
    fs::write(dst, sanitize(&content, mode))
        .map_err(|e| anyhow!("Failed to write {}: {}", dst.display(), e))?;
    Ok(())
}
