// src/utils/aggregate.rs: runs the assessment tools over assembler output trees
//
// Two shapes. Flat: one invocation over everything found in the per-sample
// folders of a tree. Split: one invocation per organelle target, fed from a
// Selection and sanitized into a staging folder first.
//
// A file or sample that cannot be read, copied or sanitized is recorded on the
// StageReport and left out; only a missing or unreadable tree stops the stage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use fxhash::{FxHashMap, FxHashSet};
use glob::Pattern;
use log::{debug, info, warn};

use crate::config::defs::{
    AssemblyTarget, BuscoParams, PipelineError, RunConfig, CONTIGS_PATTERN, RESULT_DIR,
    SCAFFOLD_PATTERNS, STAGING_DIR, SUMMARY_PATTERN,
};
use crate::utils::command::{busco, plot, quast};
use crate::utils::file::{
    ensure_dir, find_recursive, last_extension, list_matching, list_subdirs, parent_name, require_dir, staged_name,
};
use crate::utils::runner::{CommandRunner, StageReport};
use crate::utils::sanitize::{sanitize_file, SanitizeMode};
use crate::utils::selection::{files_for_target, Selection};


/// Assessment tool driven by the split shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Assembly statistics (QUAST).
    Statistics,
    /// Gene-set completeness (BUSCO) plus summary plot.
    Completeness,
}

impl Assessment {
    pub fn sanitize_mode(&self) -> SanitizeMode {
        match self {
            Assessment::Statistics => SanitizeMode::Simple,
            Assessment::Completeness => SanitizeMode::Disambiguate,
        }
    }
}

/// A completeness summary copied into a results directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryArtifact {
    pub path: PathBuf,
    pub target: Option<AssemblyTarget>,
}

/// Outcome of a split run: totals plus elapsed seconds per target.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SplitReport {
    pub report: StageReport,
    pub per_target: BTreeMap<AssemblyTarget, f64>,
}


fn compile(glob: &str) -> Result<Pattern, PipelineError> {
    Pattern::new(glob).map_err(|e| PipelineError::Other(anyhow!("Bad pattern {}: {}", glob, e)))
}

/// Files matching any of `globs` in each immediate subdirectory of `tree`,
/// paired with that subdirectory's name. An unreadable sample folder is
/// recorded on `report` and skipped.
fn collect_per_sample(
    tree: &Path,
    globs: &[&str],
    report: &mut StageReport,
) -> Result<Vec<(String, PathBuf)>, PipelineError> {
    require_dir(tree)?;
    let patterns = globs.iter().map(|g| compile(g)).collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&Pattern> = patterns.iter().collect();

    let mut found = Vec::new();
    for sample_dir in list_subdirs(tree)? {
        let files = match list_matching(&sample_dir, &refs) {
            Ok(files) => files,
            Err(e) => {
                report.file_error(&sample_dir, e);
                continue;
            }
        };
        for file in files {
            let sample = parent_name(&file).unwrap_or_default();
            found.push((sample, file));
        }
    }
    Ok(found)
}

/// Destination in `staging` for every input: `<sample>.<ext>`, or
/// `<sample>_<n>.<ext>` when the sample contributes more than one file.
/// A name already handed out gets a further `_<k>` (k from 2), so no two
/// inputs share a destination.
pub fn staging_plan(inputs: &[(String, PathBuf)], staging: &Path) -> Vec<(PathBuf, PathBuf)> {
    let mut totals: FxHashMap<&str, usize> = FxHashMap::default();
    for (sample, _) in inputs {
        *totals.entry(sample.as_str()).or_insert(0) += 1;
    }

    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    let mut taken: FxHashSet<PathBuf> = FxHashSet::default();
    let mut plan = Vec::with_capacity(inputs.len());
    for (sample, src) in inputs {
        let ext = last_extension(src);
        let stem = if totals.get(sample.as_str()).copied().unwrap_or(1) > 1 {
            let n = seen.entry(sample.as_str()).or_insert(0);
            *n += 1;
            format!("{}_{}", sample, n)
        } else {
            sample.clone()
        };

        let mut dst = staged_name(staging, &stem, ext.as_deref());
        let mut k = 1;
        while taken.contains(&dst) {
            k += 1;
            dst = staged_name(staging, &format!("{}_{}", stem, k), ext.as_deref());
        }
        taken.insert(dst.clone());
        plan.push((src.clone(), dst));
    }
    plan
}

fn remove_staging(staging: &Path) {
    match fs::remove_dir_all(staging) {
        Ok(()) => debug!("Removed staging directory {}", staging.display()),
        Err(e) => warn!("Could not remove staging directory {}: {}", staging.display(), e),
    }
}

/// Target named in a summary file name, if exactly one tag shows up.
fn summary_target(file_name: &str) -> Option<AssemblyTarget> {
    let mut hits = AssemblyTarget::ALL
        .into_iter()
        .filter(|t| file_name.contains(t.tag()));
    match (hits.next(), hits.next()) {
        (Some(target), None) => Some(target),
        _ => None,
    }
}

/// Copies every `short_summary.*.txt` below `tree` into `dest`, skipping files
/// already inside `dest`. With `only`, summaries whose name does not carry that
/// target's tag are left behind.
///
/// # Arguments
///
/// * `tree` - Completeness tool output tree.
/// * `dest` - Results directory, created when missing.
/// * `only` - Optional target filter on the file name.
/// * `report` - Receives a FileError for every summary that fails to copy.
///
/// # Returns
/// Copied artifacts, in path order.
pub fn harvest_summaries(
    tree: &Path,
    dest: &Path,
    only: Option<AssemblyTarget>,
    report: &mut StageReport,
) -> Result<Vec<SummaryArtifact>, PipelineError> {
    ensure_dir(dest)?;
    let mut harvested = Vec::new();

    for path in find_recursive(tree, SUMMARY_PATTERN)? {
        if path.starts_with(dest) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let target = summary_target(&name);
        if let Some(wanted) = only {
            if !name.contains(wanted.tag()) {
                debug!("Skipping {} (no '{}' in name)", path.display(), wanted.tag());
                continue;
            }
        }

        let copied = dest.join(&name);
        if let Err(e) = fs::copy(&path, &copied) {
            report.file_error(&path, e);
            continue;
        }
        harvested.push(SummaryArtifact { path: copied, target });
    }

    info!("Collected {} summary file(s) into {}", harvested.len(), dest.display());
    Ok(harvested)
}

/// Statistics over a whole assembler tree in one invocation.
///
/// # Arguments
///
/// * `config` - Run configuration (tool path, threads).
/// * `runner` - Command runner.
/// * `tree` - Assembler output tree, one subdirectory per sample.
/// * `out_dir` - Tool output directory.
///
/// # Returns
/// StageReport; a tree without contigs yields a MissingInput diagnostic and no
/// invocation. A tree that does not exist is PipelineError::MissingInput.
pub async fn quast_flat(
    config: &RunConfig,
    runner: &CommandRunner,
    tree: &Path,
    out_dir: &Path,
) -> Result<StageReport, PipelineError> {
    let mut report = StageReport::default();
    let files: Vec<PathBuf> = collect_per_sample(tree, &[CONTIGS_PATTERN], &mut report)?
        .into_iter()
        .map(|(_, path)| path)
        .collect();

    if files.is_empty() {
        report.missing(format!("No files matching '{}' found under {}", CONTIGS_PATTERN, tree.display()));
        return Ok(report);
    }

    info!("Running statistics over {} contig file(s) from {}", files.len(), tree.display());
    ensure_dir(out_dir)?;
    let cmd = quast::arg_generator(&config.settings.tools.quast, &files, out_dir, config.threads);
    report.add_outcome(&runner.execute(&cmd).await);
    Ok(report)
}

/// Completeness over a whole assembler tree: stage, run once, harvest, plot.
pub async fn busco_flat(
    config: &RunConfig,
    runner: &CommandRunner,
    params: &BuscoParams,
    tree: &Path,
    out_dir: &Path,
) -> Result<StageReport, PipelineError> {
    let mut report = StageReport::default();
    let inputs = collect_per_sample(tree, SCAFFOLD_PATTERNS, &mut report)?;
    if inputs.is_empty() {
        report.missing(format!("No scaffold files found under {}", tree.display()));
        return Ok(report);
    }

    let staging = out_dir.join(STAGING_DIR);
    ensure_dir(&staging)?;
    let mut staged = 0;
    for (src, dst) in staging_plan(&inputs, &staging) {
        match fs::copy(&src, &dst) {
            Ok(_) => {
                debug!("Staged {} as {}", src.display(), dst.display());
                staged += 1;
            }
            Err(e) => report.file_error(&src, e),
        }
    }
    if staged == 0 {
        remove_staging(&staging);
        report.missing(format!("No scaffold files under {} could be staged", tree.display()));
        return Ok(report);
    }

    let tools = &config.settings.tools;
    let cmd = busco::arg_generator(&tools.busco, &staging, out_dir, &params.lineage_dataset, config.threads);
    report.add_outcome(&runner.execute(&cmd).await);
    remove_staging(&staging);

    let results = out_dir.join(RESULT_DIR);
    let summaries = harvest_summaries(out_dir, &results, None, &mut report)?;
    if summaries.is_empty() {
        report.missing(format!("No '{}' files produced under {}", SUMMARY_PATTERN, out_dir.display()));
        return Ok(report);
    }

    let cmd = plot::arg_generator(&tools.python, &params.plot_script, &results);
    report.add_outcome(&runner.execute(&cmd).await);
    Ok(report)
}

/// Sanitizes each planned input into staging. Returns the staged paths; a file
/// that fails is recorded and any partial copy removed.
fn stage_sanitized(plan: &[(PathBuf, PathBuf)], mode: SanitizeMode, report: &mut StageReport) -> Vec<PathBuf> {
    let mut staged = Vec::with_capacity(plan.len());
    for (src, dst) in plan {
        match sanitize_file(src, dst, mode) {
            Ok(()) => staged.push(dst.clone()),
            Err(e) => {
                report.file_error(src, e);
                if dst.exists() {
                    if let Err(e) = fs::remove_file(dst) {
                        warn!("Could not remove partial copy {}: {}", dst.display(), e);
                    }
                }
            }
        }
    }
    staged
}

/// Runs one assessment per organelle target over a Selection.
///
/// Each target gets `<out_dir>/<tag>` as tool output and `<out_dir>/<tag>/staging`
/// for the sanitized inputs. Completeness summaries land in `<out_dir>/result/<tag>`.
/// A target with nothing selected, or nothing that could be staged, is skipped
/// with a diagnostic and the next target still runs.
pub async fn split_by_target(
    config: &RunConfig,
    runner: &CommandRunner,
    selection: &Selection,
    assessment: Assessment,
    out_dir: &Path,
) -> Result<SplitReport, PipelineError> {
    let tools = &config.settings.tools;
    let busco_params = match assessment {
        Assessment::Completeness => Some(config.settings.busco.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfig("[busco] section is required for completeness".to_string())
        })?),
        Assessment::Statistics => None,
    };

    let mut split = SplitReport::default();
    for target in AssemblyTarget::ALL {
        let mut target_report = StageReport::default();
        let files = files_for_target(selection, target);
        if files.is_empty() {
            target_report.missing(format!("No {} assemblies selected, skipping {:?}", target, assessment));
            split.report.merge(target_report);
            continue;
        }

        let target_dir = out_dir.join(target.tag());
        let staging = target_dir.join(STAGING_DIR);
        if let Err(e) = ensure_dir(&staging) {
            target_report.file_error(&staging, e);
            split.report.merge(target_report);
            continue;
        }

        let inputs: Vec<(String, PathBuf)> = files.iter().map(|f| (f.sample.clone(), f.path.clone())).collect();
        let plan = staging_plan(&inputs, &staging);
        let staged = stage_sanitized(&plan, assessment.sanitize_mode(), &mut target_report);
        if staged.is_empty() {
            remove_staging(&staging);
            target_report.missing(format!("No {} file could be staged, skipping {:?}", target, assessment));
            split.report.merge(target_report);
            continue;
        }
        info!("Staged {} {} file(s) in {}", staged.len(), target, staging.display());

        let cmd = match busco_params {
            None => quast::arg_generator(&tools.quast, &staged, &target_dir, config.threads),
            Some(params) => busco::arg_generator(&tools.busco, &staging, &target_dir, &params.lineage_dataset, config.threads),
        };
        target_report.add_outcome(&runner.execute(&cmd).await);
        remove_staging(&staging);

        if let Some(params) = busco_params {
            let results = out_dir.join(RESULT_DIR).join(target.tag());
            match harvest_summaries(&target_dir, &results, None, &mut target_report) {
                Ok(summaries) if summaries.is_empty() => {
                    target_report.missing(format!("No {} summaries produced under {}", target, target_dir.display()));
                }
                Ok(_) => {
                    let cmd = plot::arg_generator(&tools.python, &params.plot_script, &results);
                    target_report.add_outcome(&runner.execute(&cmd).await);
                }
                Err(e) => target_report.file_error(&results, e),
            }
        }

        info!("{} {:?} finished in {:.2} seconds", target, assessment, target_report.elapsed);
        split.per_target.insert(target, target_report.elapsed);
        split.report.merge(target_report);
    }
    Ok(split)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defs::Provenance;
    use crate::config::defs::{Diagnostic, RunSettings};
    use crate::config::loader::build_run_config;
    use crate::utils::selection::ResultFile;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn result_file(path: PathBuf, sample: &str, target: AssemblyTarget, provenance: Provenance) -> ResultFile {
        ResultFile {
            path,
            sample: sample.to_string(),
            target,
            provenance,
        }
    }

    /// RunConfig whose statistics tool is a shell script appending its
    /// arguments to `calls`.
    fn stub_config(dir: &Path, calls: &Path) -> anyhow::Result<RunConfig> {
        let quast = dir.join("quast_stub");
        fs::write(&quast, format!("#!/bin/sh\necho \"$@\" >> '{}'\n", calls.display()))?;
        fs::set_permissions(&quast, fs::Permissions::from_mode(0o755))?;

        let text = format!(
            r#"
threads = 1
stages = ["quast_novoplasty"]

[tools]
quast = "{quast}"

[[datasets]]
name = "good"
reads_dir = "reads"
out_dir = "good"
"#,
            quast = quast.display()
        );
        let mut settings: RunSettings = toml::from_str(&text)?;
        settings.execution_log = dir.join("time.log");
        settings.timing_report = dir.join("timings.tsv");
        Ok(build_run_config(settings, dir)?)
    }

    #[test]
    fn test_staging_plan_names() {
        let staging = Path::new("/stage");
        let inputs = vec![
            ("S1".to_string(), PathBuf::from("/t/S1/Contigs_1_S1_mito.fasta")),
            ("S1".to_string(), PathBuf::from("/t/S1/Contigs_2_S1_mito.fasta")),
            ("S2".to_string(), PathBuf::from("/t/S2/scaffolds.fasta")),
        ];
        let plan = staging_plan(&inputs, staging);
        let names: Vec<PathBuf> = plan.into_iter().map(|(_, dst)| dst).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/stage/S1_1.fasta"),
                PathBuf::from("/stage/S1_2.fasta"),
                PathBuf::from("/stage/S2.fasta"),
            ]
        );
    }

    #[test]
    fn test_staging_plan_never_reuses_a_name() {
        let staging = Path::new("/stage");
        let inputs = vec![
            ("S1".to_string(), PathBuf::from("/t/S1/a.fasta")),
            ("S1".to_string(), PathBuf::from("/t/S1/b.fasta")),
            ("S1_1".to_string(), PathBuf::from("/t/S1_1/c.fasta")),
        ];
        let names: Vec<PathBuf> = staging_plan(&inputs, staging).into_iter().map(|(_, dst)| dst).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/stage/S1_1.fasta"),
                PathBuf::from("/stage/S1_2.fasta"),
                PathBuf::from("/stage/S1_1_2.fasta"),
            ]
        );
    }

    #[test]
    fn test_summary_target_detection() {
        assert_eq!(summary_target("short_summary.specific.x.S1_mito.txt"), Some(AssemblyTarget::Mitochondrial));
        assert_eq!(summary_target("short_summary.specific.x.S1_chloro.txt"), Some(AssemblyTarget::Chloroplast));
        assert_eq!(summary_target("short_summary.specific.x.S1.txt"), None);
    }

    #[test]
    fn test_harvest_filters_and_skips_results() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let tree = tmp.path().join("busco");
        fs::create_dir_all(tree.join("S1_mito"))?;
        fs::create_dir_all(tree.join("S1_chloro"))?;
        fs::write(tree.join("S1_mito/short_summary.specific.l.S1_mito.txt"), "m")?;
        fs::write(tree.join("S1_chloro/short_summary.specific.l.S1_chloro.txt"), "c")?;
        fs::write(tree.join("S1_mito/full_table.tsv"), "x")?;

        let mito_dest = tmp.path().join("mito_only");
        let mut report = StageReport::default();
        let only_mito = harvest_summaries(&tree, &mito_dest, Some(AssemblyTarget::Mitochondrial), &mut report)?;
        assert_eq!(only_mito.len(), 1);
        assert_eq!(only_mito[0].target, Some(AssemblyTarget::Mitochondrial));
        assert!(mito_dest.join("short_summary.specific.l.S1_mito.txt").is_file());

        let dest = tree.join("result");
        assert_eq!(harvest_summaries(&tree, &dest, None, &mut report)?.len(), 2);
        // A second pass must not pick up its own copies.
        assert_eq!(harvest_summaries(&tree, &dest, None, &mut report)?.len(), 2);
        assert!(report.is_clean());
        Ok(())
    }

    #[test]
    fn test_empty_selection_for_target() {
        let mut selection = Selection::new();
        selection.insert(("S1".to_string(), AssemblyTarget::Mitochondrial), vec![ResultFile {
            path: PathBuf::from("/n/S1/Circularized_assembly_1_S1_mito.fasta"),
            sample: "S1".to_string(),
            target: AssemblyTarget::Mitochondrial,
            provenance: Provenance::Circularized,
        }]);
        selection.insert(("S1".to_string(), AssemblyTarget::Chloroplast), Vec::new());

        assert_eq!(files_for_target(&selection, AssemblyTarget::Mitochondrial).len(), 1);
        assert!(files_for_target(&selection, AssemblyTarget::Chloroplast).is_empty());
        assert_eq!(Assessment::Statistics.sanitize_mode(), SanitizeMode::Simple);
        assert_eq!(Assessment::Completeness.sanitize_mode(), SanitizeMode::Disambiguate);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped_and_other_target_still_runs() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let calls = tmp.path().join("quast.calls");
        let config = stub_config(tmp.path(), &calls)?;
        let runner = CommandRunner::new(&config.settings.execution_log);

        let tree = tmp.path().join("novoplasty");
        fs::create_dir_all(tree.join("S1"))?;
        fs::create_dir_all(tree.join("S2"))?;
        let broken = tree.join("S1/Contigs_1_S1_mito.fasta");
        fs::write(&broken, b">c1\n\xff\xfeAC\n")?;
        let mito = tree.join("S2/Circularized_assembly_1_S2_mito.fasta");
        fs::write(&mito, ">m1\nACGT\n")?;
        let chloro = tree.join("S2/Circularized_assembly_1_S2_chloro.fasta");
        fs::write(&chloro, ">p1\nGG*\n")?;

        let mut selection = Selection::new();
        selection.insert(("S1".to_string(), AssemblyTarget::Mitochondrial), vec![
            result_file(broken.clone(), "S1", AssemblyTarget::Mitochondrial, Provenance::RawContig),
        ]);
        selection.insert(("S2".to_string(), AssemblyTarget::Mitochondrial), vec![
            result_file(mito, "S2", AssemblyTarget::Mitochondrial, Provenance::Circularized),
        ]);
        selection.insert(("S2".to_string(), AssemblyTarget::Chloroplast), vec![
            result_file(chloro, "S2", AssemblyTarget::Chloroplast, Provenance::Circularized),
        ]);

        let out = tmp.path().join("quast");
        let split = split_by_target(&config, &runner, &selection, Assessment::Statistics, &out).await?;

        assert_eq!(split.report.invocations, 2);
        assert_eq!(split.report.diagnostics.len(), 1);
        assert!(matches!(&split.report.diagnostics[0], Diagnostic::FileError { path, .. } if *path == broken));

        let recorded = fs::read_to_string(&calls)?;
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&out.join("mito/staging/S2.fasta").display().to_string()));
        assert!(!lines[0].contains("S1.fasta"));
        assert!(lines[1].contains(&out.join("chloro/staging/S2.fasta").display().to_string()));
        assert!(!out.join("mito/staging").exists());
        assert!(!out.join("chloro/staging").exists());

        let total: f64 = split.per_target.values().sum();
        assert!((total - split.report.elapsed).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_target_with_nothing_stageable_is_skipped() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let calls = tmp.path().join("quast.calls");
        let config = stub_config(tmp.path(), &calls)?;
        let runner = CommandRunner::new(&config.settings.execution_log);

        let missing = tmp.path().join("novoplasty/S1/Contigs_1_S1_mito.fasta");
        let mut selection = Selection::new();
        selection.insert(("S1".to_string(), AssemblyTarget::Mitochondrial), vec![
            result_file(missing, "S1", AssemblyTarget::Mitochondrial, Provenance::RawContig),
        ]);

        let out = tmp.path().join("quast");
        let split = split_by_target(&config, &runner, &selection, Assessment::Statistics, &out).await?;
        assert_eq!(split.report.invocations, 0);
        // FileError for the file, one diagnostic for each skipped target.
        assert_eq!(split.report.diagnostics.len(), 3);
        assert!(!calls.exists());
        assert!(!out.join("mito/staging").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_flat_statistics_over_missing_tree() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let calls = tmp.path().join("quast.calls");
        let config = stub_config(tmp.path(), &calls)?;
        let runner = CommandRunner::new(&config.settings.execution_log);

        let result = quast_flat(&config, &runner, &tmp.path().join("abyss"), &tmp.path().join("quast")).await;
        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_flat_statistics_follows_contig_symlinks() -> anyhow::Result<()> {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new()?;
        let calls = tmp.path().join("quast.calls");
        let config = stub_config(tmp.path(), &calls)?;
        let runner = CommandRunner::new(&config.settings.execution_log);

        let sample = tmp.path().join("abyss/S1");
        fs::create_dir_all(&sample)?;
        fs::write(sample.join("S1-6.fa"), ">1\nACGT\n")?;
        symlink("S1-6.fa", sample.join("S1-contigs.fa"))?;

        let report = quast_flat(&config, &runner, &tmp.path().join("abyss"), &tmp.path().join("quast")).await?;
        assert_eq!(report.invocations, 1);
        assert!(report.is_clean());
        assert!(fs::read_to_string(&calls)?.contains(&sample.join("S1-contigs.fa").display().to_string()));
        Ok(())
    }
}
