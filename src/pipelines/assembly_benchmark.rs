// src/pipelines/assembly_benchmark.rs: runs the enabled stages over the read sets and datasets
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use glob::Pattern;
use log::{error, info, warn};

use crate::config::defs::{
    Assembler, AssemblyTarget, BuscoParams, Dataset, NovoplastyParams, PipelineError, ReadDirs,
    RunConfig, Stage, NOVOPLASTY_CONFIG, READ_EXTS,
};
use crate::utils::aggregate::{busco_flat, quast_flat, split_by_target, Assessment};
use crate::utils::command::{abyss, fastqc, novoplasty, spades, trimmomatic};
use crate::utils::discovery::{discover, ReadNaming};
use crate::utils::file::{ensure_dir, list_matching, require_dir};
use crate::utils::report::TimingReport;
use crate::utils::runner::{CommandRunner, StageReport};
use crate::utils::selection::select;
use crate::utils::template::{render_to_path, ConfigProfile};


/// Whether a stage runs once for the shared read set or once per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageScope {
    ReadSet,
    PerDataset,
}

pub fn scope(stage: Stage) -> StageScope {
    match stage {
        Stage::QualityControl | Stage::Trim => StageScope::ReadSet,
        _ => StageScope::PerDataset,
    }
}

/// Name under which a stage shows up in the timing report, before the dataset suffix.
pub fn label_base(stage: Stage) -> &'static str {
    match stage {
        Stage::QualityControl => "FastQC",
        Stage::Trim => "Trimmomatic",
        Stage::AssembleSpades => "SPAdes",
        Stage::AssembleNovoplasty => "NOVOPlasty",
        Stage::AssembleAbyss => "ABySS",
        Stage::QuastSpades => "QUAST_spades",
        Stage::QuastAbyss => "QUAST_abyss",
        Stage::QuastNovoplasty => "QUAST_novo",
        Stage::BuscoSpades => "BUSCO_spades",
        Stage::BuscoAbyss => "BUSCO_abyss",
        Stage::BuscoNovoplasty => "BUSCO_novo",
    }
}

pub fn stage_label(stage: Stage, dataset: Option<&Dataset>) -> String {
    match dataset {
        Some(dataset) => format!("{}_{}", label_base(stage), dataset.name),
        None => label_base(stage).to_string(),
    }
}

/// Every stage in execution order.
pub fn default_stages() -> Vec<Stage> {
    Stage::ALL.to_vec()
}


#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    pub label: String,
    pub result: Result<StageReport, PipelineError>,
}

/// Everything a run produced, in execution order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<StageOutcome>,
    pub elapsed: f64,
}

impl RunSummary {
    pub fn labels(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.label.as_str()).collect()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn diagnostics(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|r| r.diagnostics.len())
            .sum()
    }

    /// Timing rows for every stage that completed, failed tools included.
    pub fn timing_report(&self) -> TimingReport {
        let mut report = TimingReport::new();
        for outcome in &self.outcomes {
            if let Ok(stage_report) = &outcome.result {
                report.record(&outcome.label, stage_report.elapsed);
            }
        }
        report
    }

    pub fn log(&self) {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(report) if report.is_clean() => {
                    info!("{}: {:.2} seconds over {} command(s)", outcome.label, report.elapsed, report.invocations);
                }
                Ok(report) => {
                    warn!(
                        "{}: {:.2} seconds over {} command(s), {} problem(s)",
                        outcome.label,
                        report.elapsed,
                        report.invocations,
                        report.diagnostics.len()
                    );
                    for diagnostic in &report.diagnostics {
                        warn!("  {}", diagnostic);
                    }
                }
                Err(e) => error!("{}: stage failed: {}", outcome.label, e),
            }
        }
        info!(
            "{} stage run(s), {} failed, {} diagnostic(s), {:.2} seconds total",
            self.outcomes.len(),
            self.failed(),
            self.diagnostics(),
            self.elapsed
        );
    }
}


fn read_dirs(config: &RunConfig) -> Result<&ReadDirs, PipelineError> {
    config
        .settings
        .reads
        .as_ref()
        .ok_or_else(|| PipelineError::InvalidConfig("[reads] section missing".to_string()))
}

fn novoplasty_params(config: &RunConfig) -> Result<&NovoplastyParams, PipelineError> {
    config
        .settings
        .novoplasty
        .as_ref()
        .ok_or_else(|| PipelineError::InvalidConfig("[novoplasty] section missing".to_string()))
}

fn busco_params(config: &RunConfig) -> Result<&BuscoParams, PipelineError> {
    config
        .settings
        .busco
        .as_ref()
        .ok_or_else(|| PipelineError::InvalidConfig("[busco] section missing".to_string()))
}

async fn quality_control(config: &RunConfig, runner: &CommandRunner) -> Result<StageReport, PipelineError> {
    let reads = read_dirs(config)?;
    let mut report = StageReport::default();

    let patterns = READ_EXTS
        .iter()
        .map(|ext| Pattern::new(&format!("*.{}", ext)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::Other(e.into()))?;
    let refs: Vec<&Pattern> = patterns.iter().collect();
    require_dir(&reads.raw_dir)?;
    let files = list_matching(&reads.raw_dir, &refs)?;
    if files.is_empty() {
        report.missing(format!("No read files found in {}", reads.raw_dir.display()));
        return Ok(report);
    }

    ensure_dir(&reads.qc_dir)?;
    let cmd = fastqc::arg_generator(&config.settings.tools.fastqc, &reads.raw_dir, &files, &reads.qc_dir, config.threads);
    report.add_outcome(&runner.execute(&cmd).await);
    Ok(report)
}

async fn trim(config: &RunConfig, runner: &CommandRunner) -> Result<StageReport, PipelineError> {
    let reads = read_dirs(config)?;
    let mut report = StageReport::default();

    require_dir(&reads.raw_dir)?;
    let samples = discover(&reads.raw_dir, &ReadNaming::raw())?;
    if samples.is_empty() {
        report.missing(format!("No raw read pairs found in {}", reads.raw_dir.display()));
        return Ok(report);
    }

    ensure_dir(&reads.trimmed_dir)?;
    for sample in &samples {
        let outputs = trimmomatic::TrimOutputs::new(&reads.trimmed_dir, &sample.id);
        let cmd = trimmomatic::arg_generator(
            &config.settings.tools.trimmomatic,
            &sample.forward,
            &sample.reverse,
            &outputs,
            &config.settings.trimming,
        );
        report.add_outcome(&runner.execute(&cmd).await);
    }
    info!("Trimmed {} sample(s) in {:.2} seconds", samples.len(), report.elapsed);
    Ok(report)
}

/// One SPAdes or ABySS run per trimmed sample, each into `<tree>/<sample>`.
async fn assemble_short_reads(
    config: &RunConfig,
    runner: &CommandRunner,
    dataset: &Dataset,
    assembler: Assembler,
) -> Result<StageReport, PipelineError> {
    let mut report = StageReport::default();
    require_dir(&dataset.reads_dir)?;
    let samples = discover(&dataset.reads_dir, &ReadNaming::trimmed())?;
    if samples.is_empty() {
        report.missing(format!("No trimmed read pairs found in {}", dataset.reads_dir.display()));
        return Ok(report);
    }

    let tree = dataset.assembly_dir(assembler);
    let tools = &config.settings.tools;
    for sample in &samples {
        let out = tree.join(&sample.id);
        if let Err(e) = ensure_dir(&out) {
            report.file_error(&out, e);
            continue;
        }
        let cmd = match assembler {
            Assembler::Abyss => abyss::arg_generator(
                &tools.abyss,
                &sample.id,
                &sample.forward,
                &sample.reverse,
                &out,
                &config.settings.abyss,
            ),
            _ => spades::arg_generator(&tools.spades, &sample.forward, &sample.reverse, &out, config.settings.spades.kmer),
        };
        report.add_outcome(&runner.execute(&cmd).await);
    }
    info!("{} finished {} sample(s) for {} in {:.2} seconds", assembler.label(), samples.len(), dataset.name, report.elapsed);
    Ok(report)
}

/// Two organelle runs per sample sharing one config document: mitochondrion first, then chloroplast.
async fn assemble_organelles(config: &RunConfig, runner: &CommandRunner, dataset: &Dataset) -> Result<StageReport, PipelineError> {
    let params = novoplasty_params(config)?;
    let mut report = StageReport::default();
    require_dir(&dataset.reads_dir)?;
    let samples = discover(&dataset.reads_dir, &ReadNaming::trimmed())?;
    if samples.is_empty() {
        report.missing(format!("No trimmed read pairs found in {}", dataset.reads_dir.display()));
        return Ok(report);
    }

    let tree = dataset.assembly_dir(Assembler::Novoplasty);
    for sample in &samples {
        let out = tree.join(&sample.id);
        let config_path = out.join(NOVOPLASTY_CONFIG);
        if let Err(e) = ensure_dir(&out).and_then(|_| fs::copy(&params.config_template, &config_path)) {
            report.file_error(&config_path, e);
            continue;
        }

        for target in AssemblyTarget::ALL {
            let profile = ConfigProfile::new(sample, target, params, &out);
            if let Err(e) = render_to_path(&config_path, &profile) {
                report.file_error(&config_path, e);
                continue;
            }
            let cmd = novoplasty::arg_generator(&config.settings.tools.novoplasty, &config_path);
            report.add_outcome(&runner.execute(&cmd).await);
        }
    }
    Ok(report)
}

async fn assess_flat(
    config: &RunConfig,
    runner: &CommandRunner,
    dataset: &Dataset,
    assembler: Assembler,
    assessment: Assessment,
) -> Result<StageReport, PipelineError> {
    let tree = dataset.assembly_dir(assembler);
    match assessment {
        Assessment::Statistics => quast_flat(config, runner, &tree, &dataset.quast_dir(assembler)).await,
        Assessment::Completeness => {
            let params = busco_params(config)?;
            busco_flat(config, runner, params, &tree, &dataset.busco_dir(assembler)).await
        }
    }
}

async fn assess_organelles(
    config: &RunConfig,
    runner: &CommandRunner,
    dataset: &Dataset,
    assessment: Assessment,
) -> Result<StageReport, PipelineError> {
    let tree = dataset.assembly_dir(Assembler::Novoplasty);
    require_dir(&tree)?;
    let selection = select(&tree)?;
    let out_dir = match assessment {
        Assessment::Statistics => dataset.quast_dir(Assembler::Novoplasty),
        Assessment::Completeness => dataset.busco_dir(Assembler::Novoplasty),
    };
    let split = split_by_target(config, runner, &selection, assessment, &out_dir).await?;
    for (target, seconds) in &split.per_target {
        info!("{} {} {:?}: {:.2} seconds", dataset.name, target, assessment, seconds);
    }
    Ok(split.report)
}

/// Dispatches one stage. `dataset` is None for read-set stages.
pub async fn execute_stage(
    config: &RunConfig,
    runner: &CommandRunner,
    stage: Stage,
    dataset: Option<&Dataset>,
) -> Result<StageReport, PipelineError> {
    let Some(dataset) = dataset else {
        return match stage {
            Stage::QualityControl => quality_control(config, runner).await,
            Stage::Trim => trim(config, runner).await,
            _ => Err(PipelineError::InvalidConfig(format!("{:?} needs a dataset", stage))),
        };
    };

    match stage {
        Stage::QualityControl | Stage::Trim => Err(PipelineError::InvalidConfig(format!("{:?} runs on the read set", stage))),
        Stage::AssembleSpades => assemble_short_reads(config, runner, dataset, Assembler::Spades).await,
        Stage::AssembleAbyss => assemble_short_reads(config, runner, dataset, Assembler::Abyss).await,
        Stage::AssembleNovoplasty => assemble_organelles(config, runner, dataset).await,
        Stage::QuastSpades => assess_flat(config, runner, dataset, Assembler::Spades, Assessment::Statistics).await,
        Stage::QuastAbyss => assess_flat(config, runner, dataset, Assembler::Abyss, Assessment::Statistics).await,
        Stage::QuastNovoplasty => assess_organelles(config, runner, dataset, Assessment::Statistics).await,
        Stage::BuscoSpades => assess_flat(config, runner, dataset, Assembler::Spades, Assessment::Completeness).await,
        Stage::BuscoAbyss => assess_flat(config, runner, dataset, Assembler::Abyss, Assessment::Completeness).await,
        Stage::BuscoNovoplasty => assess_organelles(config, runner, dataset, Assessment::Completeness).await,
    }
}

/// Runs every enabled stage, strictly one after another, then writes the timing report.
///
/// A failing stage is recorded and the run moves on to the next one.
///
/// # Arguments
///
/// * `config` - Validated run configuration.
///
/// # Returns
/// RunSummary with one outcome per stage execution.
pub async fn run(config: Arc<RunConfig>) -> RunSummary {
    let run_start = Instant::now();
    let runner = CommandRunner::new(&config.settings.execution_log);
    let mut summary = RunSummary::default();

    for &stage in &config.stages {
        let targets: Vec<Option<&Dataset>> = match scope(stage) {
            StageScope::ReadSet => vec![None],
            StageScope::PerDataset => config.settings.datasets.iter().map(Some).collect(),
        };

        for dataset in targets {
            let label = stage_label(stage, dataset);
            info!("Starting {}", label);
            let result = execute_stage(&config, &runner, stage, dataset).await;
            if let Err(e) = &result {
                error!("{} failed: {}", label, e);
            }
            summary.outcomes.push(StageOutcome { stage, label, result });
        }
    }
    summary.elapsed = run_start.elapsed().as_secs_f64();

    let timings = summary.timing_report();
    if !timings.is_empty() {
        if let Err(e) = timings.persist(&config.settings.timing_report) {
            error!("Could not write timing report {}: {}", config.settings.timing_report.display(), e);
        }
    }
    summary
}
