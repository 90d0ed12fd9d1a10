// src/config/loader.rs: reads and validates the run configuration document

use std::fs;
use std::path::{Path, PathBuf};

use fxhash::FxHashSet;
use log::{info, warn};

use crate::config::defs::{PipelineError, RunConfig, RunSettings, Stage};
use crate::utils::file::resolve_path;
use crate::utils::system::detect_cores;


/// Loads a TOML run configuration, resolves relative paths against `cwd`
/// and validates it.
///
/// # Arguments
///
/// * `path` - Run configuration file.
/// * `cwd` - Directory relative paths are resolved against.
///
/// # Returns
/// Validated RunConfig, or PipelineError::InvalidConfig.
pub fn load_run_config(path: &Path, cwd: &Path) -> Result<RunConfig, PipelineError> {
    let text = fs::read_to_string(path)
        .map_err(|e| PipelineError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e)))?;
    let settings: RunSettings = toml::from_str(&text)
        .map_err(|e| PipelineError::InvalidConfig(format!("Cannot parse {}: {}", path.display(), e)))?;
    info!("Loaded run configuration from {}", path.display());
    build_run_config(settings, cwd)
}

/// Validates already-parsed settings into a RunConfig.
pub fn build_run_config(settings: RunSettings, cwd: &Path) -> Result<RunConfig, PipelineError> {
    let settings = resolve_settings(settings, cwd);
    let stages = enabled_stages(settings.stages.as_deref());
    validate(&settings, &stages)?;

    let threads = detect_cores(settings.threads);
    if threads < settings.threads {
        warn!(
            "Requested {} threads but only {} physical cores detected; using {}",
            settings.threads, threads, threads
        );
    }

    Ok(RunConfig {
        settings,
        threads,
        stages,
    })
}

/// Deduplicates the requested stages and puts them in execution order.
/// No list means every stage.
pub fn enabled_stages(requested: Option<&[Stage]>) -> Vec<Stage> {
    match requested {
        Some(list) => {
            let wanted: FxHashSet<Stage> = list.iter().copied().collect();
            Stage::ALL.iter().copied().filter(|s| wanted.contains(s)).collect()
        }
        None => Stage::ALL.to_vec(),
    }
}

fn resolve_settings(mut settings: RunSettings, cwd: &Path) -> RunSettings {
    let r = |p: &PathBuf| resolve_path(p, cwd);

    settings.execution_log = r(&settings.execution_log);
    settings.timing_report = r(&settings.timing_report);
    if let Some(reads) = settings.reads.as_mut() {
        reads.raw_dir = r(&reads.raw_dir);
        reads.qc_dir = r(&reads.qc_dir);
        reads.trimmed_dir = r(&reads.trimmed_dir);
    }
    if let Some(novo) = settings.novoplasty.as_mut() {
        novo.config_template = r(&novo.config_template);
        novo.seed_mito = r(&novo.seed_mito);
        novo.seed_chloro = r(&novo.seed_chloro);
    }
    if let Some(busco) = settings.busco.as_mut() {
        busco.lineage_dataset = r(&busco.lineage_dataset);
        busco.plot_script = r(&busco.plot_script);
    }
    for dataset in settings.datasets.iter_mut() {
        dataset.reads_dir = r(&dataset.reads_dir);
        dataset.out_dir = r(&dataset.out_dir);
    }
    settings
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidConfig(msg.into())
}

fn validate(settings: &RunSettings, stages: &[Stage]) -> Result<(), PipelineError> {
    if settings.threads == 0 {
        return Err(invalid("threads must be greater than 0"));
    }
    if stages.is_empty() {
        return Err(invalid("no stages enabled"));
    }

    let needs = |wanted: &[Stage]| stages.iter().any(|s| wanted.contains(s));

    if needs(&[Stage::QualityControl, Stage::Trim]) && settings.reads.is_none() {
        return Err(invalid("[reads] is required for quality_control and trim"));
    }

    let all = Stage::ALL;
    if needs(&all[2..]) {
        if settings.datasets.is_empty() {
            return Err(invalid("at least one [[datasets]] entry is required for assembly and assessment stages"));
        }
        let mut names = FxHashSet::default();
        for dataset in &settings.datasets {
            if dataset.name.trim().is_empty() {
                return Err(invalid("dataset name must not be empty"));
            }
            if !names.insert(dataset.name.as_str()) {
                return Err(invalid(format!("duplicate dataset name '{}'", dataset.name)));
            }
        }
    }

    if needs(&[Stage::AssembleSpades]) && settings.spades.kmer == 0 {
        return Err(invalid("spades.kmer must be greater than 0"));
    }
    if needs(&[Stage::AssembleAbyss]) {
        if settings.abyss.kmer == 0 {
            return Err(invalid("abyss.kmer must be greater than 0"));
        }
        if settings.abyss.jobs == 0 {
            return Err(invalid("abyss.jobs must be greater than 0"));
        }
    }
    if needs(&[Stage::AssembleNovoplasty]) {
        let novo = settings
            .novoplasty
            .as_ref()
            .ok_or_else(|| invalid("[novoplasty] is required for assemble_novoplasty"))?;
        if novo.kmer == 0 || novo.read_length == 0 {
            return Err(invalid("novoplasty.kmer and novoplasty.read_length must be greater than 0"));
        }
        if !novo.config_template.is_file() {
            return Err(invalid(format!(
                "novoplasty config template {} not found",
                novo.config_template.display()
            )));
        }
    }
    if needs(&[Stage::BuscoSpades, Stage::BuscoAbyss, Stage::BuscoNovoplasty]) && settings.busco.is_none() {
        return Err(invalid("[busco] is required for busco stages"));
    }

    Ok(())
}
