use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use lazy_static::lazy_static;
use serde::Deserialize;
use thiserror::Error;

// External software
pub const FASTQC_TAG: &str = "fastqc";
pub const TRIMMOMATIC_TAG: &str = "trimmomatic";
pub const SPADES_TAG: &str = "spades.py";
pub const NOVOPLASTY_TAG: &str = "NOVOPlasty";
pub const ABYSS_TAG: &str = "abyss-pe";
pub const QUAST_TAG: &str = "quast.py";
pub const BUSCO_TAG: &str = "busco";
pub const PYTHON_TAG: &str = "python3";

// Read naming conventions
pub const RAW_R1_SUFFIX: &str = "_R1_001.fastq.gz";
pub const RAW_R2_SUFFIX: &str = "_R2_001.fastq.gz";
pub const TRIMMED_R1_SUFFIX: &str = "_paired_R1.fastq.gz";
pub const TRIMMED_R2_SUFFIX: &str = "_paired_R2.fastq.gz";
pub const READ_EXTS: &[&str] = &["fastq.gz", "fq.gz"];

// Static filenames and patterns
pub const NOVOPLASTY_CONFIG: &str = "config.txt";
pub const STAGING_DIR: &str = "staging";
pub const RESULT_DIR: &str = "result";
pub const CONTIGS_PATTERN: &str = "*contigs.fa*";
pub const SCAFFOLD_PATTERNS: &[&str] = &["*scaffolds.fa*", "Contigs*.fasta"];
pub const SUMMARY_PATTERN: &str = "short_summary.*.txt";

// Sequence sanitizing
pub const PLACEHOLDER_BASE: char = '*';
pub const REPLACEMENT_BASE: char = 'N';
pub const HEADER_MARKER: char = '>';

// Static Parameters
pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_EXECUTION_LOG: &str = "time.log";
pub const DEFAULT_TIMING_REPORT: &str = "timings.tsv";


/// One of the two organelle genomes assembled and assessed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssemblyTarget {
    Mitochondrial,
    Chloroplast,
}

impl AssemblyTarget {
    pub const ALL: [AssemblyTarget; 2] = [AssemblyTarget::Mitochondrial, AssemblyTarget::Chloroplast];

    /// Short tag used in file names, directory names and summary filters.
    pub fn tag(&self) -> &'static str {
        match self {
            AssemblyTarget::Mitochondrial => "mito",
            AssemblyTarget::Chloroplast => "chloro",
        }
    }

    /// Value of the organelle assembler's `Type` key.
    pub fn assembler_type(&self) -> &'static str {
        match self {
            AssemblyTarget::Mitochondrial => "mito_plant",
            AssemblyTarget::Chloroplast => "chloro",
        }
    }

    pub fn genome_range(&self) -> &'static str {
        match self {
            AssemblyTarget::Mitochondrial => "400000-500000",
            AssemblyTarget::Chloroplast => "120000-200000",
        }
    }

    pub fn project_suffix(&self) -> &'static str {
        match self {
            AssemblyTarget::Mitochondrial => "_mito",
            AssemblyTarget::Chloroplast => "_chloro",
        }
    }
}

impl fmt::Display for AssemblyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    Circularized,
    RawContig,
}

lazy_static! {
    /// Filename globs locating organelle assembler output, keyed by (target, provenance).
    pub static ref RESULT_PATTERNS: HashMap<(AssemblyTarget, Provenance), &'static str> = {
        let mut m = HashMap::new();
        m.insert((AssemblyTarget::Mitochondrial, Provenance::Circularized), "Circularized*_mito.fasta");
        m.insert((AssemblyTarget::Mitochondrial, Provenance::RawContig), "Contigs*_mito.fasta");
        m.insert((AssemblyTarget::Chloroplast, Provenance::Circularized), "Circularized*_chloro.fasta");
        m.insert((AssemblyTarget::Chloroplast, Provenance::RawContig), "Contigs*_chloro.fasta");
        m
    };
}

/// Assemblers benchmarked against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assembler {
    Spades,
    Novoplasty,
    Abyss,
}

impl Assembler {
    /// Directory name of this assembler's output tree inside a dataset.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Assembler::Spades => "spades",
            Assembler::Novoplasty => "novoplasty",
            Assembler::Abyss => "abyss",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Assembler::Spades => "SPAdes",
            Assembler::Novoplasty => "NOVOPlasty",
            Assembler::Abyss => "ABySS",
        }
    }
}

/// Every step of the workflow. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    QualityControl,
    Trim,
    AssembleSpades,
    AssembleNovoplasty,
    AssembleAbyss,
    QuastSpades,
    QuastAbyss,
    QuastNovoplasty,
    BuscoSpades,
    BuscoAbyss,
    BuscoNovoplasty,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::QualityControl,
        Stage::Trim,
        Stage::AssembleSpades,
        Stage::AssembleNovoplasty,
        Stage::AssembleAbyss,
        Stage::QuastSpades,
        Stage::QuastAbyss,
        Stage::QuastNovoplasty,
        Stage::BuscoSpades,
        Stage::BuscoAbyss,
        Stage::BuscoNovoplasty,
    ];
}


/// Subsample of reads benchmarked through every assembler and assessment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub reads_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl Dataset {
    pub fn assembly_dir(&self, assembler: Assembler) -> PathBuf {
        self.out_dir.join(assembler.dir_name())
    }

    pub fn quast_dir(&self, assembler: Assembler) -> PathBuf {
        self.out_dir.join("quast").join(assembler.dir_name())
    }

    pub fn busco_dir(&self, assembler: Assembler) -> PathBuf {
        self.out_dir.join("busco").join(assembler.dir_name())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadDirs {
    pub raw_dir: PathBuf,
    pub qc_dir: PathBuf,
    pub trimmed_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrimmingParams {
    pub leading: u32,
    pub trailing: u32,
    pub window_size: u32,
    pub window_quality: u32,
    pub min_len: u32,
    pub headcrop: u32,
    pub crop: u32,
}

impl Default for TrimmingParams {
    fn default() -> Self {
        Self {
            leading: 3,
            trailing: 3,
            window_size: 4,
            window_quality: 15,
            min_len: 36,
            headcrop: 20,
            crop: 265,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpadesParams {
    pub kmer: u32,
}

impl Default for SpadesParams {
    fn default() -> Self {
        Self { kmer: 55 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NovoplastyParams {
    pub config_template: PathBuf,
    pub seed_mito: PathBuf,
    pub seed_chloro: PathBuf,
    #[serde(default = "default_novoplasty_kmer")]
    pub kmer: u32,
    #[serde(default = "default_read_length")]
    pub read_length: u32,
}

fn default_novoplasty_kmer() -> u32 {
    55
}

fn default_read_length() -> u32 {
    265
}

impl NovoplastyParams {
    pub fn seed_file(&self, target: AssemblyTarget) -> &PathBuf {
        match target {
            AssemblyTarget::Mitochondrial => &self.seed_mito,
            AssemblyTarget::Chloroplast => &self.seed_chloro,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AbyssParams {
    pub kmer: u32,
    pub jobs: usize,
    pub memory: String,
}

impl Default for AbyssParams {
    fn default() -> Self {
        Self {
            kmer: 64,
            jobs: 12,
            memory: "30G".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuscoParams {
    pub lineage_dataset: PathBuf,
    pub plot_script: PathBuf,
}

/// Executable names, overridable per run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub fastqc: String,
    pub trimmomatic: String,
    pub spades: String,
    pub novoplasty: String,
    pub abyss: String,
    pub quast: String,
    pub busco: String,
    pub python: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            fastqc: FASTQC_TAG.to_string(),
            trimmomatic: TRIMMOMATIC_TAG.to_string(),
            spades: SPADES_TAG.to_string(),
            novoplasty: NOVOPLASTY_TAG.to_string(),
            abyss: ABYSS_TAG.to_string(),
            quast: QUAST_TAG.to_string(),
            busco: BUSCO_TAG.to_string(),
            python: PYTHON_TAG.to_string(),
        }
    }
}

/// Run configuration document as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_execution_log")]
    pub execution_log: PathBuf,
    #[serde(default = "default_timing_report")]
    pub timing_report: PathBuf,
    #[serde(default)]
    pub stages: Option<Vec<Stage>>,
    pub reads: Option<ReadDirs>,
    #[serde(default)]
    pub trimming: TrimmingParams,
    #[serde(default)]
    pub spades: SpadesParams,
    pub novoplasty: Option<NovoplastyParams>,
    #[serde(default)]
    pub abyss: AbyssParams,
    pub busco: Option<BuscoParams>,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_execution_log() -> PathBuf {
    PathBuf::from(DEFAULT_EXECUTION_LOG)
}

fn default_timing_report() -> PathBuf {
    PathBuf::from(DEFAULT_TIMING_REPORT)
}


/// Validated, immutable configuration handed to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: RunSettings,
    pub threads: usize,
    pub stages: Vec<Stage>,
}


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    IOError(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Best-effort failure recorded by a stage that kept going.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    ToolFailure { command: String, detail: String },
    MissingInput(String),
    /// One file or sample could not be prepared; the rest of the stage went on.
    FileError { path: PathBuf, detail: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ToolFailure { command, detail } => write!(f, "tool failure ({}): {}", detail, command),
            Diagnostic::MissingInput(context) => write!(f, "missing input: {}", context),
            Diagnostic::FileError { path, detail } => write!(f, "file error ({}): {}", path.display(), detail),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IOError(err.to_string())
    }
}
