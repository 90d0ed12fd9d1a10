/// Functions and structs for building external tool command lines

use std::fmt;
use std::path::{Path, PathBuf};


/// One external program invocation: executable, argument vector and optional working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.cwd {
            write!(f, "cd {} && ", dir.display())?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}


pub mod fastqc {
    use std::path::{Path, PathBuf};
    use super::ToolCommand;

    /// FastQC over every compressed read file of a directory, run from inside that directory.
    pub fn arg_generator(program: &str, reads_dir: &Path, read_files: &[PathBuf], out_dir: &Path, threads: usize) -> ToolCommand {
        let mut cmd = ToolCommand::new(program).current_dir(reads_dir);
        for file in read_files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.to_string_lossy().into_owned());
            cmd = cmd.arg(name);
        }
        cmd.arg("-t")
            .arg(threads.to_string())
            .arg("-o")
            .path_arg(out_dir)
    }
}

pub mod trimmomatic {
    use std::path::{Path, PathBuf};
    use super::ToolCommand;
    use crate::config::defs::TrimmingParams;

    /// Paired/unpaired forward and reverse outputs for one sample.
    #[derive(Debug, Clone, PartialEq)]
    pub struct TrimOutputs {
        pub forward_paired: PathBuf,
        pub forward_unpaired: PathBuf,
        pub reverse_paired: PathBuf,
        pub reverse_unpaired: PathBuf,
    }

    impl TrimOutputs {
        pub fn new(out_dir: &Path, sample_id: &str) -> Self {
            Self {
                forward_paired: out_dir.join(format!("{}_paired_R1.fastq.gz", sample_id)),
                forward_unpaired: out_dir.join(format!("{}_unpaired_R1.fastq.gz", sample_id)),
                reverse_paired: out_dir.join(format!("{}_paired_R2.fastq.gz", sample_id)),
                reverse_unpaired: out_dir.join(format!("{}_unpaired_R2.fastq.gz", sample_id)),
            }
        }
    }

    pub fn arg_generator(program: &str, forward: &Path, reverse: &Path, outputs: &TrimOutputs, params: &TrimmingParams) -> ToolCommand {
        ToolCommand::new(program)
            .arg("PE")
            .arg("-phred33")
            .path_arg(forward)
            .path_arg(reverse)
            .path_arg(&outputs.forward_paired)
            .path_arg(&outputs.forward_unpaired)
            .path_arg(&outputs.reverse_paired)
            .path_arg(&outputs.reverse_unpaired)
            .arg(format!("LEADING:{}", params.leading))
            .arg(format!("TRAILING:{}", params.trailing))
            .arg(format!("SLIDINGWINDOW:{}:{}", params.window_size, params.window_quality))
            .arg(format!("MINLEN:{}", params.min_len))
            .arg(format!("HEADCROP:{}", params.headcrop))
            .arg(format!("CROP:{}", params.crop))
    }
}

pub mod spades {
    use std::path::Path;
    use super::ToolCommand;

    pub fn arg_generator(program: &str, forward: &Path, reverse: &Path, out_dir: &Path, kmer: u32) -> ToolCommand {
        ToolCommand::new(program)
            .arg("-1")
            .path_arg(forward)
            .arg("-2")
            .path_arg(reverse)
            .arg("-o")
            .path_arg(out_dir)
            .arg("-k")
            .arg(kmer.to_string())
    }
}

pub mod novoplasty {
    use std::path::Path;
    use super::ToolCommand;

    pub fn arg_generator(program: &str, config_file: &Path) -> ToolCommand {
        ToolCommand::new(program).arg("-c").path_arg(config_file)
    }
}

pub mod abyss {
    use std::path::Path;
    use super::ToolCommand;
    use crate::config::defs::AbyssParams;

    /// abyss-pe is make-driven; `in=` carries both read files as one variable.
    pub fn arg_generator(program: &str, sample_id: &str, forward: &Path, reverse: &Path, out_dir: &Path, params: &AbyssParams) -> ToolCommand {
        ToolCommand::new(program)
            .arg(format!("k={}", params.kmer))
            .arg(format!("name={}", sample_id))
            .arg(format!("in={} {}", forward.display(), reverse.display()))
            .arg("-C")
            .path_arg(out_dir)
            .arg(format!("j={}", params.jobs))
            .arg(format!("B={}", params.memory))
    }
}

pub mod quast {
    use std::path::{Path, PathBuf};
    use super::ToolCommand;

    pub fn arg_generator(program: &str, contig_files: &[PathBuf], out_dir: &Path, threads: usize) -> ToolCommand {
        let mut cmd = ToolCommand::new(program);
        for file in contig_files {
            cmd = cmd.path_arg(file);
        }
        cmd.arg("-o")
            .path_arg(out_dir)
            .arg("-t")
            .arg(threads.to_string())
    }
}

pub mod busco {
    use std::path::Path;
    use super::ToolCommand;

    pub fn arg_generator(program: &str, input_dir: &Path, out_dir: &Path, lineage_dataset: &Path, threads: usize) -> ToolCommand {
        ToolCommand::new(program)
            .arg("-i")
            .path_arg(input_dir)
            .arg("-c")
            .arg(threads.to_string())
            .arg("--out_path")
            .path_arg(out_dir)
            .arg("--mode")
            .arg("genome")
            .arg("--offline")
            .arg("-l")
            .path_arg(lineage_dataset)
            .arg("--metaeuk")
    }
}

pub mod plot {
    use std::path::Path;
    use super::ToolCommand;

    pub fn arg_generator(python: &str, script: &Path, results_dir: &Path) -> ToolCommand {
        ToolCommand::new(python)
            .path_arg(script)
            .arg("-wd")
            .path_arg(results_dir)
    }
}
