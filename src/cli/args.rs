use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "seqbench-pipelines", version, about = "Organelle genome assembly benchmarking")]
pub struct Arguments {
    #[arg(short = 'c', long = "config", help = "Run configuration document (TOML)")]
    pub config: PathBuf,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,
}
