use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use seqbench_pipelines::cli::parse;
use seqbench_pipelines::config::loader::load_run_config;
use seqbench_pipelines::pipelines::assembly_benchmark;
use seqbench_pipelines::utils::file::resolve_path;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();
    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n SeqBench\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let config_path = resolve_path(&args.config, &dir);
    let run_config = match load_run_config(&config_path, &dir) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Using {} thread(s); {} stage(s) enabled over {} dataset(s)",
        run_config.threads,
        run_config.stages.len(),
        run_config.settings.datasets.len()
    );

    let summary = assembly_benchmark::run(run_config).await;
    summary.log();

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
