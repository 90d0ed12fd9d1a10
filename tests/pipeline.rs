use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use seqbench_pipelines::config::loader::load_run_config;
use seqbench_pipelines::pipelines::assembly_benchmark::run;
use seqbench_pipelines::utils::report::load;

const TEMPLATE: &str = "Project:\n\
-----------------------\n\
Project name          = Test\n\
Type                  = chloro\n\
Genome Range          = 120000-200000\n\
K-mer                 = 33\n\
Seed Input            = /path/to/seed.fasta\n\
Reference sequence    = /path/to/reference.fasta\n\
\n\
Dataset 1:\n\
-----------------------\n\
Read Length           = 151\n\
Insert size           = 300\n\
Forward reads         = /path/to/reads_1.fastq\n\
Reverse reads         = /path/to/reads_2.fastq\n\
\n\
Optional:\n\
-----------------------\n\
Output path           = /old/\n";

fn write_stub(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Stub that records its argument list, one line per call, and copies every
/// `.fasta` argument into `<log>.content`.
fn recording_stub(dir: &Path, name: &str, log: &Path) -> Result<PathBuf> {
    let body = format!(
        "echo \"$@\" >> '{log}'\nfor f in \"$@\"; do\n  case \"$f\" in\n    *.fasta) cat \"$f\" >> '{log}.content' ;;\n  esac\ndone",
        log = log.display()
    );
    write_stub(dir, name, &body)
}

#[tokio::test]
async fn test_flat_statistics_single_invocation() -> Result<()> {
    let tmp = TempDir::new()?;
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&bin)?;
    let calls = tmp.path().join("quast.calls");
    let quast = recording_stub(&bin, "quast", &calls)?;

    let out = tmp.path().join("good");
    for sample in ["S1", "S2"] {
        let dir = out.join("spades").join(sample);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("contigs.fasta"), ">NODE_1\nACGT\n")?;
        fs::write(dir.join("scaffolds.fasta"), ">NODE_1\nACGT\n")?;
    }

    let config_path = tmp.path().join("run.toml");
    fs::write(
        &config_path,
        format!(
            r#"
threads = 1
stages = ["quast_spades"]

[tools]
quast = "{quast}"

[[datasets]]
name = "good"
reads_dir = "reads"
out_dir = "good"
"#,
            quast = quast.display()
        ),
    )?;

    let config = load_run_config(&config_path, tmp.path())?;
    let summary = run(Arc::new(config)).await;
    assert_eq!(summary.labels(), vec!["QUAST_spades_good"]);
    assert_eq!(summary.failed(), 0);

    let recorded = fs::read_to_string(&calls)?;
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(lines.len(), 1);
    let s1 = out.join("spades/S1/contigs.fasta");
    let s2 = out.join("spades/S2/contigs.fasta");
    assert!(lines[0].contains(&s1.display().to_string()));
    assert!(lines[0].contains(&s2.display().to_string()));
    assert!(!lines[0].contains("scaffolds"));
    assert!(lines[0].contains(&format!("-o {}", out.join("quast/spades").display())));

    let log = fs::read_to_string(tmp.path().join("time.log"))?;
    assert_eq!(log.matches("Elapsed time: ").count(), 1);

    let rows = load(&tmp.path().join("timings.tsv"))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label, "QUAST_spades_good");
    assert!(rows[0].seconds >= 0.0);
    Ok(())
}

#[tokio::test]
async fn test_organelle_assembly_then_split_statistics() -> Result<()> {
    let tmp = TempDir::new()?;
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&bin)?;

    // The organelle stub reads its config and writes circularized output for
    // the mitochondrion and two raw contigs for the chloroplast.
    let projects = tmp.path().join("novo.projects");
    let novo_body = format!(
        r#"cfg="$2"
project=$(grep '^Project name' "$cfg" | sed 's/.*= //')
out=$(grep '^Output path' "$cfg" | sed 's/.*= //')
echo "$project" >> '{projects}'
case "$project" in
  *_mito) printf '>c1\nAC*G\n>c1\nTT\n' > "${{out}}Circularized_assembly_1_${{project}}.fasta" ;;
  *) printf '>k1\nGG*\n' > "${{out}}Contigs_1_${{project}}.fasta"
     printf '>k2\nCC\n' > "${{out}}Contigs_2_${{project}}.fasta" ;;
esac"#,
        projects = projects.display()
    );
    let novo = write_stub(&bin, "novoplasty", &novo_body)?;
    let calls = tmp.path().join("quast.calls");
    let quast = recording_stub(&bin, "quast", &calls)?;

    let reads = tmp.path().join("reads");
    fs::create_dir_all(&reads)?;
    fs::write(reads.join("S1_paired_R1.fastq.gz"), "")?;
    fs::write(reads.join("S1_paired_R2.fastq.gz"), "")?;
    fs::write(tmp.path().join("config.txt"), TEMPLATE)?;

    let config_path = tmp.path().join("run.toml");
    fs::write(
        &config_path,
        format!(
            r#"
threads = 1
stages = ["quast_novoplasty", "assemble_novoplasty"]

[novoplasty]
config_template = "config.txt"
seed_mito = "seed.fasta"
seed_chloro = "Seed_RUBP.fasta"

[tools]
novoplasty = "{novo}"
quast = "{quast}"

[[datasets]]
name = "good"
reads_dir = "reads"
out_dir = "good"
"#,
            novo = novo.display(),
            quast = quast.display()
        ),
    )?;

    let config = load_run_config(&config_path, tmp.path())?;
    let summary = run(Arc::new(config)).await;
    assert_eq!(summary.labels(), vec!["NOVOPlasty_good", "QUAST_novo_good"]);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.diagnostics(), 0);

    // Mitochondrion rendered and run first, chloroplast over the same document second.
    assert_eq!(fs::read_to_string(&projects)?, "S1_mito\nS1_chloro\n");
    let rendered = fs::read_to_string(tmp.path().join("good/novoplasty/S1/config.txt"))?;
    assert!(rendered.contains("Project name          = S1_chloro\n"));
    assert!(rendered.contains(&format!("Seed Input            = {}\n", tmp.path().join("Seed_RUBP.fasta").display())));
    assert!(rendered.contains("Reference sequence =\n"));

    let quast_out = tmp.path().join("good/quast/novoplasty");
    let recorded = fs::read_to_string(&calls)?;
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(&quast_out.join("mito/staging/S1.fasta").display().to_string()));
    assert!(lines[0].contains(&format!("-o {}", quast_out.join("mito").display())));
    assert!(lines[1].contains(&quast_out.join("chloro/staging/S1_1.fasta").display().to_string()));
    assert!(lines[1].contains(&quast_out.join("chloro/staging/S1_2.fasta").display().to_string()));

    // Statistics input gets placeholder replacement only; staging is gone afterwards.
    let staged = fs::read_to_string(tmp.path().join("quast.calls.content"))?;
    assert_eq!(staged, ">c1\nACNG\n>c1\nTT\n>k1\nGGN\n>k2\nCC\n");
    assert!(!quast_out.join("mito/staging").exists());
    assert!(!quast_out.join("chloro/staging").exists());

    let rows = load(&tmp.path().join("timings.tsv"))?;
    let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["NOVOPlasty_good", "QUAST_novo_good"]);
    Ok(())
}

#[tokio::test]
async fn test_completeness_flat_and_split() -> Result<()> {
    let tmp = TempDir::new()?;
    let bin = tmp.path().join("bin");
    fs::create_dir_all(&bin)?;

    // The completeness stub writes one summary per staged input under its output path.
    let busco_calls = tmp.path().join("busco.calls");
    let busco_body = format!(
        r#"in="$2"; out="$6"
echo "$@" >> '{log}'
for f in "$in"/*; do
  name=$(basename "$f")
  cat "$f" >> '{log}.content'
  mkdir -p "$out/run_$name"
  echo done > "$out/run_$name/short_summary.specific.lineage.$name.txt"
done"#,
        log = busco_calls.display()
    );
    let busco = write_stub(&bin, "busco", &busco_body)?;
    let plot_calls = tmp.path().join("plot.calls");
    let python = write_stub(&bin, "python3", &format!("echo \"$@\" >> '{}'", plot_calls.display()))?;

    let out = tmp.path().join("good");
    for (sample, body) in [("S1", ">s1\nAC*\n"), ("S2", ">s2\nGT\n")] {
        let dir = out.join("spades").join(sample);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("scaffolds.fasta"), body)?;
        fs::write(dir.join("contigs.fasta"), ">ignored\n")?;
    }
    let novo = out.join("novoplasty/S1");
    fs::create_dir_all(&novo)?;
    fs::write(novo.join("Circularized_assembly_1_S1_mito.fasta"), ">c1\nA*\n>c1\nT\n")?;
    fs::write(novo.join("Contigs_1_S1_chloro.fasta"), ">k1\nGG\n")?;

    let config_path = tmp.path().join("run.toml");
    fs::write(
        &config_path,
        format!(
            r#"
threads = 1
stages = ["busco_novoplasty", "busco_spades"]

[busco]
lineage_dataset = "lineage"
plot_script = "plot.py"

[tools]
busco = "{busco}"
python = "{python}"

[[datasets]]
name = "good"
reads_dir = "reads"
out_dir = "good"
"#,
            busco = busco.display(),
            python = python.display()
        ),
    )?;

    let config = load_run_config(&config_path, tmp.path())?;
    let summary = run(Arc::new(config)).await;
    assert_eq!(summary.labels(), vec!["BUSCO_spades_good", "BUSCO_novo_good"]);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.diagnostics(), 0);

    let busco_out = out.join("busco");
    let recorded = fs::read_to_string(&busco_calls)?;
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(&format!("-i {}", busco_out.join("spades/staging").display())));
    assert!(lines[1].contains(&format!("--out_path {}", busco_out.join("novoplasty/mito").display())));
    assert!(lines[2].contains(&format!("--out_path {}", busco_out.join("novoplasty/chloro").display())));
    assert!(lines[0].contains(&format!("-l {}", tmp.path().join("lineage").display())));

    // Flat staging copies as-is; split staging disambiguates repeated headers.
    let staged = fs::read_to_string(tmp.path().join("busco.calls.content"))?;
    assert_eq!(staged, ">s1\nAC*\n>s2\nGT\n>c1\nAN\n>c1(2)\nT\n>k1\nGG\n");
    assert!(!busco_out.join("spades/staging").exists());
    assert!(!busco_out.join("novoplasty/mito/staging").exists());
    assert!(!busco_out.join("novoplasty/chloro/staging").exists());

    let results = busco_out.join("spades/result");
    assert!(results.join("short_summary.specific.lineage.S1.fasta.txt").is_file());
    assert!(results.join("short_summary.specific.lineage.S2.fasta.txt").is_file());
    let split_results = busco_out.join("novoplasty/result");
    assert!(split_results.join("mito/short_summary.specific.lineage.S1.fasta.txt").is_file());
    assert!(split_results.join("chloro/short_summary.specific.lineage.S1.fasta.txt").is_file());

    let plots = fs::read_to_string(&plot_calls)?;
    let script = tmp.path().join("plot.py");
    let expected: Vec<String> = [results, split_results.join("mito"), split_results.join("chloro")]
        .iter()
        .map(|dir| format!("{} -wd {}", script.display(), dir.display()))
        .collect();
    assert_eq!(plots.lines().collect::<Vec<_>>(), expected);

    let rows = load(&tmp.path().join("timings.tsv"))?;
    let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["BUSCO_spades_good", "BUSCO_novo_good"]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() -> Result<()> {
    let tmp = TempDir::new()?;
    let config_path = tmp.path().join("run.toml");
    fs::write(&config_path, "threads = 0\n")?;
    assert!(load_run_config(&config_path, tmp.path()).is_err());
    assert!(load_run_config(&tmp.path().join("missing.toml"), tmp.path()).is_err());
    Ok(())
}
