//! End-to-end run: train on a labeled file, then score and explain the same rows.

use std::path::PathBuf;

use churnsight::config::{self, PipelineConfig};
use churnsight::logging;
use churnsight::pipeline::{self, RunPaths};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let config = load_config(options.config.as_ref())?;
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }
    let paths = RunPaths {
        bundle: options.out_dir.join("model.json"),
        gold: options.out_dir.join(&options.gold_name),
        analytical: options
            .analytical
            .then(|| options.out_dir.join("analytical.csv")),
    };
    let outcome = pipeline::run(&options.data, &paths, &config).map_err(|err| err.to_string())?;

    println!(
        "trained on {} rows, held out {}",
        outcome.train_rows, outcome.test_rows
    );
    if let Some(report) = &outcome.evaluation {
        println!("holdout accuracy: {:.4}", report.accuracy);
    }
    println!("model bundle: {}", paths.bundle.display());
    println!("gold dataset: {}", paths.gold.display());
    if let Some(path) = &paths.analytical {
        println!("analytical extract: {}", path.display());
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

#[derive(Debug, Clone)]
struct CliOptions {
    data: PathBuf,
    out_dir: PathBuf,
    gold_name: String,
    analytical: bool,
    config: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("out");
    let mut gold_name = "gold.csv".to_string();
    let mut analytical = false;
    let mut config: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data = Some(PathBuf::from(value));
            }
            "--out-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out-dir requires a value".to_string())?;
                out_dir = PathBuf::from(value);
            }
            "--jsonl" => gold_name = "gold.jsonl".to_string(),
            "--analytical" => analytical = true,
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let data = data.ok_or_else(help_text)?;
    Ok(CliOptions {
        data,
        out_dir,
        gold_name,
        analytical,
        config,
    })
}

fn help_text() -> String {
    [
        "churnsight",
        "",
        "Trains a churn model on labeled customers, then writes explained predictions.",
        "",
        "Usage:",
        "  churnsight --data <file> [--out-dir out] [options]",
        "",
        "Options:",
        "  --data <file>      Labeled customers as CSV or JSON Lines (required).",
        "  --out-dir <dir>    Output directory (default: out).",
        "  --jsonl            Write gold.jsonl instead of gold.csv.",
        "  --analytical       Also write analytical.csv.",
        "  --config <file>    Pipeline TOML (default: app config, or built-in defaults).",
        "",
        "CSV input holds one record per line; a quoted field containing a line break",
        "is rejected as a malformed row.",
    ]
    .join("\n")
}
