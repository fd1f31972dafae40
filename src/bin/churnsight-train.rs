//! Train a model bundle from labeled customers and report holdout metrics.

use std::path::PathBuf;

use churnsight::config;
use churnsight::data::load_records;
use churnsight::logging;
use churnsight::ml::metrics::EvaluationReport;
use churnsight::pipeline;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = match &options.config {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    if let Some(n_trees) = options.trees {
        config.forest.n_trees = n_trees;
    }
    if let Some(seed) = options.seed {
        config.forest.seed = seed;
    }
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }

    let records = load_records(&options.data).map_err(|err| err.to_string())?;
    let outcome = pipeline::train(&records, &config).map_err(|err| err.to_string())?;
    outcome
        .bundle
        .save_json(&options.out)
        .map_err(|err| err.to_string())?;

    println!(
        "trained {} trees on {} rows ({} held out)",
        outcome.bundle.model.forest.trees.len(),
        outcome.train_rows,
        outcome.test_rows
    );
    if let Some(report) = &outcome.evaluation {
        print_report(report);
    }
    println!("top features:");
    for (name, importance) in outcome.bundle.model.feature_importance().iter().take(5) {
        println!("  {name:<20} {importance:.4}");
    }
    println!("saved: {}", options.out.display());
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!("test accuracy: {:.4}", report.accuracy);
    for (label, stats) in [("retained", &report.retained), ("churned", &report.churned)] {
        println!(
            "{label:<9} precision={:.3}  recall={:.3}  f1={:.3}  support={}",
            stats.precision, stats.recall, stats.f1, stats.support
        );
    }
    println!("confusion matrix (rows=true, cols=pred):");
    for truth in [false, true] {
        println!(
            "{:6}{:6}",
            report.confusion.get(truth, false),
            report.confusion.get(truth, true)
        );
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    data: PathBuf,
    out: PathBuf,
    config: Option<PathBuf>,
    trees: Option<usize>,
    seed: Option<u64>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data: Option<PathBuf> = None;
    let mut out = PathBuf::from("bundle.json");
    let mut config: Option<PathBuf> = None;
    let mut trees: Option<usize> = None;
    let mut seed: Option<u64> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out = PathBuf::from(value);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--trees" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--trees requires a value".to_string())?;
                trees = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --trees value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let data = data.ok_or_else(help_text)?;
    Ok(CliOptions {
        data,
        out,
        config,
        trees,
        seed,
    })
}

fn help_text() -> String {
    [
        "churnsight-train",
        "",
        "Trains a deterministic random forest and writes a model bundle.",
        "",
        "Usage:",
        "  churnsight-train --data <file> [--out bundle.json] [options]",
        "",
        "Options:",
        "  --data <file>     Labeled customers as CSV or JSON Lines (required).",
        "  --out <file>      Output bundle path (default: bundle.json).",
        "  --config <file>   Pipeline TOML (default: app config, or built-in defaults).",
        "  --trees <n>       Override forest.n_trees.",
        "  --seed <n>        Override forest.seed.",
        "",
        "CSV input holds one record per line; a quoted field containing a line break",
        "is rejected as a malformed row.",
    ]
    .join("\n")
}
