//! Score customers with a saved bundle and write the gold dataset.

use std::path::PathBuf;

use churnsight::config;
use churnsight::data::load_records;
use churnsight::logging;
use churnsight::pipeline::{self, ModelBundle};

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
    if let Some(top_k) = options.top_k {
        config.gold.top_k = top_k;
    }
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }

    let bundle = ModelBundle::load_json(&options.model).map_err(|err| err.to_string())?;
    let records = load_records(&options.data).map_err(|err| err.to_string())?;
    let outcome = pipeline::score(&records, &bundle, &config).map_err(|err| err.to_string())?;
    pipeline::write_outputs(
        &records,
        &outcome,
        &options.out,
        options.analytical.as_deref(),
        &config,
    )
    .map_err(|err| err.to_string())?;

    let flagged = outcome.predictions.iter().filter(|p| p.churn).count();
    println!(
        "scored {} customers, {} flagged as churn risks",
        outcome.predictions.len(),
        flagged
    );
    println!("saved: {}", options.out.display());
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    data: PathBuf,
    model: PathBuf,
    out: PathBuf,
    analytical: Option<PathBuf>,
    config: Option<PathBuf>,
    top_k: Option<usize>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut data: Option<PathBuf> = None;
    let mut model: Option<PathBuf> = None;
    let mut out = PathBuf::from("gold.csv");
    let mut analytical: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut top_k: Option<usize> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--data" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--data requires a value".to_string())?;
                data = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out = PathBuf::from(value);
            }
            "--analytical" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--analytical requires a value".to_string())?;
                analytical = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--top-k" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--top-k requires a value".to_string())?;
                top_k = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --top-k value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let data = data.ok_or_else(help_text)?;
    let model = model.ok_or_else(help_text)?;
    Ok(CliOptions {
        data,
        model,
        out,
        analytical,
        config,
        top_k,
    })
}

fn help_text() -> String {
    [
        "churnsight-score",
        "",
        "Scores customers with a model bundle and writes explained predictions.",
        "",
        "Usage:",
        "  churnsight-score --data <file> --model <bundle.json> [--out gold.csv] [options]",
        "",
        "Options:",
        "  --data <file>         Customers as CSV or JSON Lines (required).",
        "  --model <file>        Bundle written by churnsight-train (required).",
        "  --out <file>          Gold dataset; .jsonl selects JSON Lines (default: gold.csv).",
        "  --analytical <file>   Also write the analytical CSV extract.",
        "  --config <file>       Pipeline TOML (default: app config, or built-in defaults).",
        "  --top-k <n>           Override gold.top_k.",
        "",
        "CSV input holds one record per line; a quoted field containing a line break",
        "is rejected as a malformed row.",
    ]
    .join("\n")
}
