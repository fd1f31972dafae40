//! Record loader for CSV and JSON Lines inputs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::SchemaError;
use super::csv::split_line;
use super::record::{CustomerRecord, Service};

/// Columns that every input file must provide.
pub const REQUIRED_COLUMNS: [&str; 4] =
    ["customer_id", "tenure_months", "contract", "monthly_charges"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Input encodings understood by [`load_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    JsonLines,
}

impl InputFormat {
    /// Pick a format from the file extension; anything unknown is read as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
                InputFormat::JsonLines
            }
            _ => InputFormat::Csv,
        }
    }
}

/// Load every record from `path`, rejecting malformed rows and duplicate identifiers.
pub fn load_records(path: &Path) -> Result<Vec<CustomerRecord>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let records = match InputFormat::from_path(path) {
        InputFormat::Csv => read_csv(reader),
        InputFormat::JsonLines => read_jsonl(reader),
    }
    .map_err(|err| with_path(err, path))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse a CSV stream with a header row.
pub fn read_csv<R: BufRead>(reader: R) -> Result<Vec<CustomerRecord>, LoadError> {
    let mut lines = reader.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((idx, line)) => {
                let line = line.map_err(io_error)?;
                if line.trim().is_empty() {
                    continue;
                }
                break split_line(&line).ok_or(SchemaError::MalformedRow { line: idx + 1 })?;
            }
            None => return Ok(Vec::new()),
        }
    };
    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), idx))
        .collect();
    for column in REQUIRED_COLUMNS {
        if !columns.contains_key(column) {
            return Err(SchemaError::MissingColumn {
                column: column.to_string(),
            }
            .into());
        }
    }

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in lines {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let fields = split_line(&line).ok_or(SchemaError::MalformedRow { line: line_no })?;
        if fields.len() != header.len() {
            return Err(SchemaError::RowLength {
                line: line_no,
                expected: header.len(),
                found: fields.len(),
            }
            .into());
        }
        let row = Row {
            line: line_no,
            columns: &columns,
            fields: &fields,
        };
        let record = row.to_record()?;
        ensure_unique(&mut seen, &record.customer_id)?;
        records.push(record);
    }
    debug!("Parsed {} CSV rows", records.len());
    Ok(records)
}

/// Parse a JSON Lines stream, one [`CustomerRecord`] per line.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<CustomerRecord>, LoadError> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CustomerRecord = serde_json::from_str(&line).map_err(|source| {
            LoadError::Json {
                line: idx + 1,
                source,
            }
        })?;
        if record.customer_id.trim().is_empty() {
            return Err(SchemaError::MissingField {
                line: idx + 1,
                field: "customer_id".to_string(),
            }
            .into());
        }
        ensure_unique(&mut seen, &record.customer_id)?;
        records.push(record);
    }
    Ok(records)
}

/// Ensure every record carries a churn label, as training requires.
pub fn require_labels(records: &[CustomerRecord]) -> Result<Vec<bool>, SchemaError> {
    records
        .iter()
        .map(|record| {
            record.churn.ok_or_else(|| SchemaError::MissingLabel {
                customer_id: record.customer_id.clone(),
            })
        })
        .collect()
}

fn ensure_unique(seen: &mut HashSet<String>, customer_id: &str) -> Result<(), SchemaError> {
    if !seen.insert(customer_id.to_string()) {
        return Err(SchemaError::DuplicateIdentifier {
            customer_id: customer_id.to_string(),
        });
    }
    Ok(())
}

fn io_error(source: std::io::Error) -> LoadError {
    LoadError::Io {
        path: PathBuf::new(),
        source,
    }
}

fn with_path(err: LoadError, path: &Path) -> LoadError {
    match err {
        LoadError::Io { path: p, source } if p.as_os_str().is_empty() => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

struct Row<'a> {
    line: usize,
    columns: &'a HashMap<String, usize>,
    fields: &'a [String],
}

impl Row<'_> {
    fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.get(column)?;
        let value = self.fields.get(idx)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn required(&self, column: &str) -> Result<&str, SchemaError> {
        self.get(column).ok_or_else(|| SchemaError::MissingField {
            line: self.line,
            field: column.to_string(),
        })
    }

    fn invalid(&self, column: &str, value: &str, expected: &'static str) -> SchemaError {
        SchemaError::InvalidValue {
            line: self.line,
            field: column.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    fn required_u32(&self, column: &str) -> Result<u32, SchemaError> {
        let raw = self.required(column)?;
        raw.parse::<u32>()
            .map_err(|_| self.invalid(column, raw, "non-negative integer"))
    }

    fn f64_value(&self, column: &str, raw: &str) -> Result<f64, SchemaError> {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => Err(self.invalid(column, raw, "non-negative number")),
        }
    }

    fn bool_value(&self, column: &str, raw: &str) -> Result<bool, SchemaError> {
        parse_bool(raw).ok_or_else(|| self.invalid(column, raw, "yes/no"))
    }

    fn optional_bool(&self, column: &str) -> Result<bool, SchemaError> {
        match self.get(column) {
            Some(raw) => self.bool_value(column, raw),
            None => Ok(false),
        }
    }

    fn to_record(&self) -> Result<CustomerRecord, SchemaError> {
        let customer_id = self.required("customer_id")?.to_string();
        let tenure_months = self.required_u32("tenure_months")?;
        let contract = self.required("contract")?.to_string();
        let monthly_charges = self.f64_value("monthly_charges", self.required("monthly_charges")?)?;
        let total_charges = self
            .get("total_charges")
            .map(|raw| self.f64_value("total_charges", raw))
            .transpose()?;
        let churn = self
            .get("churn")
            .map(|raw| self.bool_value("churn", raw))
            .transpose()?;
        let services: BTreeSet<Service> = Service::ALL
            .into_iter()
            .filter(|service| self.get(service.column()).is_some_and(Service::is_active_value))
            .collect();

        Ok(CustomerRecord {
            customer_id,
            tenure_months,
            contract,
            monthly_charges,
            total_charges,
            internet_service: self.get("internet_service").map(str::to_string),
            payment_method: self.get("payment_method").map(str::to_string),
            senior_citizen: self.optional_bool("senior_citizen")?,
            partner: self.optional_bool("partner")?,
            dependents: self.optional_bool("dependents")?,
            paperless_billing: self.optional_bool("paperless_billing")?,
            services,
            churn,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "y" => Some(true),
        "no" | "false" | "0" | "n" => Some(false),
        _ => None,
    }
}
