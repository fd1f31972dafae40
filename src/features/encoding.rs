use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::CustomerRecord;

/// Format version of [`EncodingTable`].
pub const ENCODING_VERSION: u32 = 1;

/// Code reserved for categories not seen during fitting.
pub const UNKNOWN_CODE: u32 = 0;

/// Categorical columns encoded through the table.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["contract", "internet_service", "payment_method"];

/// Immutable categorical → code table fitted on training records.
///
/// Known categories are normalized (trimmed, lowercased) and numbered from 1 in
/// sorted order. Missing values and unseen categories map to [`UNKNOWN_CODE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTable {
    pub version: u32,
    pub columns: BTreeMap<String, Vec<String>>,
    /// blake3 over the version and categories; pairs the table with a model.
    pub fingerprint: String,
}

impl EncodingTable {
    /// Build the table from the categories present in `records`.
    pub fn fit(records: &[CustomerRecord]) -> Self {
        let mut seen: BTreeMap<String, BTreeSet<String>> = CATEGORICAL_COLUMNS
            .iter()
            .map(|column| (column.to_string(), BTreeSet::new()))
            .collect();
        for record in records {
            for column in CATEGORICAL_COLUMNS {
                if let Some(value) = raw_category(record, column).and_then(normalize)
                    && let Some(values) = seen.get_mut(column)
                {
                    values.insert(value);
                }
            }
        }
        let columns = seen
            .into_iter()
            .map(|(column, values)| (column, values.into_iter().collect()))
            .collect();
        Self::from_columns(columns)
    }

    fn from_columns(columns: BTreeMap<String, Vec<String>>) -> Self {
        let fingerprint = fingerprint(ENCODING_VERSION, &columns);
        Self {
            version: ENCODING_VERSION,
            columns,
            fingerprint,
        }
    }

    /// Encode one categorical value of `column`.
    pub fn code(&self, column: &str, value: Option<&str>) -> u32 {
        let Some(value) = value.and_then(normalize) else {
            return UNKNOWN_CODE;
        };
        self.columns
            .get(column)
            .and_then(|values| values.binary_search(&value).ok())
            .map(|idx| idx as u32 + 1)
            .unwrap_or(UNKNOWN_CODE)
    }

    /// Reverse lookup of a code, `None` for the unknown bucket.
    pub fn category(&self, column: &str, code: u32) -> Option<&str> {
        let idx = code.checked_sub(1)? as usize;
        self.columns.get(column)?.get(idx).map(String::as_str)
    }

    /// Encode a record's value of `column`.
    pub fn encode_record(&self, record: &CustomerRecord, column: &str) -> u32 {
        self.code(column, raw_category(record, column))
    }

    /// Check structural invariants after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != ENCODING_VERSION {
            return Err(format!(
                "Unsupported encoding version {} (expected {ENCODING_VERSION})",
                self.version
            ));
        }
        for column in CATEGORICAL_COLUMNS {
            let Some(values) = self.columns.get(column) else {
                return Err(format!("Encoding table is missing column `{column}`"));
            };
            if values.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(format!("Categories of `{column}` are not sorted and unique"));
            }
        }
        let expected = fingerprint(self.version, &self.columns);
        if expected != self.fingerprint {
            return Err("Encoding table fingerprint does not match its contents".to_string());
        }
        Ok(())
    }
}

fn raw_category<'a>(record: &'a CustomerRecord, column: &str) -> Option<&'a str> {
    match column {
        "contract" => Some(record.contract.as_str()),
        "internet_service" => record.internet_service.as_deref(),
        "payment_method" => record.payment_method.as_deref(),
        _ => None,
    }
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

fn fingerprint(version: u32, columns: &BTreeMap<String, Vec<String>>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&version.to_le_bytes());
    for (column, values) in columns {
        hasher.update(column.as_bytes());
        hasher.update(&[0xff]);
        for value in values {
            hasher.update(value.as_bytes());
            hasher.update(&[0]);
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CustomerRecord> {
        vec![
            CustomerRecord::new("a", 1, "Month-to-month", 10.0).with_internet_service("DSL"),
            CustomerRecord::new("b", 1, "Two year", 10.0).with_payment_method("Mailed check"),
            CustomerRecord::new("c", 1, " one year ", 10.0),
        ]
    }

    #[test]
    fn codes_are_sorted_and_one_based() {
        let table = EncodingTable::fit(&records());
        assert_eq!(table.code("contract", Some("Month-to-month")), 1);
        assert_eq!(table.code("contract", Some("One year")), 2);
        assert_eq!(table.code("contract", Some("TWO YEAR")), 3);
        assert_eq!(table.category("contract", 2), Some("one year"));
    }

    #[test]
    fn unseen_and_missing_map_to_unknown() {
        let table = EncodingTable::fit(&records());
        assert_eq!(table.code("contract", Some("Three year")), UNKNOWN_CODE);
        assert_eq!(table.code("internet_service", None), UNKNOWN_CODE);
        assert_eq!(table.code("payment_method", Some("  ")), UNKNOWN_CODE);
        assert_eq!(table.category("contract", UNKNOWN_CODE), None);
    }

    #[test]
    fn fingerprint_tracks_contents() {
        let table = EncodingTable::fit(&records());
        table.validate().unwrap();
        let again = EncodingTable::fit(&records());
        assert_eq!(table.fingerprint, again.fingerprint);

        let mut tampered = table.clone();
        tampered
            .columns
            .get_mut("contract")
            .unwrap()
            .push("zzz".to_string());
        assert!(tampered.validate().is_err());
    }
}
