use std::io::Write;
use std::path::Path;

use super::{Artifact, ExportError, ExportFormat, commit, io_error};
use crate::data::csv::join_fields;
use crate::gold::GoldRecord;

/// Flattened gold CSV header with `top_k` attribution slots.
pub fn gold_header(top_k: usize) -> Vec<String> {
    let mut header: Vec<String> = [
        "customer_id",
        "churn_probability",
        "churn_decision",
        "risk_segment",
        "main_reason",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for slot in 1..=top_k {
        header.push(format!("feature_{slot}"));
        header.push(format!("contribution_{slot}"));
        header.push(format!("tier_{slot}"));
        header.push(format!("reason_{slot}"));
    }
    header
}

/// Render gold records as CSV; short attribution lists leave trailing slots empty.
pub fn write_gold_csv<W: Write>(
    out: &mut W,
    records: &[GoldRecord],
    top_k: usize,
) -> std::io::Result<()> {
    writeln!(out, "{}", join_fields(gold_header(top_k)))?;
    for record in records {
        let mut fields = vec![
            record.customer_id.clone(),
            format!("{:.6}", record.churn_probability),
            if record.churn_decision { "1" } else { "0" }.to_string(),
            record.risk_segment.label().to_string(),
            record.main_reason.clone(),
        ];
        for slot in 0..top_k {
            match record.top_attributions.get(slot) {
                Some(entry) => {
                    fields.push(entry.feature.clone());
                    fields.push(format!("{:.6}", entry.contribution));
                    fields.push(entry.tier.as_str().to_string());
                    fields.push(entry.reason.clone());
                }
                None => fields.extend(std::iter::repeat_n(String::new(), 4)),
            }
        }
        writeln!(out, "{}", join_fields(fields))?;
    }
    Ok(())
}

/// One JSON object per line.
pub fn write_gold_jsonl<W: Write>(out: &mut W, records: &[GoldRecord]) -> Result<(), ExportError> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    Ok(())
}

/// Render the gold dataset for `path`, picking CSV or JSON Lines by extension.
pub fn render_gold(path: &Path, records: &[GoldRecord], top_k: usize) -> Result<Artifact, ExportError> {
    let mut buf = Vec::new();
    match ExportFormat::from_path(path) {
        ExportFormat::Csv => write_gold_csv(&mut buf, records, top_k).map_err(io_error(path))?,
        ExportFormat::JsonLines => write_gold_jsonl(&mut buf, records)?,
    }
    Ok(Artifact::new(path, buf))
}

pub fn write_gold(path: &Path, records: &[GoldRecord], top_k: usize) -> Result<(), ExportError> {
    commit(&[render_gold(path, records, top_k)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv::split_line;
    use crate::gold::{MagnitudeTier, RankedAttribution, RiskSegment};

    fn record() -> GoldRecord {
        GoldRecord {
            customer_id: "7590-VHVEG".to_string(),
            churn_probability: 0.8125,
            churn_decision: true,
            risk_segment: RiskSegment::High,
            main_reason: "High risk due to a month-to-month contract".to_string(),
            top_attributions: vec![RankedAttribution {
                feature: "contract".to_string(),
                contribution: 0.25,
                tier: MagnitudeTier::High,
                reason: "High risk due to a month-to-month contract".to_string(),
            }],
        }
    }

    #[test]
    fn csv_pads_missing_slots() {
        let mut buf = Vec::new();
        write_gold_csv(&mut buf, &[record()], 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let header = split_line(lines[0]).unwrap();
        let row = split_line(lines[1]).unwrap();
        assert_eq!(header.len(), 13);
        assert_eq!(row.len(), header.len());
        assert_eq!(row[1], "0.812500");
        assert_eq!(row[2], "1");
        assert_eq!(row[3], "High Risk");
        assert_eq!(row[5], "contract");
        assert_eq!(row[7], "high");
        assert!(row[9..].iter().all(String::is_empty));
    }

    #[test]
    fn jsonl_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/gold.jsonl");
        write_gold(&path, &[record(), record()], 3).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<GoldRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, vec![record(), record()]);
        assert!(text.contains("\"risk_segment\":\"High Risk\""));
    }
}
