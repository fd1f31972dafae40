use std::io::Write;
use std::path::Path;

use super::{Artifact, ExportError, commit, io_error};
use crate::data::CustomerRecord;
use crate::data::csv::join_fields;
use crate::features::TenureGroup;

pub const ANALYTICAL_COLUMNS: [&str; 15] = [
    "customer_id",
    "tenure_months",
    "tenure_group",
    "contract",
    "monthly_charges",
    "total_charges",
    "internet_service",
    "payment_method",
    "is_auto_payment",
    "total_services",
    "senior_citizen",
    "partner",
    "dependents",
    "paperless_billing",
    "churn",
];

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Raw customer fields plus derived cohort columns, one row per record.
pub fn write_analytical_csv<W: Write>(
    out: &mut W,
    records: &[CustomerRecord],
) -> std::io::Result<()> {
    writeln!(out, "{}", join_fields(ANALYTICAL_COLUMNS))?;
    for record in records {
        let fields = [
            record.customer_id.clone(),
            record.tenure_months.to_string(),
            TenureGroup::from_months(record.tenure_months).label().to_string(),
            record.contract.clone(),
            record.monthly_charges.to_string(),
            record
                .total_charges
                .map(|value| value.to_string())
                .unwrap_or_default(),
            record.internet_service.clone().unwrap_or_default(),
            record.payment_method.clone().unwrap_or_default(),
            flag(record.is_auto_payment()),
            record.active_services().to_string(),
            flag(record.senior_citizen),
            flag(record.partner),
            flag(record.dependents),
            flag(record.paperless_billing),
            record.churn.map(flag).unwrap_or_default(),
        ];
        writeln!(out, "{}", join_fields(fields))?;
    }
    Ok(())
}

pub fn render_analytical(path: &Path, records: &[CustomerRecord]) -> Result<Artifact, ExportError> {
    let mut buf = Vec::new();
    write_analytical_csv(&mut buf, records).map_err(io_error(path))?;
    Ok(Artifact::new(path, buf))
}

pub fn write_analytical(path: &Path, records: &[CustomerRecord]) -> Result<(), ExportError> {
    commit(&[render_analytical(path, records)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Service;
    use crate::data::csv::split_line;

    #[test]
    fn rows_carry_derived_columns() {
        let record = CustomerRecord::new("a,1", 13, "One year", 55.5)
            .with_payment_method("Credit card (automatic)")
            .with_services([Service::PhoneService, Service::StreamingTv]);
        let mut buf = Vec::new();
        write_analytical_csv(&mut buf, &[record]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = split_line(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(row.len(), ANALYTICAL_COLUMNS.len());
        assert_eq!(row[0], "a,1");
        assert_eq!(row[2], "13-24 Months");
        assert_eq!(row[5], "");
        assert_eq!(row[8], "1");
        assert_eq!(row[9], "2");
        assert_eq!(row[14], "");
    }
}
