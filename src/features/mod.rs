//! Feature engineering: raw customer records → model-ready vectors.
//!
//! The transform is a pure function of the record and the fitted
//! [`EncodingTable`]; the same inputs always produce the same vector.

mod cohort;
mod encoding;

use std::sync::Arc;

use crate::data::{CustomerRecord, SchemaError, Service};

pub use cohort::{TENURE_BREAKPOINTS, TenureGroup};
pub use encoding::{CATEGORICAL_COLUMNS, ENCODING_VERSION, EncodingTable, UNKNOWN_CODE};

/// Version of the feature layout below.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Ordered feature names produced by [`FeatureTransformer::transform`].
pub const FEATURE_NAMES: [&str; 13] = [
    "tenure_months",
    "tenure_group",
    "monthly_charges",
    "total_charges",
    "contract",
    "internet_service",
    "payment_method",
    "is_auto_payment",
    "service_density",
    "senior_citizen",
    "partner",
    "dependents",
    "paperless_billing",
];

/// Number of services a customer can subscribe to; denominator of `service_density`.
pub const SERVICE_COUNT: usize = Service::ALL.len();

/// Shared handle to the canonical feature schema.
pub fn feature_schema() -> Arc<[String]> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}

/// Active services over all possible services, in `[0, 1]`.
pub fn service_density(active_services: usize) -> f64 {
    active_services.min(SERVICE_COUNT) as f64 / SERVICE_COUNT as f64
}

/// Model-ready features for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    customer_id: String,
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Assemble a vector from an explicit schema; lengths must agree.
    pub fn new(
        customer_id: impl Into<String>,
        names: Arc<[String]>,
        values: Vec<f64>,
    ) -> Result<Self, SchemaError> {
        let customer_id = customer_id.into();
        if names.len() != values.len() {
            return Err(SchemaError::InvalidRecord {
                customer_id,
                field: "features",
                reason: format!("{} names for {} values", names.len(), values.len()),
            });
        }
        Ok(Self {
            customer_id,
            names,
            values,
        })
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn schema(&self) -> &Arc<[String]> {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.values.get(idx).copied()
    }

    /// Tenure cohort, when the vector carries `tenure_months`.
    pub fn tenure_group(&self) -> Option<TenureGroup> {
        self.get("tenure_months")
            .map(|months| TenureGroup::from_months(months as u32))
    }
}

/// Applies the fitted encoding table and derived-feature rules.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    encoding: EncodingTable,
    names: Arc<[String]>,
}

impl FeatureTransformer {
    pub fn new(encoding: EncodingTable) -> Self {
        Self {
            encoding,
            names: feature_schema(),
        }
    }

    /// Fit the categorical encoding on training records.
    pub fn fit(records: &[CustomerRecord]) -> Self {
        Self::new(EncodingTable::fit(records))
    }

    pub fn encoding(&self) -> &EncodingTable {
        &self.encoding
    }

    pub fn schema(&self) -> &Arc<[String]> {
        &self.names
    }

    pub fn transform(&self, record: &CustomerRecord) -> Result<FeatureVector, SchemaError> {
        validate_record(record)?;
        let tenure = record.tenure_months as f64;
        let total_charges = record
            .total_charges
            .unwrap_or(tenure * record.monthly_charges);
        let values = vec![
            tenure,
            TenureGroup::from_months(record.tenure_months).ordinal() as f64,
            record.monthly_charges,
            total_charges,
            self.encoding.encode_record(record, "contract") as f64,
            self.encoding.encode_record(record, "internet_service") as f64,
            self.encoding.encode_record(record, "payment_method") as f64,
            flag(record.is_auto_payment()),
            service_density(record.active_services()),
            flag(record.senior_citizen),
            flag(record.partner),
            flag(record.dependents),
            flag(record.paperless_billing),
        ];
        Ok(FeatureVector {
            customer_id: record.customer_id.clone(),
            names: Arc::clone(&self.names),
            values,
        })
    }

    /// Transform a batch; the first invalid record aborts the batch.
    pub fn transform_all(
        &self,
        records: &[CustomerRecord],
    ) -> Result<Vec<FeatureVector>, SchemaError> {
        records.iter().map(|record| self.transform(record)).collect()
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn validate_record(record: &CustomerRecord) -> Result<(), SchemaError> {
    let invalid = |field: &'static str, reason: &str| SchemaError::InvalidRecord {
        customer_id: record.customer_id.clone(),
        field,
        reason: reason.to_string(),
    };
    if record.customer_id.trim().is_empty() {
        return Err(invalid("customer_id", "empty identifier"));
    }
    if record.contract.trim().is_empty() {
        return Err(invalid("contract", "empty contract type"));
    }
    if !record.monthly_charges.is_finite() || record.monthly_charges < 0.0 {
        return Err(invalid("monthly_charges", "must be a finite non-negative number"));
    }
    if let Some(total) = record.total_charges
        && (!total.is_finite() || total < 0.0)
    {
        return Err(invalid("total_charges", "must be a finite non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> FeatureTransformer {
        FeatureTransformer::fit(&[
            CustomerRecord::new("a", 1, "Month-to-month", 10.0)
                .with_internet_service("Fiber optic")
                .with_payment_method("Electronic check"),
            CustomerRecord::new("b", 30, "Two year", 90.0)
                .with_internet_service("DSL")
                .with_payment_method("Credit card (automatic)"),
        ])
    }

    #[test]
    fn vector_follows_schema_order() {
        let t = transformer();
        let record = CustomerRecord::new("c", 10, "Two year", 50.0)
            .with_payment_method("Credit card (automatic)")
            .with_services([Service::PhoneService, Service::TechSupport, Service::StreamingTv]);
        let v = t.transform(&record).unwrap();
        assert_eq!(v.names().len(), FEATURE_NAMES.len());
        assert_eq!(v.get("tenure_months"), Some(10.0));
        assert_eq!(v.get("tenure_group"), Some(1.0));
        assert_eq!(v.get("total_charges"), Some(500.0));
        assert_eq!(v.get("contract"), Some(2.0));
        assert_eq!(v.get("internet_service"), Some(UNKNOWN_CODE as f64));
        assert_eq!(v.get("is_auto_payment"), Some(1.0));
        assert_eq!(v.get("service_density"), Some(3.0 / 9.0));
        assert_eq!(v.tenure_group(), Some(TenureGroup::UpToOneYear));
    }

    #[test]
    fn tenure_group_changes_between_six_and_seven() {
        let t = transformer();
        let six = t.transform(&CustomerRecord::new("x", 6, "Two year", 1.0)).unwrap();
        let seven = t.transform(&CustomerRecord::new("y", 7, "Two year", 1.0)).unwrap();
        assert_eq!(six.get("tenure_group"), Some(0.0));
        assert_eq!(seven.get("tenure_group"), Some(1.0));
    }

    #[test]
    fn zero_services_has_zero_density() {
        let t = transformer();
        let v = t.transform(&CustomerRecord::new("z", 3, "Two year", 1.0)).unwrap();
        assert_eq!(v.get("service_density"), Some(0.0));
        assert!(v.values().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn transform_is_pure() {
        let t = transformer();
        let record = CustomerRecord::new("p", 40, "Month-to-month", 70.0);
        assert_eq!(t.transform(&record).unwrap(), t.transform(&record).unwrap());
    }

    #[test]
    fn invalid_numeric_values_are_schema_errors() {
        let t = transformer();
        let err = t
            .transform(&CustomerRecord::new("n", 3, "Two year", f64::NAN))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidRecord { field: "monthly_charges", .. }
        ));
        let err = t.transform(&CustomerRecord::new(" ", 3, "Two year", 1.0)).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRecord { field: "customer_id", .. }));
    }

    #[test]
    fn explicit_vector_rejects_length_mismatch() {
        let err = FeatureVector::new("v", feature_schema(), vec![1.0]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRecord { field: "features", .. }));
    }
}
